//! Bounded time series for the graphs
//!
//! Samples arrive in non-decreasing time order; once the cap is reached the
//! oldest sample is dropped for every new one.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::kinematics::Kinematics;
use crate::consts::SAMPLE_CAP;

/// One graph point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Virtual time (s)
    pub time: f64,
    /// Displacement (m) or angle (rad)
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub kinetic: f64,
    pub potential: f64,
    pub total: f64,
}

impl Sample {
    pub fn new(time: f64, state: &Kinematics) -> Self {
        Self {
            time,
            position: state.position,
            velocity: state.velocity,
            acceleration: state.acceleration,
            kinetic: state.energy.kinetic,
            potential: state.energy.potential,
            total: state.energy.total,
        }
    }
}

/// Quantity selector for per-series graph views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Position,
    Velocity,
    Acceleration,
    Kinetic,
    Potential,
    Total,
}

impl Quantity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "position" | "angle" => Some(Quantity::Position),
            "velocity" => Some(Quantity::Velocity),
            "acceleration" => Some(Quantity::Acceleration),
            "kinetic" => Some(Quantity::Kinetic),
            "potential" => Some(Quantity::Potential),
            "total" => Some(Quantity::Total),
            _ => None,
        }
    }

    pub fn of(&self, sample: &Sample) -> f64 {
        match self {
            Quantity::Position => sample.position,
            Quantity::Velocity => sample.velocity,
            Quantity::Acceleration => sample.acceleration,
            Quantity::Kinetic => sample.kinetic,
            Quantity::Potential => sample.potential,
            Quantity::Total => sample.total,
        }
    }
}

/// FIFO series capped at `cap` entries
#[derive(Debug, Clone)]
pub struct SampleRecorder {
    samples: VecDeque<Sample>,
    cap: usize,
}

impl Default for SampleRecorder {
    fn default() -> Self {
        Self::new(SAMPLE_CAP)
    }
}

impl SampleRecorder {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            samples: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append a sample, evicting the oldest beyond the cap.
    /// Returns false (and drops the sample) if it would go back in time.
    pub fn append(&mut self, sample: Sample) -> bool {
        if let Some(last) = self.samples.back() {
            if sample.time < last.time {
                log::warn!(
                    "Out-of-order sample dropped ({:.3}s after {:.3}s)",
                    sample.time,
                    last.time
                );
                return false;
            }
        }
        self.samples.push_back(sample);
        while self.samples.len() > self.cap {
            self.samples.pop_front();
        }
        true
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Replace the series (snapshot restore). Input is sorted by time and
    /// trimmed to the newest `cap` entries.
    pub fn restore(&mut self, samples: &[Sample]) {
        let mut sorted: Vec<Sample> = samples.iter().copied().filter(|s| s.time.is_finite()).collect();
        sorted.sort_by(|a, b| a.time.total_cmp(&b.time));
        let skip = sorted.len().saturating_sub(self.cap);
        self.samples = sorted.into_iter().skip(skip).collect();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Copy of the whole series, oldest first
    pub fn series(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// The newest `n` samples, oldest first
    pub fn recent(&self, n: usize) -> Vec<Sample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    /// `(time, value)` pairs for one quantity
    pub fn points(&self, quantity: Quantity) -> Vec<(f64, f64)> {
        self.samples.iter().map(|s| (s.time, quantity.of(s))).collect()
    }

    /// Min/max of one quantity over the series (for axis scaling)
    pub fn bounds(&self, quantity: Quantity) -> Option<(f64, f64)> {
        self.samples.iter().map(|s| quantity.of(s)).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(time: f64) -> Sample {
        Sample {
            time,
            position: time * 2.0,
            velocity: -time,
            acceleration: 0.0,
            kinetic: 1.0,
            potential: 2.0,
            total: 3.0,
        }
    }

    #[test]
    fn test_append_evicts_oldest() {
        let mut rec = SampleRecorder::new(3);
        for i in 0..5 {
            assert!(rec.append(at(i as f64)));
        }
        let times: Vec<f64> = rec.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_out_of_order_sample_rejected() {
        let mut rec = SampleRecorder::default();
        rec.append(at(1.0));
        assert!(!rec.append(at(0.5)));
        assert_eq!(rec.len(), 1);
        // Equal times are allowed
        assert!(rec.append(at(1.0)));
    }

    #[test]
    fn test_restore_sorts_and_trims() {
        let mut rec = SampleRecorder::new(2);
        rec.restore(&[at(3.0), at(1.0), at(2.0)]);
        let times: Vec<f64> = rec.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![2.0, 3.0]);
    }

    #[test]
    fn test_recent_and_bounds() {
        let mut rec = SampleRecorder::default();
        for i in 0..10 {
            rec.append(at(i as f64 * 0.1));
        }
        let recent = rec.recent(3);
        assert_eq!(recent.len(), 3);
        assert!((recent[0].time - 0.7).abs() < 1e-12);

        let (lo, hi) = rec.bounds(Quantity::Velocity).unwrap();
        assert!((lo + 0.9).abs() < 1e-12);
        assert_eq!(hi, 0.0);
        assert!(SampleRecorder::default().bounds(Quantity::Total).is_none());
    }

    #[test]
    fn test_points_follow_quantity() {
        let mut rec = SampleRecorder::default();
        rec.append(at(0.5));
        rec.append(at(1.0));
        assert_eq!(rec.points(Quantity::Position), vec![(0.5, 1.0), (1.0, 2.0)]);
        assert_eq!(rec.points(Quantity::Total), vec![(0.5, 3.0), (1.0, 3.0)]);
        assert_eq!(Quantity::from_str("angle"), Some(Quantity::Position));
        assert_eq!(Quantity::from_str("jerk"), None);
    }

    #[test]
    fn test_clear() {
        let mut rec = SampleRecorder::default();
        rec.append(at(0.0));
        rec.clear();
        assert!(rec.is_empty());
    }

    proptest! {
        #[test]
        fn prop_series_bounded_and_most_recent(count in 0usize..800) {
            let mut rec = SampleRecorder::default();
            for i in 0..count {
                rec.append(at(i as f64 * 0.1));
            }
            prop_assert!(rec.len() <= SAMPLE_CAP);
            prop_assert_eq!(rec.len(), count.min(SAMPLE_CAP));
            let first_kept = count.saturating_sub(SAMPLE_CAP);
            for (offset, s) in rec.iter().enumerate() {
                prop_assert_eq!(s.time, (first_kept + offset) as f64 * 0.1);
            }
        }
    }
}
