//! Virtual clock driven by host animation frames
//!
//! The host owns the frame loop (`requestAnimationFrame` in the browser, a
//! manual pump in tests) behind [`FrameScheduler`]. Every scheduled frame
//! carries a [`FrameToken`]; a callback whose token is not the one currently
//! pending is ignored, so nothing can mutate the clock after `stop()`.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::kinematics::evaluate;
use super::params::SimulationConfig;
use super::recorder::{Sample, SampleRecorder};
use crate::consts::{MAX_FRAME_DELTA, SAMPLE_INTERVAL};

/// Identifies one scheduled frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Host-side frame scheduling
pub trait FrameScheduler {
    /// Arrange for `ClockDriver::on_frame(token, ..)` to be called once on
    /// the next frame.
    fn schedule(&mut self, token: FrameToken);
    /// Drop a scheduled callback. Best effort; stale tokens are ignored by
    /// the clock anyway.
    fn cancel(&mut self, token: FrameToken);
}

/// Virtual time and run flag
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockState {
    pub virtual_time: f64,
    pub running: bool,
}

impl ClockState {
    /// Advance by `delta` virtual seconds. Frozen when stopped; negative or
    /// non-finite deltas are ignored so time never goes backwards.
    pub fn advance(self, delta: f64) -> Self {
        if !self.running || !delta.is_finite() || delta <= 0.0 {
            return self;
        }
        Self {
            virtual_time: self.virtual_time + delta,
            ..self
        }
    }
}

/// True when `prev → next` crosses a multiple of `1/samples_per_second`
pub fn crossed_sample_boundary(prev: f64, next: f64, samples_per_second: f64) -> bool {
    (next * samples_per_second).floor() > (prev * samples_per_second).floor()
}

/// Result of one frame callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Cancelled or superseded callback; nothing changed
    Stale,
    /// Clock advanced; `sample` is set when a sample boundary was crossed
    Advanced { delta: f64, sample: Option<Sample> },
}

/// Drives virtual time from host frames
pub struct ClockDriver {
    state: ClockState,
    scheduler: Box<dyn FrameScheduler>,
    pending: Option<FrameToken>,
    next_token: u64,
    last_timestamp: Option<f64>,
    samples_per_second: f64,
    max_frame_delta: f64,
}

impl ClockDriver {
    pub fn new(scheduler: Box<dyn FrameScheduler>) -> Self {
        Self::with_timing(scheduler, SAMPLE_INTERVAL, MAX_FRAME_DELTA)
    }

    pub fn with_timing(
        scheduler: Box<dyn FrameScheduler>,
        sample_interval: f64,
        max_frame_delta: f64,
    ) -> Self {
        let sample_interval = if sample_interval > 0.0 {
            sample_interval
        } else {
            SAMPLE_INTERVAL
        };
        Self {
            state: ClockState::default(),
            scheduler,
            pending: None,
            next_token: 1,
            last_timestamp: None,
            samples_per_second: 1.0 / sample_interval,
            max_frame_delta: max_frame_delta.max(0.0),
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn virtual_time(&self) -> f64 {
        self.state.virtual_time
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Token of the frame callback currently expected, if any
    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.pending
    }

    pub fn start(&mut self) {
        if self.state.running {
            return;
        }
        self.state.running = true;
        self.last_timestamp = None;
        self.schedule_next();
        log::debug!("Clock started at {:.3}s", self.state.virtual_time);
    }

    /// Stop and cancel the pending frame. After this returns no callback can
    /// change the clock.
    pub fn stop(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
        }
        if self.state.running {
            log::debug!("Clock stopped at {:.3}s", self.state.virtual_time);
        }
        self.state.running = false;
        self.last_timestamp = None;
    }

    pub fn toggle(&mut self) {
        if self.state.running {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Stop, rewind to zero and clear the series
    pub fn reset(&mut self, recorder: &mut SampleRecorder) {
        self.stop();
        self.state.virtual_time = 0.0;
        recorder.clear();
    }

    /// Jump to a virtual time (snapshot restore). Only allowed while stopped.
    pub fn seek(&mut self, virtual_time: f64) -> bool {
        if self.state.running || !virtual_time.is_finite() {
            return false;
        }
        self.state.virtual_time = virtual_time.max(0.0);
        true
    }

    /// Frame callback. `timestamp_ms` is the host frame timestamp
    /// (`performance.now()` style milliseconds).
    pub fn on_frame(
        &mut self,
        token: FrameToken,
        timestamp_ms: f64,
        config: &SimulationConfig,
        recorder: &mut SampleRecorder,
    ) -> FrameOutcome {
        if !self.state.running || self.pending != Some(token) {
            log::trace!("Ignoring stale frame {:?}", token);
            return FrameOutcome::Stale;
        }
        self.pending = None;

        let real_delta = match self.last_timestamp {
            Some(last) if timestamp_ms.is_finite() => {
                ((timestamp_ms - last) / 1000.0).clamp(0.0, self.max_frame_delta)
            }
            _ => 0.0,
        };
        if timestamp_ms.is_finite() {
            self.last_timestamp = Some(timestamp_ms);
        }

        let prev = self.state.virtual_time;
        self.state = self.state.advance(real_delta * config.time_scale);
        let now = self.state.virtual_time;

        let sample = if crossed_sample_boundary(prev, now, self.samples_per_second) {
            emit_sample(config, now, recorder)
        } else {
            None
        };

        self.schedule_next();
        FrameOutcome::Advanced {
            delta: now - prev,
            sample,
        }
    }

    fn schedule_next(&mut self) {
        let token = FrameToken(self.next_token);
        self.next_token += 1;
        self.pending = Some(token);
        self.scheduler.schedule(token);
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
        }
    }
}

/// Evaluate and record one sample. A non-finite evaluation is skipped; the
/// loop keeps going on the next frame.
fn emit_sample(config: &SimulationConfig, time: f64, recorder: &mut SampleRecorder) -> Option<Sample> {
    let state = evaluate(config.kind, config, time);
    if !state.is_finite() {
        log::warn!("Skipping sample at {:.3}s: non-finite kinematics", time);
        return None;
    }
    let sample = Sample::new(time, &state);
    recorder.append(sample).then_some(sample)
}

/// Frame scheduler pumped by hand (tests, headless runs)
#[derive(Debug, Clone, Default)]
pub struct ManualFrames {
    inner: Rc<RefCell<ManualQueue>>,
}

#[derive(Debug, Default)]
struct ManualQueue {
    scheduled: Option<FrameToken>,
    cancelled: Vec<FrameToken>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of the callback that would fire on the next frame
    pub fn next(&self) -> Option<FrameToken> {
        self.inner.borrow().scheduled
    }

    /// Take the scheduled token, as firing the callback would
    pub fn take(&self) -> Option<FrameToken> {
        self.inner.borrow_mut().scheduled.take()
    }

    pub fn cancelled(&self) -> Vec<FrameToken> {
        self.inner.borrow().cancelled.clone()
    }
}

impl FrameScheduler for ManualFrames {
    fn schedule(&mut self, token: FrameToken) {
        self.inner.borrow_mut().scheduled = Some(token);
    }

    fn cancel(&mut self, token: FrameToken) {
        let mut queue = self.inner.borrow_mut();
        if queue.scheduled == Some(token) {
            queue.scheduled = None;
        }
        queue.cancelled.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn driver() -> (ClockDriver, ManualFrames) {
        let frames = ManualFrames::new();
        (ClockDriver::new(Box::new(frames.clone())), frames)
    }

    /// Fire the scheduled frame at `ms`
    fn pump(
        clock: &mut ClockDriver,
        frames: &ManualFrames,
        ms: f64,
        config: &SimulationConfig,
        rec: &mut SampleRecorder,
    ) -> FrameOutcome {
        let token = frames.take().expect("frame scheduled");
        clock.on_frame(token, ms, config, rec)
    }

    #[test]
    fn test_start_schedules_frame() {
        let (mut clock, frames) = driver();
        assert!(frames.next().is_none());
        clock.start();
        assert!(clock.is_running());
        assert_eq!(frames.next(), clock.pending_frame());
    }

    #[test]
    fn test_first_frame_has_zero_delta() {
        let (mut clock, frames) = driver();
        let config = SimulationConfig::default();
        let mut rec = SampleRecorder::default();
        clock.start();
        let outcome = pump(&mut clock, &frames, 5000.0, &config, &mut rec);
        assert_eq!(outcome, FrameOutcome::Advanced { delta: 0.0, sample: None });
        assert_eq!(clock.virtual_time(), 0.0);
    }

    #[test]
    fn test_time_scale_applies_to_delta() {
        let (mut clock, frames) = driver();
        let config = SimulationConfig {
            time_scale: 2.0,
            ..SimulationConfig::default()
        };
        let mut rec = SampleRecorder::default();
        clock.start();
        pump(&mut clock, &frames, 0.0, &config, &mut rec);
        pump(&mut clock, &frames, 100.0, &config, &mut rec);
        assert!((clock.virtual_time() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_sample_emitted_on_boundary_only() {
        let (mut clock, frames) = driver();
        let config = SimulationConfig::default();
        let mut rec = SampleRecorder::default();
        clock.start();
        pump(&mut clock, &frames, 0.0, &config, &mut rec);
        // 0.05s: no boundary
        pump(&mut clock, &frames, 50.0, &config, &mut rec);
        assert!(rec.is_empty());
        // 0.12s: crosses 0.1
        let outcome = pump(&mut clock, &frames, 120.0, &config, &mut rec);
        match outcome {
            FrameOutcome::Advanced { sample: Some(s), .. } => {
                assert!((s.time - 0.12).abs() < 1e-12);
            }
            other => panic!("expected a sample, got {:?}", other),
        }
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_stop_cancels_pending_frame() {
        let (mut clock, frames) = driver();
        let config = SimulationConfig::default();
        let mut rec = SampleRecorder::default();
        clock.start();
        pump(&mut clock, &frames, 0.0, &config, &mut rec);
        let orphan = clock.pending_frame().unwrap();
        clock.stop();
        assert!(frames.next().is_none());
        assert_eq!(frames.cancelled(), vec![orphan]);

        // A callback that slipped through anyway must not move the clock
        let before = clock.virtual_time();
        assert_eq!(clock.on_frame(orphan, 10_000.0, &config, &mut rec), FrameOutcome::Stale);
        assert_eq!(clock.virtual_time(), before);
    }

    #[test]
    fn test_restart_ignores_old_token() {
        let (mut clock, frames) = driver();
        let config = SimulationConfig::default();
        let mut rec = SampleRecorder::default();
        clock.start();
        let old = frames.next().unwrap();
        clock.stop();
        clock.start();
        assert_ne!(frames.next().unwrap(), old);
        assert_eq!(clock.on_frame(old, 1.0, &config, &mut rec), FrameOutcome::Stale);
    }

    #[test]
    fn test_large_gap_clamped() {
        let (mut clock, frames) = driver();
        let config = SimulationConfig::default();
        let mut rec = SampleRecorder::default();
        clock.start();
        pump(&mut clock, &frames, 0.0, &config, &mut rec);
        pump(&mut clock, &frames, 60_000.0, &config, &mut rec);
        assert!((clock.virtual_time() - MAX_FRAME_DELTA).abs() < 1e-12);
    }

    #[test]
    fn test_reset_rewinds_and_clears() {
        let (mut clock, frames) = driver();
        let config = SimulationConfig::default();
        let mut rec = SampleRecorder::default();
        clock.start();
        pump(&mut clock, &frames, 0.0, &config, &mut rec);
        pump(&mut clock, &frames, 200.0, &config, &mut rec);
        assert!(!rec.is_empty());
        clock.reset(&mut rec);
        assert!(!clock.is_running());
        assert_eq!(clock.virtual_time(), 0.0);
        assert!(rec.is_empty());
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_non_finite_sample_skipped_loop_continues() {
        let (mut clock, frames) = driver();
        // Bypasses the parameter store on purpose
        let config = SimulationConfig {
            mass: 0.0,
            ..SimulationConfig::default()
        };
        let mut rec = SampleRecorder::default();
        clock.start();
        pump(&mut clock, &frames, 0.0, &config, &mut rec);
        let outcome = pump(&mut clock, &frames, 150.0, &config, &mut rec);
        assert!(matches!(outcome, FrameOutcome::Advanced { sample: None, .. }));
        assert!(rec.is_empty());
        assert!(frames.next().is_some());
    }

    #[test]
    fn test_seek_only_while_stopped() {
        let (mut clock, _frames) = driver();
        assert!(clock.seek(3.5));
        assert_eq!(clock.virtual_time(), 3.5);
        clock.start();
        assert!(!clock.seek(1.0));
        assert_eq!(clock.virtual_time(), 3.5);
    }

    #[test]
    fn test_boundary_detection() {
        assert!(crossed_sample_boundary(0.09, 0.1, 10.0));
        assert!(!crossed_sample_boundary(0.1, 0.19, 10.0));
        assert!(crossed_sample_boundary(0.19, 0.45, 10.0));
        assert!(!crossed_sample_boundary(0.2, 0.2, 10.0));
    }

    proptest! {
        #[test]
        fn prop_virtual_time_monotonic(
            steps in proptest::collection::vec(-50.0f64..400.0, 1..100),
            stop_at in 0usize..100,
            scale in 0.1f64..4.0,
        ) {
            let (mut clock, frames) = driver();
            let config = SimulationConfig { time_scale: scale, ..SimulationConfig::default() };
            let mut rec = SampleRecorder::default();
            clock.start();
            let mut ms = 0.0;
            let mut prev = clock.virtual_time();
            for (i, step) in steps.iter().enumerate() {
                if i == stop_at {
                    clock.stop();
                }
                ms += step;
                match frames.take() {
                    Some(token) => {
                        clock.on_frame(token, ms, &config, &mut rec);
                    }
                    None => {
                        // Stopped: a late callback with any token changes nothing
                        let frozen = clock.virtual_time();
                        clock.on_frame(FrameToken(i as u64), ms, &config, &mut rec);
                        prop_assert_eq!(clock.virtual_time(), frozen);
                    }
                }
                prop_assert!(clock.virtual_time() >= prev);
                prev = clock.virtual_time();
            }
            prop_assert!(rec.len() <= crate::consts::SAMPLE_CAP);
        }
    }
}
