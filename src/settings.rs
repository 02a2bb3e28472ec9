//! Lab settings
//!
//! Persisted separately from snapshots in LocalStorage.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::platform::storage::KeyValueStore;
use crate::sim::OscillatorKind;

/// Tunable lab configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabSettings {
    // === Clock ===
    /// Lower bound for the time-scale slider
    pub time_scale_min: f64,
    /// Upper bound for the time-scale slider
    pub time_scale_max: f64,
    /// Longest real frame gap the clock will honour (seconds)
    pub max_frame_delta: f64,

    // === Sampling ===
    /// Virtual seconds between graph samples
    pub sample_interval: f64,
    /// Graph series length
    pub sample_cap: usize,
    /// Samples stored with a snapshot
    pub snapshot_sample_limit: usize,

    // === Session ===
    /// Oscillator shown on a fresh session
    pub default_oscillator: OscillatorKind,
}

impl Default for LabSettings {
    fn default() -> Self {
        Self {
            time_scale_min: TIME_SCALE_MIN,
            time_scale_max: TIME_SCALE_MAX,
            max_frame_delta: MAX_FRAME_DELTA,

            sample_interval: SAMPLE_INTERVAL,
            sample_cap: SAMPLE_CAP,
            snapshot_sample_limit: SNAPSHOT_SAMPLE_LIMIT,

            default_oscillator: OscillatorKind::Spring,
        }
    }
}

impl LabSettings {
    /// LocalStorage key
    pub const STORAGE_KEY: &'static str = "shm_lab_settings";

    /// Repair values that would break the clock or the recorder
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        let positive = |v: f64| v.is_finite() && v > 0.0;

        if !positive(self.time_scale_min) || !positive(self.time_scale_max) {
            self.time_scale_min = defaults.time_scale_min;
            self.time_scale_max = defaults.time_scale_max;
        }
        if self.time_scale_min > self.time_scale_max {
            std::mem::swap(&mut self.time_scale_min, &mut self.time_scale_max);
        }
        if !positive(self.max_frame_delta) {
            self.max_frame_delta = defaults.max_frame_delta;
        }
        if !positive(self.sample_interval) {
            self.sample_interval = defaults.sample_interval;
        }
        if self.sample_cap == 0 {
            self.sample_cap = defaults.sample_cap;
        }
        self.snapshot_sample_limit = self.snapshot_sample_limit.min(self.sample_cap);
        self
    }

    /// Load settings, falling back to defaults
    pub fn load(storage: &dyn KeyValueStore) -> Self {
        match storage.get_item(Self::STORAGE_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<LabSettings>(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from storage");
                    return settings.normalized();
                }
                Err(e) => log::warn!("Ignoring unreadable settings: {}", e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Settings storage unavailable: {}", e),
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings
    pub fn save(&self, storage: &mut dyn KeyValueStore) {
        match serde_json::to_string(self) {
            Ok(json) => match storage.set_item(Self::STORAGE_KEY, &json) {
                Ok(()) => log::info!("Settings saved"),
                Err(e) => log::warn!("Settings not saved: {}", e),
            },
            Err(e) => log::warn!("Settings not serialized: {}", e),
        }
    }
}
