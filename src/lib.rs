//! SHM Lab - A simple harmonic motion teaching lab
//!
//! Core modules:
//! - `sim`: Closed-form kinematics, parameters, virtual clock and sampling
//! - `persistence`: Snapshot save/load across the device and account tiers
//! - `platform`: Browser/native platform abstraction (storage, wall clock)
//! - `settings`: Persisted lab configuration
//! - `lab`: Facade consumed by the presentation layer

pub mod lab;
pub mod persistence;
pub mod platform;
pub mod settings;
pub mod sim;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use lab::{Lab, Status};
pub use settings::LabSettings;

/// Lab configuration constants
pub mod consts {
    /// Virtual seconds between recorded samples
    pub const SAMPLE_INTERVAL: f64 = 0.1;
    /// Maximum samples kept for graphing
    pub const SAMPLE_CAP: usize = 200;
    /// Maximum samples captured into a snapshot
    pub const SNAPSHOT_SAMPLE_LIMIT: usize = 50;

    /// Time-scale clamp range applied on edit
    pub const TIME_SCALE_MIN: f64 = 0.1;
    pub const TIME_SCALE_MAX: f64 = 4.0;

    /// Largest real frame delta accepted by the clock (seconds).
    /// Longer gaps (background tab, debugger) advance by this much only.
    pub const MAX_FRAME_DELTA: f64 = 0.25;

    /// Amplitude (degrees) above which the pendulum model stops being accurate
    pub const SMALL_ANGLE_THRESHOLD_DEG: f64 = 15.0;
    /// Hard limit on the pendulum release angle (degrees)
    pub const MAX_PENDULUM_ANGLE_DEG: f64 = 90.0;

    /// Owner id recorded on snapshots saved without a signed-in user
    pub const ANONYMOUS_OWNER: &str = "anonymous";
}
