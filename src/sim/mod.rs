//! Oscillator simulation
//!
//! Pure and host-agnostic:
//! - Closed-form kinematics only (no integration)
//! - Virtual time advanced from injected frame callbacks
//! - No storage or rendering dependencies

pub mod clock;
pub mod kinematics;
pub mod params;
pub mod recorder;
pub mod session;

pub use clock::{ClockDriver, ClockState, FrameOutcome, FrameScheduler, FrameToken, ManualFrames};
pub use kinematics::{
    Energy, Kinematics, OscillatorKind, angular_frequency, body_position, evaluate, frequency, period,
};
pub use params::{
    ConfigPatch, ParamError, ParamName, ParameterStore, Preset, PresetOutcome, SimulationConfig, is_small_angle,
};
pub use recorder::{Quantity, Sample, SampleRecorder};
pub use session::{SessionCapture, Simulation};
