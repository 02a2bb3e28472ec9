//! One running lab session
//!
//! Owns the parameter store, the clock and the sample series, and keeps
//! them consistent: edits go through the store, frames through the clock,
//! samples into the recorder.

use super::clock::{ClockDriver, ClockState, FrameOutcome, FrameScheduler, FrameToken};
use super::kinematics::{Kinematics, OscillatorKind, body_position, evaluate, frequency, period};
use super::params::{ConfigPatch, ParamError, ParameterStore, PresetOutcome, SimulationConfig};
use super::recorder::{Sample, SampleRecorder};
use crate::settings::LabSettings;

/// Everything a snapshot needs to restore a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCapture {
    pub kind: OscillatorKind,
    pub parameters: ConfigPatch,
    pub clock: ClockState,
    pub recent_samples: Vec<Sample>,
}

pub struct Simulation {
    params: ParameterStore,
    clock: ClockDriver,
    recorder: SampleRecorder,
    snapshot_sample_limit: usize,
}

impl Simulation {
    pub fn new(settings: &LabSettings, scheduler: Box<dyn FrameScheduler>) -> Self {
        let config = SimulationConfig {
            kind: settings.default_oscillator,
            ..SimulationConfig::default()
        };
        Self {
            params: ParameterStore::new(config, settings.time_scale_min, settings.time_scale_max),
            clock: ClockDriver::with_timing(scheduler, settings.sample_interval, settings.max_frame_delta),
            recorder: SampleRecorder::new(settings.sample_cap),
            snapshot_sample_limit: settings.snapshot_sample_limit,
        }
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn config(&self) -> &SimulationConfig {
        self.params.config()
    }

    pub fn clock_state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn recorder(&self) -> &SampleRecorder {
        &self.recorder
    }

    pub fn set_parameter(&mut self, name: &str, raw: &str) -> Result<f64, ParamError> {
        self.params.set(name, raw)
    }

    /// Switch oscillator model. Rewinds, since the old series no longer
    /// describes the new system.
    pub fn set_oscillator(&mut self, kind: OscillatorKind) {
        if self.params.kind() != kind {
            self.params.set_kind(kind);
            self.clock.reset(&mut self.recorder);
        }
    }

    /// A preset that names a different oscillator switches to it first
    pub fn apply_preset(&mut self, patch: &ConfigPatch) -> PresetOutcome {
        if let Some(kind) = patch.kind {
            self.set_oscillator(kind);
        }
        self.params.apply_preset(patch)
    }

    pub fn start(&mut self) {
        self.clock.start();
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    pub fn toggle(&mut self) {
        self.clock.toggle();
    }

    pub fn reset(&mut self) {
        self.clock.reset(&mut self.recorder);
    }

    /// Host frame callback
    pub fn on_frame(&mut self, token: FrameToken, timestamp_ms: f64) -> FrameOutcome {
        self.clock
            .on_frame(token, timestamp_ms, self.params.config(), &mut self.recorder)
    }

    /// Kinematics at the current virtual time
    pub fn current_values(&self) -> Kinematics {
        let config = self.params.config();
        evaluate(config.kind, config, self.clock.virtual_time())
    }

    /// Mass/bob position for drawing
    pub fn body_position(&self) -> glam::DVec2 {
        let config = self.params.config();
        body_position(config.kind, config, &self.current_values())
    }

    pub fn period(&self) -> f64 {
        let config = self.params.config();
        period(config.kind, config)
    }

    pub fn frequency(&self) -> f64 {
        let config = self.params.config();
        frequency(config.kind, config)
    }

    pub fn sample_series(&self) -> Vec<Sample> {
        self.recorder.series()
    }

    /// Deep copy of the state a snapshot persists
    pub fn capture(&self) -> SessionCapture {
        SessionCapture {
            kind: self.params.kind(),
            parameters: self.params.active_patch(),
            clock: self.clock.state(),
            recent_samples: self.recorder.recent(self.snapshot_sample_limit),
        }
    }

    /// Restore a captured session: stop, set the model, override the listed
    /// parameters, seek, restore samples, and restart if it was running.
    pub fn restore(&mut self, capture: &SessionCapture) -> PresetOutcome {
        self.clock.stop();
        self.params.set_kind(capture.kind);
        let mut parameters = capture.parameters.clone();
        parameters.kind = Some(capture.kind);
        let outcome = self.params.apply_preset(&parameters);

        self.clock.seek(capture.clock.virtual_time);
        if capture.recent_samples.is_empty() {
            self.recorder.clear();
        } else {
            self.recorder.restore(&capture.recent_samples);
        }

        if capture.clock.running {
            self.clock.start();
        }
        outcome
    }
}
