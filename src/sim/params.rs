//! Oscillator parameters
//!
//! `ParameterStore` is the only place the active `SimulationConfig` is
//! mutated. Edits are parsed and validated here; bad input is rejected and
//! the previous value stays in place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::kinematics::OscillatorKind;
use crate::consts::{MAX_PENDULUM_ANGLE_DEG, SMALL_ANGLE_THRESHOLD_DEG, TIME_SCALE_MAX, TIME_SCALE_MIN};

/// Full oscillator configuration for a session.
///
/// Invariants (held by `ParameterStore`): mass, spring_constant, length and
/// gravity are strictly positive; time_scale lies inside the configured
/// clamp range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    #[serde(rename = "type")]
    pub kind: OscillatorKind,
    /// kg (both models)
    pub mass: f64,
    /// N/m (spring)
    pub spring_constant: f64,
    /// m (spring)
    pub amplitude: f64,
    /// m (pendulum)
    pub length: f64,
    /// m/s² (pendulum)
    pub gravity: f64,
    /// Release angle in degrees (pendulum)
    pub angle: f64,
    /// Collected and persisted; the closed-form engine is undamped
    pub damping: f64,
    /// Virtual seconds per real second
    pub time_scale: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            kind: OscillatorKind::Spring,
            mass: 1.0,
            spring_constant: 10.0,
            amplitude: 0.5,
            length: 1.0,
            gravity: 9.81,
            angle: 15.0,
            damping: 0.0,
            time_scale: 1.0,
        }
    }
}

impl SimulationConfig {
    pub fn get(&self, param: ParamName) -> f64 {
        match param {
            ParamName::Mass => self.mass,
            ParamName::SpringConstant => self.spring_constant,
            ParamName::Amplitude => self.amplitude,
            ParamName::Length => self.length,
            ParamName::Gravity => self.gravity,
            ParamName::Angle => self.angle,
            ParamName::Damping => self.damping,
            ParamName::TimeScale => self.time_scale,
        }
    }

    fn slot(&mut self, param: ParamName) -> &mut f64 {
        match param {
            ParamName::Mass => &mut self.mass,
            ParamName::SpringConstant => &mut self.spring_constant,
            ParamName::Amplitude => &mut self.amplitude,
            ParamName::Length => &mut self.length,
            ParamName::Gravity => &mut self.gravity,
            ParamName::Angle => &mut self.angle,
            ParamName::Damping => &mut self.damping,
            ParamName::TimeScale => &mut self.time_scale,
        }
    }
}

/// Whether the small-angle pendulum model holds for a release angle (degrees)
pub fn is_small_angle(angle_deg: f64) -> bool {
    angle_deg.abs() <= SMALL_ANGLE_THRESHOLD_DEG
}

/// Numeric parameter names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    Mass,
    SpringConstant,
    Amplitude,
    Length,
    Gravity,
    Angle,
    Damping,
    TimeScale,
}

impl ParamName {
    pub const ALL: [ParamName; 8] = [
        ParamName::Mass,
        ParamName::SpringConstant,
        ParamName::Amplitude,
        ParamName::Length,
        ParamName::Gravity,
        ParamName::Angle,
        ParamName::Damping,
        ParamName::TimeScale,
    ];

    /// Wire name (matches the persisted JSON field)
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::Mass => "mass",
            ParamName::SpringConstant => "springConstant",
            ParamName::Amplitude => "amplitude",
            ParamName::Length => "length",
            ParamName::Gravity => "gravity",
            ParamName::Angle => "angle",
            ParamName::Damping => "damping",
            ParamName::TimeScale => "timeScale",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "mass" => Some(ParamName::Mass),
            "springConstant" | "spring_constant" => Some(ParamName::SpringConstant),
            "amplitude" => Some(ParamName::Amplitude),
            "length" => Some(ParamName::Length),
            "gravity" => Some(ParamName::Gravity),
            "angle" => Some(ParamName::Angle),
            "damping" => Some(ParamName::Damping),
            "timeScale" | "time_scale" => Some(ParamName::TimeScale),
            _ => None,
        }
    }

    /// Whether the parameter has any meaning for `kind`
    pub fn applies_to(&self, kind: OscillatorKind) -> bool {
        match self {
            ParamName::Mass | ParamName::Damping | ParamName::TimeScale => true,
            ParamName::SpringConstant | ParamName::Amplitude => kind == OscillatorKind::Spring,
            ParamName::Length | ParamName::Gravity | ParamName::Angle => {
                kind == OscillatorKind::Pendulum
            }
        }
    }
}

/// Rejected parameter edit
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("unknown parameter: {0}")]
    Unknown(String),

    #[error("{name} is not a number: {raw:?}")]
    NotNumeric { name: &'static str, raw: String },

    #[error("{name} out of range: {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

/// Typed partial configuration.
///
/// Used by presets, snapshots and imports. Only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<OscillatorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spring_constant: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amplitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damping: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_scale: Option<f64>,
}

impl ConfigPatch {
    pub fn get(&self, param: ParamName) -> Option<f64> {
        match param {
            ParamName::Mass => self.mass,
            ParamName::SpringConstant => self.spring_constant,
            ParamName::Amplitude => self.amplitude,
            ParamName::Length => self.length,
            ParamName::Gravity => self.gravity,
            ParamName::Angle => self.angle,
            ParamName::Damping => self.damping,
            ParamName::TimeScale => self.time_scale,
        }
    }

    /// Builder-style setter
    pub fn with(mut self, param: ParamName, value: f64) -> Self {
        let slot = match param {
            ParamName::Mass => &mut self.mass,
            ParamName::SpringConstant => &mut self.spring_constant,
            ParamName::Amplitude => &mut self.amplitude,
            ParamName::Length => &mut self.length,
            ParamName::Gravity => &mut self.gravity,
            ParamName::Angle => &mut self.angle,
            ParamName::Damping => &mut self.damping,
            ParamName::TimeScale => &mut self.time_scale,
        };
        *slot = Some(value);
        self
    }

    pub fn for_kind(kind: OscillatorKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && ParamName::ALL.iter().all(|p| self.get(*p).is_none())
    }
}

/// What `apply_preset` did with each field of the patch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetOutcome {
    pub applied: Vec<ParamName>,
    /// Present in the patch but meaningless for the active oscillator
    pub ignored: Vec<ParamName>,
    /// Failed validation; previous value kept
    pub rejected: Vec<ParamName>,
}

/// Built-in parameter presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    DefaultSpring,
    HeavyMass,
    StiffSpring,
    DefaultPendulum,
    SecondsPendulum,
    LunarPendulum,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::DefaultSpring,
        Preset::HeavyMass,
        Preset::StiffSpring,
        Preset::DefaultPendulum,
        Preset::SecondsPendulum,
        Preset::LunarPendulum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::DefaultSpring => "Default spring",
            Preset::HeavyMass => "Heavy mass",
            Preset::StiffSpring => "Stiff spring",
            Preset::DefaultPendulum => "Default pendulum",
            Preset::SecondsPendulum => "Seconds pendulum",
            Preset::LunarPendulum => "Lunar pendulum",
        }
    }

    pub fn patch(&self) -> ConfigPatch {
        use OscillatorKind::{Pendulum, Spring};
        use ParamName::*;
        match self {
            Preset::DefaultSpring => ConfigPatch::for_kind(Spring)
                .with(Mass, 1.0)
                .with(SpringConstant, 10.0)
                .with(Amplitude, 0.5),
            Preset::HeavyMass => ConfigPatch::for_kind(Spring)
                .with(Mass, 5.0)
                .with(SpringConstant, 10.0)
                .with(Amplitude, 0.5),
            Preset::StiffSpring => ConfigPatch::for_kind(Spring)
                .with(Mass, 1.0)
                .with(SpringConstant, 100.0)
                .with(Amplitude, 0.2),
            Preset::DefaultPendulum => ConfigPatch::for_kind(Pendulum)
                .with(Mass, 1.0)
                .with(Length, 1.0)
                .with(Gravity, 9.81)
                .with(Angle, 15.0),
            // Half period of one second at standard gravity
            Preset::SecondsPendulum => ConfigPatch::for_kind(Pendulum)
                .with(Length, 0.994)
                .with(Gravity, 9.81)
                .with(Angle, 5.0),
            Preset::LunarPendulum => ConfigPatch::for_kind(Pendulum)
                .with(Length, 1.0)
                .with(Gravity, 1.62)
                .with(Angle, 10.0),
        }
    }
}

/// Holds and validates the active configuration
#[derive(Debug, Clone)]
pub struct ParameterStore {
    config: SimulationConfig,
    time_scale_min: f64,
    time_scale_max: f64,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(SimulationConfig::default(), TIME_SCALE_MIN, TIME_SCALE_MAX)
    }
}

impl ParameterStore {
    pub fn new(config: SimulationConfig, time_scale_min: f64, time_scale_max: f64) -> Self {
        let mut store = Self {
            config: SimulationConfig::default(),
            time_scale_min,
            time_scale_max,
        };
        // Route the initial values through validation so defaults obey the range too
        store.config.kind = config.kind;
        for param in ParamName::ALL {
            if let Err(e) = store.set_value(param, config.get(param)) {
                log::warn!("Initial {} rejected: {}", param.as_str(), e);
            }
        }
        store
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn kind(&self) -> OscillatorKind {
        self.config.kind
    }

    pub fn get(&self, param: ParamName) -> f64 {
        self.config.get(param)
    }

    pub fn set_kind(&mut self, kind: OscillatorKind) {
        if self.config.kind != kind {
            log::debug!("Oscillator switched to {}", kind.as_str());
            self.config.kind = kind;
        }
    }

    /// Parse and apply a raw edit from the UI. Returns the stored value.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<f64, ParamError> {
        let param = ParamName::from_str(name).ok_or_else(|| ParamError::Unknown(name.to_string()))?;
        let value: f64 = raw.trim().parse().map_err(|_| ParamError::NotNumeric {
            name: param.as_str(),
            raw: raw.to_string(),
        })?;
        self.set_value(param, value)
    }

    /// Validate and apply a numeric edit. Returns the stored value, which
    /// may differ from `value` when it was clamped.
    pub fn set_value(&mut self, param: ParamName, value: f64) -> Result<f64, ParamError> {
        let out_of_range = || ParamError::OutOfRange {
            name: param.as_str(),
            value,
        };
        if !value.is_finite() {
            return Err(out_of_range());
        }

        let stored = match param {
            ParamName::Mass | ParamName::SpringConstant | ParamName::Length | ParamName::Gravity => {
                if value <= 0.0 {
                    return Err(out_of_range());
                }
                value
            }
            ParamName::Amplitude | ParamName::Damping => {
                if value < 0.0 {
                    return Err(out_of_range());
                }
                value
            }
            ParamName::Angle => {
                if value.abs() > MAX_PENDULUM_ANGLE_DEG {
                    return Err(out_of_range());
                }
                if !is_small_angle(value) {
                    log::debug!("Angle {}° is past the small-angle range; period is approximate", value);
                }
                value
            }
            ParamName::TimeScale => value.clamp(self.time_scale_min, self.time_scale_max),
        };

        *self.config.slot(param) = stored;
        Ok(stored)
    }

    /// Merge a partial configuration.
    ///
    /// The patch's `kind` (if any) is applied first; numeric fields that do
    /// not apply to the resulting oscillator are ignored, invalid values are
    /// rejected, everything else is overwritten.
    pub fn apply_preset(&mut self, patch: &ConfigPatch) -> PresetOutcome {
        if let Some(kind) = patch.kind {
            self.set_kind(kind);
        }
        let kind = self.config.kind;

        let mut outcome = PresetOutcome::default();
        for param in ParamName::ALL {
            let Some(value) = patch.get(param) else { continue };
            if !param.applies_to(kind) {
                log::debug!("Preset field {} ignored for {}", param.as_str(), kind.as_str());
                outcome.ignored.push(param);
                continue;
            }
            match self.set_value(param, value) {
                Ok(_) => outcome.applied.push(param),
                Err(e) => {
                    log::debug!("Preset field rejected: {}", e);
                    outcome.rejected.push(param);
                }
            }
        }
        outcome
    }

    /// The fields that describe the active oscillator, as a patch.
    /// This is what snapshots persist.
    pub fn active_patch(&self) -> ConfigPatch {
        let kind = self.config.kind;
        ParamName::ALL
            .iter()
            .filter(|p| p.applies_to(kind))
            .fold(ConfigPatch::for_kind(kind), |patch, p| patch.with(*p, self.get(*p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_parses_numeric_input() {
        let mut store = ParameterStore::default();
        assert_eq!(store.set("mass", " 2.5 "), Ok(2.5));
        assert_eq!(store.get(ParamName::Mass), 2.5);
    }

    #[test]
    fn test_set_rejects_non_numeric_and_keeps_previous() {
        let mut store = ParameterStore::default();
        store.set("springConstant", "40").unwrap();
        let err = store.set("springConstant", "forty").unwrap_err();
        assert!(matches!(err, ParamError::NotNumeric { .. }));
        assert_eq!(store.get(ParamName::SpringConstant), 40.0);
    }

    #[test]
    fn test_set_rejects_non_positive_mass() {
        let mut store = ParameterStore::default();
        assert!(store.set("mass", "0").is_err());
        assert!(store.set("mass", "-3").is_err());
        assert!(store.set("mass", "NaN").is_err());
        assert_eq!(store.get(ParamName::Mass), 1.0);
    }

    #[test]
    fn test_unknown_parameter() {
        let mut store = ParameterStore::default();
        assert_eq!(
            store.set("spin", "1"),
            Err(ParamError::Unknown("spin".to_string()))
        );
    }

    #[test]
    fn test_time_scale_clamped() {
        let mut store = ParameterStore::new(SimulationConfig::default(), 0.25, 2.0);
        assert_eq!(store.set("timeScale", "10"), Ok(2.0));
        assert_eq!(store.set("timeScale", "0"), Ok(0.25));
        assert_eq!(store.set("timeScale", "1.5"), Ok(1.5));
    }

    #[test]
    fn test_angle_limit() {
        let mut store = ParameterStore::default();
        assert!(store.set("angle", "95").is_err());
        // Accepted, but outside the accurate range of the model
        assert_eq!(store.set("angle", "-30"), Ok(-30.0));
        assert!(!is_small_angle(store.get(ParamName::Angle)));
        assert!(is_small_angle(15.0));
        assert!(is_small_angle(-10.0));
    }

    #[test]
    fn test_apply_preset_overrides_only_listed_fields() {
        let mut store = ParameterStore::default();
        store.set("amplitude", "0.8").unwrap();
        let patch = ConfigPatch::default().with(ParamName::Mass, 3.0);
        let outcome = store.apply_preset(&patch);
        assert_eq!(outcome.applied, vec![ParamName::Mass]);
        assert_eq!(store.get(ParamName::Mass), 3.0);
        assert_eq!(store.get(ParamName::Amplitude), 0.8);
    }

    #[test]
    fn test_apply_preset_ignores_inapplicable_fields() {
        let mut store = ParameterStore::default();
        let patch = ConfigPatch::default()
            .with(ParamName::Length, 4.0)
            .with(ParamName::SpringConstant, 20.0);
        let outcome = store.apply_preset(&patch);
        assert_eq!(outcome.ignored, vec![ParamName::Length]);
        assert_eq!(outcome.applied, vec![ParamName::SpringConstant]);
        assert_eq!(store.get(ParamName::Length), 1.0);
    }

    #[test]
    fn test_apply_preset_switches_kind_first() {
        let mut store = ParameterStore::default();
        let outcome = store.apply_preset(&Preset::LunarPendulum.patch());
        assert_eq!(store.kind(), OscillatorKind::Pendulum);
        assert!(outcome.ignored.is_empty());
        assert_eq!(store.get(ParamName::Gravity), 1.62);
    }

    #[test]
    fn test_apply_preset_rejects_invalid_values() {
        let mut store = ParameterStore::default();
        let patch = ConfigPatch::default().with(ParamName::Mass, -1.0);
        let outcome = store.apply_preset(&patch);
        assert_eq!(outcome.rejected, vec![ParamName::Mass]);
        assert_eq!(store.get(ParamName::Mass), 1.0);
    }

    #[test]
    fn test_active_patch_covers_active_fields() {
        let mut store = ParameterStore::default();
        store.set_kind(OscillatorKind::Pendulum);
        let patch = store.active_patch();
        assert_eq!(patch.kind, Some(OscillatorKind::Pendulum));
        assert_eq!(patch.length, Some(1.0));
        assert_eq!(patch.spring_constant, None);
        assert_eq!(patch.time_scale, Some(1.0));
    }

    #[test]
    fn test_patch_json_uses_wire_names() {
        let patch = ConfigPatch::for_kind(OscillatorKind::Spring).with(ParamName::SpringConstant, 50.0);
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"type":"spring","springConstant":50.0}"#);
    }

    #[test]
    fn test_every_preset_applies_cleanly() {
        for preset in Preset::ALL {
            let mut store = ParameterStore::default();
            let outcome = store.apply_preset(&preset.patch());
            assert!(outcome.ignored.is_empty(), "{}", preset.name());
            assert!(outcome.rejected.is_empty(), "{}", preset.name());
        }
    }
}
