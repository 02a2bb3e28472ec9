//! Closed-form SHM kinematics
//!
//! Undamped, phase zero: every oscillator is released from maximum
//! displacement with zero velocity at `t = 0`.
//!
//! - Spring: `x(t) = A cos(ωt)`, `ω = √(k/m)`
//! - Pendulum (small angle): `θ(t) = θ0 cos(ωt)`, `ω = √(g/L)`
//!
//! `damping` is carried by the configuration but does not enter these
//! expressions.

use std::f64::consts::TAU;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::params::SimulationConfig;

/// Which oscillator model is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OscillatorKind {
    #[default]
    Spring,
    Pendulum,
}

impl OscillatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OscillatorKind::Spring => "spring",
            OscillatorKind::Pendulum => "pendulum",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "spring" | "spring-mass" => Some(OscillatorKind::Spring),
            "pendulum" => Some(OscillatorKind::Pendulum),
            _ => None,
        }
    }
}

/// Energy split at an instant (joules)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Energy {
    pub kinetic: f64,
    pub potential: f64,
    pub total: f64,
}

/// Instantaneous state of the oscillator.
///
/// For the spring, position is metres. For the pendulum, position is the
/// angle in radians and velocity/acceleration are angular.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Kinematics {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub energy: Energy,
}

impl Kinematics {
    /// True when every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.acceleration.is_finite()
            && self.energy.kinetic.is_finite()
            && self.energy.potential.is_finite()
            && self.energy.total.is_finite()
    }
}

/// Natural angular frequency ω (rad/s)
pub fn angular_frequency(kind: OscillatorKind, config: &SimulationConfig) -> f64 {
    match kind {
        OscillatorKind::Spring => (config.spring_constant / config.mass).sqrt(),
        OscillatorKind::Pendulum => (config.gravity / config.length).sqrt(),
    }
}

/// Period T = 2π/ω (seconds)
pub fn period(kind: OscillatorKind, config: &SimulationConfig) -> f64 {
    TAU / angular_frequency(kind, config)
}

/// Frequency f = 1/T (Hz)
pub fn frequency(kind: OscillatorKind, config: &SimulationConfig) -> f64 {
    angular_frequency(kind, config) / TAU
}

/// Evaluate the oscillator at virtual time `t`.
///
/// Callers guarantee the positivity invariants of [`SimulationConfig`];
/// the parameter store enforces them on every edit.
pub fn evaluate(kind: OscillatorKind, config: &SimulationConfig, t: f64) -> Kinematics {
    let omega = angular_frequency(kind, config);
    let (sin, cos) = (omega * t).sin_cos();

    match kind {
        OscillatorKind::Spring => {
            let a = config.amplitude;
            let x = a * cos;
            let v = -a * omega * sin;
            let acc = -a * omega * omega * cos;
            let kinetic = 0.5 * config.mass * v * v;
            let potential = 0.5 * config.spring_constant * x * x;
            Kinematics {
                position: x,
                velocity: v,
                acceleration: acc,
                energy: Energy {
                    kinetic,
                    potential,
                    total: kinetic + potential,
                },
            }
        }
        OscillatorKind::Pendulum => {
            let theta0 = config.angle.to_radians();
            let theta = theta0 * cos;
            let w = -theta0 * omega * sin;
            let alpha = -theta0 * omega * omega * cos;
            let m = config.mass;
            let l = config.length;
            let kinetic = 0.5 * m * l * l * w * w;
            let potential = m * config.gravity * l * (1.0 - theta.cos());
            Kinematics {
                position: theta,
                velocity: w,
                acceleration: alpha,
                energy: Energy {
                    kinetic,
                    potential,
                    total: kinetic + potential,
                },
            }
        }
    }
}

/// Cartesian position of the moving mass relative to its anchor (metres).
///
/// Spring: the mass slides along +x. Pendulum: the bob hangs below the
/// pivot, y pointing up.
pub fn body_position(kind: OscillatorKind, config: &SimulationConfig, state: &Kinematics) -> DVec2 {
    match kind {
        OscillatorKind::Spring => DVec2::new(state.position, 0.0),
        OscillatorKind::Pendulum => {
            let (sin, cos) = state.position.sin_cos();
            DVec2::new(config.length * sin, -config.length * cos)
        }
    }
}
