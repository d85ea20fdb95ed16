//! Combat tuning knobs shared by every subsystem.
//!
//! Loaded once at startup (RON) and inserted as a `Resource`; the plain
//! structs receive a copy at construction.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// FixedUpdate rate (Hz)
    pub tick_hz: f64,

    /// Height of the ground plane; projectiles crossing it downward expire.
    /// `None` disables ground expiry.
    pub ground_height: Option<f32>,

    /// Gravity used by the default force hook (m/s², positive = down)
    pub gravity: f32,

    /// Upper bound on deferred commands drained per tick (explosion chains,
    /// spawns from removal hooks).
    pub max_command_chain: usize,

    /// Seed for volley spread jitter
    pub rng_seed: u64,

    /// Random jitter added to each volley member (degrees)
    pub volley_jitter_deg: f32,

    /// Type used when `fire` names an unregistered projectile type
    pub fallback_projectile_type: String,

    /// Movement speed at multiplier 1.0 (m/s)
    pub base_move_speed: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60.0,
            ground_height: Some(0.0),
            gravity: 9.81,
            max_command_chain: 64,
            rng_seed: 42,
            volley_jitter_deg: 0.0,
            fallback_projectile_type: "default".into(),
            base_move_speed: 5.0,
        }
    }
}

impl CombatConfig {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: CombatConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tick_hz > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "tick_hz",
                value: self.tick_hz as f32,
            });
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "gravity",
                value: self.gravity,
            });
        }
        if !(self.volley_jitter_deg >= 0.0) || !self.volley_jitter_deg.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "volley_jitter_deg",
                value: self.volley_jitter_deg,
            });
        }
        if !(self.base_move_speed >= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "base_move_speed",
                value: self.base_move_speed,
            });
        }
        Ok(())
    }

    pub fn tick_delta(&self) -> f32 {
        (1.0 / self.tick_hz) as f32
    }
}
