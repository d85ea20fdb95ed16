//! Errors raised while loading startup data (config, type tables, character
//! declarations). The per-frame simulation never returns errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("duplicate projectile type id: {0}")]
    DuplicateProjectileType(String),

    #[error("duplicate character id: {0}")]
    DuplicateCharacter(String),

    #[error("duplicate skill key {skill} for character {character}")]
    DuplicateSkill { character: String, skill: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f32 },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
