//! Combat primitives: attack targets, hit testing, deferred commands.
//!
//! - target: `AttackTarget` trait, hit volumes, `AttackHit`
//! - geometry: ray / sphere / box math
//! - resolver: `AttackTargetResolver` (ray queries, melee, splash)
//! - commands: `CombatCommands` queue for re-entrant follow-ups

pub mod commands;
pub mod geometry;
pub mod resolver;
pub mod target;


pub use commands::{CombatCommand, CombatCommands, ResourceGrant};
pub use geometry::normalize_direction;
pub use resolver::{
    explosion_falloff, rounded_damage, AttackTargetResolver, ContactAttack, ExplosionParams,
    MeleeAttack,
};
pub use target::{AttackHit, AttackTarget, HitKind, HitVolume, TargetId, TargetIntersection};
