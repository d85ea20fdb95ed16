//! Projectile record and the per-call arguments of `fire`.

use std::collections::HashSet;
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::types::{ProjectileHooks, ProjectileRules, VisualHandle};
use super::world::BlockerId;
use crate::combat::{CombatCommands, ExplosionParams, TargetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectileId(pub u64);

/// Shared hit group (one volley): at most one member damages a given target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HitGroupId(pub u64);

/// Why a projectile left the live pool. Alive = in the pool; removal is
/// terminal and reported once as `RemovedProjectile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalCause {
    TargetHit,
    WorldHit,
    /// Consumed by a dynamic blocker (shield, parry)
    BlockerHit,
    /// Max lifetime reached
    Expired,
    /// Crossed the ground plane downward
    GroundHit,
    /// `remove(id)` or a `RemoveProjectile` command
    Forced,
    Cleared,
}

/// Deferred action recorded at `fire` and consumed exactly once at removal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingAction {
    /// Explode with the projectile's own explosion params
    ExplodeOnRemove,
    /// Explode with explicit params (for types without an explosion)
    ExplodeOnRemoveWith(ExplosionParams),
}

/// Input of a force hook for one tick.
#[derive(Debug, Clone, Copy)]
pub struct ForceContext {
    pub projectile: ProjectileId,
    pub position: Vec3,
    pub age: f32,
    /// Configured gravity × type gravity scale (m/s², positive = down)
    pub gravity: f32,
}

/// Per-instance force integration (homing, drag, boomerang...).
///
/// Replaces the default gravity step; mutates the velocity only.
pub trait ForceHook: Send + Sync {
    fn apply_forces(&mut self, ctx: &ForceContext, velocity: &mut Vec3, delta: f32);
}

impl<F> ForceHook for F
where
    F: FnMut(&ForceContext, &mut Vec3, f32) + Send + Sync,
{
    fn apply_forces(&mut self, ctx: &ForceContext, velocity: &mut Vec3, delta: f32) {
        self(ctx, velocity, delta)
    }
}

/// Summary handed to `on_remove` and reported by the tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedProjectile {
    pub id: ProjectileId,
    pub type_id: String,
    pub owner: Option<TargetId>,
    pub position: Vec3,
    pub cause: RemovalCause,
    pub exploded: bool,
}

/// Called exactly once when the projectile leaves the pool.
pub type RemoveHook = Box<dyn FnOnce(&RemovedProjectile, &mut CombatCommands) + Send + Sync>;

/// Arguments of one `fire` call; `Some` overrides win over type defaults.
pub struct FireArgs {
    pub type_id: String,
    pub owner: Option<TargetId>,
    pub speed: Option<f32>,
    pub lifetime: Option<f32>,
    pub radius: Option<f32>,
    pub target_hit_radius: Option<f32>,
    pub damage: Option<f32>,
    pub gravity_scale: Option<f32>,
    pub explosion: Option<ExplosionParams>,
    pub rules: Option<ProjectileRules>,
    pub energy_on_hit: Option<f32>,
    pub mana_on_hit: Option<f32>,
    pub shared_hit_group: Option<HitGroupId>,
    pub single_hit_per_target: bool,
    pub force_hook: Option<Box<dyn ForceHook>>,
    pub on_remove: Option<RemoveHook>,
    pub pending: Option<PendingAction>,
}

impl FireArgs {
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            owner: None,
            speed: None,
            lifetime: None,
            radius: None,
            target_hit_radius: None,
            damage: None,
            gravity_scale: None,
            explosion: None,
            rules: None,
            energy_on_hit: None,
            mana_on_hit: None,
            shared_hit_group: None,
            single_hit_per_target: false,
            force_hook: None,
            on_remove: None,
            pending: None,
        }
    }

    pub fn with_owner(mut self, owner: TargetId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_target_hit_radius(mut self, radius: f32) -> Self {
        self.target_hit_radius = Some(radius);
        self
    }

    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = Some(scale);
        self
    }

    pub fn with_explosion(mut self, explosion: ExplosionParams) -> Self {
        self.explosion = Some(explosion);
        self
    }

    pub fn with_rules(mut self, rules: ProjectileRules) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_grants(mut self, energy: f32, mana: f32) -> Self {
        self.energy_on_hit = Some(energy);
        self.mana_on_hit = Some(mana);
        self
    }

    pub fn in_hit_group(mut self, group: HitGroupId) -> Self {
        self.shared_hit_group = Some(group);
        self
    }

    pub fn single_hit_per_target(mut self) -> Self {
        self.single_hit_per_target = true;
        self
    }

    pub fn with_force_hook(mut self, hook: impl ForceHook + 'static) -> Self {
        self.force_hook = Some(Box::new(hook));
        self
    }

    pub fn on_remove(
        mut self,
        hook: impl FnOnce(&RemovedProjectile, &mut CombatCommands) + Send + Sync + 'static,
    ) -> Self {
        self.on_remove = Some(Box::new(hook));
        self
    }

    pub fn with_pending(mut self, action: PendingAction) -> Self {
        self.pending = Some(action);
        self
    }
}

/// Live projectile, owned by `ProjectileSystem` from spawn to removal.
///
/// Callers only ever get `&Projectile`; bookkeeping is private to the crate.
pub struct Projectile {
    pub id: ProjectileId,
    pub type_id: String,
    pub owner: Option<TargetId>,
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    pub target_hit_radius: f32,
    /// Seconds alive
    pub age: f32,
    pub max_life: f32,
    pub damage: f32,
    pub energy_on_hit: f32,
    pub mana_on_hit: f32,
    pub gravity_scale: f32,
    pub explosion: Option<ExplosionParams>,
    pub rules: ProjectileRules,
    pub shared_hit_group: Option<HitGroupId>,
    pub single_hit_per_target: bool,
    pub pending: Option<PendingAction>,
    pub visual: Option<VisualHandle>,

    /// Stuck in world geometry (non-removing world hit): ages, no motion
    pub(crate) stuck: bool,
    pub(crate) exploded: bool,
    pub(crate) hit_targets: HashSet<TargetId>,
    /// Blockers that already let this projectile through
    pub(crate) passed_blockers: HashSet<BlockerId>,
    pub(crate) force_hook: Option<Box<dyn ForceHook>>,
    pub(crate) on_remove: Option<RemoveHook>,
    pub(crate) hooks: Option<Arc<dyn ProjectileHooks>>,
}

impl Projectile {
    pub fn has_exploded(&self) -> bool {
        self.exploded
    }

    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    /// Targets this projectile already damaged (single-hit history)
    pub fn hit_history(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.hit_targets.iter().copied()
    }
}

impl std::fmt::Debug for Projectile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projectile")
            .field("id", &self.id)
            .field("type_id", &self.type_id)
            .field("owner", &self.owner)
            .field("position", &self.position)
            .field("velocity", &self.velocity)
            .field("age", &self.age)
            .field("max_life", &self.max_life)
            .field("exploded", &self.exploded)
            .finish_non_exhaustive()
    }
}
