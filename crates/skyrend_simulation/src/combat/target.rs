//! Attack targets: anything damageable the combat core can hit.
//!
//! Targets are owned by the world. The resolver and the projectile system
//! only borrow the list for the duration of one call and never store
//! references between ticks.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::commands::CombatCommands;
use super::geometry;

/// Stable id of a damageable entity (also used for attackers / owners)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub u64);

/// Hit-testable volume of a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HitVolume {
    Sphere { center: Vec3, radius: f32 },
    Aabb { min: Vec3, max: Vec3 },
}

impl HitVolume {
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self::Sphere { center, radius }
    }

    pub fn aabb(min: Vec3, max: Vec3) -> Self {
        Self::Aabb {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn center(&self) -> Vec3 {
        match *self {
            HitVolume::Sphere { center, .. } => center,
            HitVolume::Aabb { min, max } => (min + max) * 0.5,
        }
    }

    /// Smallest sphere enclosing the volume: (center, radius).
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        match *self {
            HitVolume::Sphere { center, radius } => (center, radius.max(0.0)),
            HitVolume::Aabb { min, max } => ((min + max) * 0.5, (max - min).length() * 0.5),
        }
    }

    /// Distance along a unit ray to where it enters the volume.
    ///
    /// 0.0 when the origin is already inside, `None` on a miss or when the
    /// volume lies entirely behind the origin.
    pub fn ray_enter(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        match *self {
            HitVolume::Sphere { center, radius } => {
                geometry::ray_sphere_enter(origin, dir, center, radius)
            }
            HitVolume::Aabb { min, max } => geometry::ray_aabb_enter(origin, dir, min, max),
        }
    }

    /// `ray_enter` against the volume inflated by `pad` (sweep of a sphere).
    pub fn swept_enter(&self, origin: Vec3, dir: Vec3, pad: f32) -> Option<f32> {
        let pad = if pad > 0.0 && pad.is_finite() { pad } else { 0.0 };
        match *self {
            HitVolume::Sphere { center, radius } => {
                geometry::ray_padded_sphere_enter(origin, dir, center, radius, pad)
            }
            HitVolume::Aabb { min, max } => {
                geometry::ray_aabb_enter(origin, dir, min - Vec3::splat(pad), max + Vec3::splat(pad))
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            HitVolume::Sphere { center, radius } => center.is_finite() && radius.is_finite(),
            HitVolume::Aabb { min, max } => min.is_finite() && max.is_finite(),
        }
    }
}

/// How a hit was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitKind {
    Melee,
    MeleeContact,
    Projectile,
    Explosion,
}

/// One damage delivery to one target.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackHit {
    pub target: TargetId,
    pub attacker: Option<TargetId>,
    pub kind: HitKind,
    /// Rounded damage, always > 0
    pub damage: f32,
    /// World-space point of impact (для VFX)
    pub point: Vec3,
    /// Unit direction the hit travelled (zero for radial hits at the center)
    pub direction: Vec3,
    /// Projectile that delivered the hit, if any
    pub projectile: Option<crate::projectile::ProjectileId>,
}

/// Damageable entity supplied by the world.
///
/// `on_hit` must not assume it is called from any particular subsystem. It
/// can queue follow-up work (spawn a projectile, trigger an explosion, grant
/// resources) through `commands`; the queue is drained after the current
/// resolution finishes.
pub trait AttackTarget: Send + Sync {
    fn id(&self) -> TargetId;

    fn is_active(&self) -> bool;

    fn volume(&self) -> HitVolume;

    fn on_hit(&mut self, hit: &AttackHit, commands: &mut CombatCommands);
}

/// Result of a ray query against the target list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetIntersection {
    /// Index into the target slice that was queried
    pub index: usize,
    pub id: TargetId,
    /// Distance along the ray from the origin
    pub distance: f32,
    pub point: Vec3,
}
