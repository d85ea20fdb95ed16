//! Obstacles a projectile can run into besides attack targets.
//!
//! - `WorldCollider`: static level geometry, ray or swept-ball cast through
//!   rapier's shape queries (no physics pipeline, no rigid bodies).
//! - `Blocker`: dynamic obstacle (shield, barrier) supplied per tick; the
//!   caller decides whether it actually stops the projectile.

use bevy::prelude::*;
use bevy_rapier3d::parry::query::{self, ShapeCastOptions};
use bevy_rapier3d::parry::shape::Ball;
use bevy_rapier3d::prelude::Collider;
use bevy_rapier3d::rapier::math::{Isometry, Real, Vector};

use super::record::ProjectileId;
use crate::combat::{HitVolume, TargetId};

/// Static collider placed in the world.
#[derive(Clone)]
pub struct WorldCollider {
    pub collider: Collider,
    pub translation: Vec3,
    pub rotation: Quat,
}

impl WorldCollider {
    pub fn new(collider: Collider, translation: Vec3, rotation: Quat) -> Self {
        Self {
            collider,
            translation,
            rotation,
        }
    }

    /// Axis-aligned box wall/floor from its center and half extents.
    pub fn cuboid(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(
            Collider::cuboid(half_extents.x, half_extents.y, half_extents.z),
            center,
            Quat::IDENTITY,
        )
    }

    pub fn ball(center: Vec3, radius: f32) -> Self {
        Self::new(Collider::ball(radius), center, Quat::IDENTITY)
    }

    /// Distance along a unit ray to the surface, within `max_distance`.
    ///
    /// Solid cast: an origin inside the shape reports 0.
    pub fn cast(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<f32> {
        if !(max_distance > 0.0) {
            return None;
        }
        self.collider
            .cast_ray(self.translation, self.rotation, origin, dir, max_distance, true)
            .filter(|toi| toi.is_finite() && *toi >= 0.0)
    }

    /// Same as `cast`, but for a ball of `radius` moving along the ray:
    /// distance the ball's center travels before touching the surface.
    pub fn cast_ball(&self, origin: Vec3, dir: Vec3, max_distance: f32, radius: f32) -> Option<f32> {
        if !(radius > 0.0) || !radius.is_finite() {
            return self.cast(origin, dir, max_distance);
        }
        if !(max_distance > 0.0) {
            return None;
        }
        let shape_pos: Isometry<Real> = (self.translation, self.rotation).into();
        let ball_pos: Isometry<Real> = (origin, Quat::IDENTITY).into();
        let still: Vector<Real> = Vec3::ZERO.into();
        let motion: Vector<Real> = dir.into();
        let options = ShapeCastOptions::with_max_time_of_impact(max_distance);
        query::cast_shapes(
            &shape_pos,
            &still,
            &*self.collider.raw,
            &ball_pos,
            &motion,
            &Ball::new(radius),
            options,
        )
        .ok()
        .flatten()
        .map(|hit| hit.time_of_impact)
        .filter(|toi| toi.is_finite() && *toi >= 0.0)
    }
}

impl std::fmt::Debug for WorldCollider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldCollider")
            .field("translation", &self.translation)
            .field("rotation", &self.rotation)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockerId(pub u64);

/// Dynamic obstacle for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blocker {
    pub id: BlockerId,
    /// Entity that raised the blocker (its runtime decides on the hit)
    pub owner: Option<TargetId>,
    pub volume: HitVolume,
}

impl Blocker {
    pub fn new(id: BlockerId, volume: HitVolume) -> Self {
        Self {
            id,
            owner: None,
            volume,
        }
    }

    pub fn owned_by(mut self, owner: TargetId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Projectile reaching a blocker, passed to the block callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockHit {
    pub blocker: BlockerId,
    pub blocker_owner: Option<TargetId>,
    pub projectile: ProjectileId,
    pub projectile_owner: Option<TargetId>,
    pub point: Vec3,
    pub velocity: Vec3,
    pub damage: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_cast_reports_surface_distance() {
        let wall = WorldCollider::cuboid(Vec3::new(0.0, 0.0, 5.0), Vec3::new(2.0, 2.0, 0.5));
        let toi = wall.cast(Vec3::ZERO, Vec3::Z, 10.0).unwrap();
        assert!((toi - 4.5).abs() < 1e-3);

        assert!(wall.cast(Vec3::ZERO, Vec3::Z, 3.0).is_none());
        assert!(wall.cast(Vec3::ZERO, -Vec3::Z, 10.0).is_none());
        assert!(wall.cast(Vec3::ZERO, Vec3::Z, 0.0).is_none());
    }

    #[test]
    fn test_ball_cast_touches_before_ray_and_catches_grazes() {
        let wall = WorldCollider::cuboid(Vec3::new(0.0, 0.0, 5.0), Vec3::new(2.0, 2.0, 0.5));
        let toi = wall.cast_ball(Vec3::ZERO, Vec3::Z, 10.0, 0.5).unwrap();
        assert!((toi - 4.0).abs() < 1e-3);

        // Луч в 0.3 от края стены проходит мимо, шар радиуса 0.5 задевает
        let edge = Vec3::new(2.3, 0.0, 0.0);
        assert!(wall.cast(edge, Vec3::Z, 10.0).is_none());
        assert!(wall.cast_ball(edge, Vec3::Z, 10.0, 0.5).is_some());

        // Нулевой радиус = обычный луч
        assert_eq!(wall.cast_ball(Vec3::ZERO, Vec3::Z, 10.0, 0.0), wall.cast(Vec3::ZERO, Vec3::Z, 10.0));
    }
}
