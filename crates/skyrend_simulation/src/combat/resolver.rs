//! AttackTargetResolver: geometric hit testing against attack targets.
//!
//! Every primitive degrades to a zero-effect result on bad input
//! (non-positive damage/distance/radius, zero-length direction, NaN, empty
//! target list). Nothing here panics or returns an error: a dropped hit is
//! preferable to aborting a live combat tick.
//!
//! Damage delivery is two-phase: candidates are collected and sorted first,
//! then `on_hit` runs once per chosen target. Callbacks only see
//! `CombatCommands`, so they cannot mutate the list mid-iteration.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::commands::CombatCommands;
use super::geometry::{self, lerp, normalize_direction};
use super::target::{AttackHit, AttackTarget, HitKind, TargetId, TargetIntersection};
use crate::projectile::ProjectileId;

/// Splash parameters with linear center-to-edge falloff.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExplosionParams {
    pub radius: f32,
    pub base_damage: f32,
    pub min_damage: f32,
}

impl ExplosionParams {
    pub fn new(radius: f32, base_damage: f32, min_damage: f32) -> Self {
        Self {
            radius,
            base_damage,
            min_damage,
        }
    }

    pub fn is_effective(&self) -> bool {
        self.radius > 0.0 && self.base_damage > 0.0
    }
}

/// Forward melee sweep (sword arc approximated by a thick ray).
#[derive(Debug, Clone, PartialEq)]
pub struct MeleeAttack {
    pub attacker: Option<TargetId>,
    pub origin: Vec3,
    pub direction: Vec3,
    pub damage: f32,
    pub max_distance: f32,
    pub hit_radius: f32,
    pub max_hits: usize,
    pub exclude: Vec<TargetId>,
}

impl MeleeAttack {
    pub fn new(origin: Vec3, direction: Vec3, damage: f32, max_distance: f32) -> Self {
        Self {
            attacker: None,
            origin,
            direction,
            damage,
            max_distance,
            hit_radius: 0.5,
            max_hits: 1,
            exclude: Vec::new(),
        }
    }

    pub fn with_attacker(mut self, attacker: TargetId) -> Self {
        self.attacker = Some(attacker);
        self
    }

    pub fn with_hit_radius(mut self, hit_radius: f32) -> Self {
        self.hit_radius = hit_radius;
        self
    }

    pub fn with_max_hits(mut self, max_hits: usize) -> Self {
        self.max_hits = max_hits;
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = TargetId>) -> Self {
        self.exclude.extend(ids);
        self
    }
}

/// Point-blank strike: sphere overlap without forward projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactAttack {
    pub attacker: Option<TargetId>,
    pub center: Vec3,
    pub direction: Vec3,
    pub damage: f32,
    pub radius: f32,
    pub max_hits: usize,
}

/// Direct-hit damage is rounded and never below 1. `None` for non-positive / NaN.
pub fn rounded_damage(damage: f32) -> Option<f32> {
    if !(damage > 0.0) || !damage.is_finite() {
        return None;
    }
    Some(damage.round().max(1.0))
}

/// Splash damage at `distance` from the center.
///
/// `max(min, round(lerp(min, base, 1 - distance / radius)))`, `None` outside
/// the radius or for degenerate parameters.
pub fn explosion_falloff(distance: f32, explosion: &ExplosionParams) -> Option<f32> {
    let ExplosionParams {
        radius,
        base_damage,
        min_damage,
    } = *explosion;
    if !(radius > 0.0) || !(base_damage > 0.0) || !base_damage.is_finite() {
        return None;
    }
    if !(distance >= 0.0) || distance > radius {
        return None;
    }
    let min_damage = if min_damage.is_finite() {
        min_damage.max(0.0)
    } else {
        0.0
    };
    let t = 1.0 - distance / radius;
    let damage = lerp(min_damage, base_damage, t).round().max(min_damage);
    (damage > 0.0).then_some(damage)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    distance: f32,
    point: Vec3,
}

/// Stateless hit-testing front end; all methods borrow the target list for
/// the duration of the call only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttackTargetResolver;

impl AttackTargetResolver {
    pub fn new() -> Self {
        Self
    }

    /// Nearest active target pierced by the ray within `far`.
    pub fn intersect_by_ray(
        &self,
        targets: &[Box<dyn AttackTarget>],
        origin: Vec3,
        direction: Vec3,
        far: f32,
    ) -> Option<TargetIntersection> {
        self.intersect_by_ray_filtered(targets, origin, direction, far, &|_| true)
    }

    pub fn intersect_by_ray_filtered(
        &self,
        targets: &[Box<dyn AttackTarget>],
        origin: Vec3,
        direction: Vec3,
        far: f32,
        accept: &dyn Fn(TargetId) -> bool,
    ) -> Option<TargetIntersection> {
        let dir = normalize_direction(direction)?;
        if !(far > 0.0) || !origin.is_finite() {
            return None;
        }

        let mut best: Option<TargetIntersection> = None;
        for (index, target) in targets.iter().enumerate() {
            if !target.is_active() || !accept(target.id()) {
                continue;
            }
            let volume = target.volume();
            if !volume.is_finite() {
                continue;
            }
            let Some(distance) = volume.ray_enter(origin, dir) else {
                continue;
            };
            if distance > far {
                continue;
            }
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(TargetIntersection {
                    index,
                    id: target.id(),
                    distance,
                    point: origin + dir * distance,
                });
            }
        }
        best
    }

    /// Nearest active target whose bounding sphere comes within
    /// `hit_radius` of the ray (radius-aware sweep for thick shapes).
    pub fn intersect_by_radius(
        &self,
        targets: &[Box<dyn AttackTarget>],
        origin: Vec3,
        direction: Vec3,
        far: f32,
        hit_radius: f32,
    ) -> Option<TargetIntersection> {
        self.intersect_by_radius_filtered(targets, origin, direction, far, hit_radius, &|_| true)
    }

    pub fn intersect_by_radius_filtered(
        &self,
        targets: &[Box<dyn AttackTarget>],
        origin: Vec3,
        direction: Vec3,
        far: f32,
        hit_radius: f32,
        accept: &dyn Fn(TargetId) -> bool,
    ) -> Option<TargetIntersection> {
        let dir = normalize_direction(direction)?;
        if !(far > 0.0) || !(hit_radius > 0.0) || !origin.is_finite() {
            return None;
        }

        let mut best: Option<TargetIntersection> = None;
        for (index, target) in targets.iter().enumerate() {
            if !target.is_active() || !accept(target.id()) {
                continue;
            }
            let volume = target.volume();
            if !volume.is_finite() {
                continue;
            }
            let (center, radius) = volume.bounding_sphere();
            let Some(distance) =
                geometry::ray_padded_sphere_enter(origin, dir, center, radius, hit_radius)
            else {
                continue;
            };
            if distance > far {
                continue;
            }
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(TargetIntersection {
                    index,
                    id: target.id(),
                    distance,
                    point: origin + dir * distance,
                });
            }
        }
        best
    }

    /// Nearer of the exact ray hit and the padded-sphere hit.
    pub fn intersect(
        &self,
        targets: &[Box<dyn AttackTarget>],
        origin: Vec3,
        direction: Vec3,
        far: f32,
        hit_radius: f32,
    ) -> Option<TargetIntersection> {
        self.intersect_filtered(targets, origin, direction, far, hit_radius, &|_| true)
    }

    pub fn intersect_filtered(
        &self,
        targets: &[Box<dyn AttackTarget>],
        origin: Vec3,
        direction: Vec3,
        far: f32,
        hit_radius: f32,
        accept: &dyn Fn(TargetId) -> bool,
    ) -> Option<TargetIntersection> {
        let by_ray = self.intersect_by_ray_filtered(targets, origin, direction, far, accept);
        let by_radius =
            self.intersect_by_radius_filtered(targets, origin, direction, far, hit_radius, accept);
        match (by_ray, by_radius) {
            (Some(a), Some(b)) => Some(if a.distance <= b.distance { a } else { b }),
            (a, b) => a.or(b),
        }
    }

    /// Forward melee sweep; returns the number of targets damaged.
    pub fn perform_melee_attack(
        &self,
        targets: &mut [Box<dyn AttackTarget>],
        attack: &MeleeAttack,
        commands: &mut CombatCommands,
    ) -> usize {
        let Some(damage) = rounded_damage(attack.damage) else {
            return 0;
        };
        let Some(dir) = normalize_direction(attack.direction) else {
            return 0;
        };
        if !(attack.max_distance > 0.0) || attack.max_hits == 0 || !attack.origin.is_finite() {
            return 0;
        }
        let hit_radius = if attack.hit_radius.is_finite() {
            attack.hit_radius.max(0.0)
        } else {
            0.0
        };

        let mut candidates = Vec::new();
        for (index, target) in targets.iter().enumerate() {
            if !target.is_active() || attack.exclude.contains(&target.id()) {
                continue;
            }
            if attack.attacker == Some(target.id()) {
                continue;
            }
            let volume = target.volume();
            if !volume.is_finite() {
                continue;
            }
            let (center, radius) = volume.bounding_sphere();
            let (along, perp) = geometry::project_onto_ray(attack.origin, dir, center);
            if along < 0.0 || along > attack.max_distance {
                continue;
            }
            if perp > radius + hit_radius {
                continue;
            }
            candidates.push(Candidate {
                index,
                distance: along,
                point: attack.origin + dir * along,
            });
        }

        self.deliver(
            targets,
            candidates,
            attack.max_hits,
            commands,
            |_| {
                (
                    damage,
                    HitTemplate {
                        attacker: attack.attacker,
                        kind: HitKind::Melee,
                        direction: dir,
                        projectile: None,
                    },
                )
            },
        )
    }

    /// Stationary sphere-overlap strike; returns the number of targets damaged.
    pub fn perform_melee_contact_attack(
        &self,
        targets: &mut [Box<dyn AttackTarget>],
        attack: &ContactAttack,
        commands: &mut CombatCommands,
    ) -> usize {
        let Some(damage) = rounded_damage(attack.damage) else {
            return 0;
        };
        if !(attack.radius > 0.0) || attack.max_hits == 0 || !attack.center.is_finite() {
            return 0;
        }
        let facing = normalize_direction(attack.direction).unwrap_or(Vec3::ZERO);

        let mut candidates = Vec::new();
        for (index, target) in targets.iter().enumerate() {
            if !target.is_active() || attack.attacker == Some(target.id()) {
                continue;
            }
            let volume = target.volume();
            if !volume.is_finite() {
                continue;
            }
            let (center, radius) = volume.bounding_sphere();
            let distance = center.distance(attack.center);
            if distance > radius + attack.radius {
                continue;
            }
            candidates.push(Candidate {
                index,
                distance,
                point: center,
            });
        }

        self.deliver(targets, candidates, attack.max_hits, commands, |candidate| {
            let direction = normalize_direction(candidate.point - attack.center).unwrap_or(facing);
            (
                damage,
                HitTemplate {
                    attacker: attack.attacker,
                    kind: HitKind::MeleeContact,
                    direction,
                    projectile: None,
                },
            )
        })
    }

    /// Splash damage with linear falloff; returns the number of targets damaged.
    pub fn apply_explosion_damage(
        &self,
        targets: &mut [Box<dyn AttackTarget>],
        center: Vec3,
        explosion: &ExplosionParams,
        attacker: Option<TargetId>,
        exclude_target: Option<TargetId>,
        commands: &mut CombatCommands,
    ) -> usize {
        self.apply_explosion_damage_from(
            targets,
            center,
            explosion,
            attacker,
            exclude_target,
            None,
            commands,
        )
    }

    pub(crate) fn apply_explosion_damage_from(
        &self,
        targets: &mut [Box<dyn AttackTarget>],
        center: Vec3,
        explosion: &ExplosionParams,
        attacker: Option<TargetId>,
        exclude_target: Option<TargetId>,
        projectile: Option<ProjectileId>,
        commands: &mut CombatCommands,
    ) -> usize {
        if !explosion.is_effective() || !center.is_finite() {
            return 0;
        }

        // Snapshot first, deliver after: every qualifying target takes
        // exactly one splash hit regardless of what callbacks queue.
        let mut pending: Vec<(usize, f32, Vec3)> = Vec::new();
        for (index, target) in targets.iter().enumerate() {
            if !target.is_active() || exclude_target == Some(target.id()) {
                continue;
            }
            let volume = target.volume();
            if !volume.is_finite() {
                continue;
            }
            let target_center = volume.center();
            let distance = target_center.distance(center);
            if let Some(damage) = explosion_falloff(distance, explosion) {
                pending.push((index, damage, target_center));
            }
        }

        let mut hits = 0;
        for (index, damage, target_center) in pending {
            let Some(target) = targets.get_mut(index) else {
                continue;
            };
            let hit = AttackHit {
                target: target.id(),
                attacker,
                kind: HitKind::Explosion,
                damage,
                point: target_center,
                direction: normalize_direction(target_center - center).unwrap_or(Vec3::ZERO),
                projectile,
            };
            target.on_hit(&hit, commands);
            hits += 1;
        }

        if hits > 0 {
            crate::logger::log(&format!(
                "💥 Explosion at {:?} (r={:.2}) hit {} target(s)",
                center, explosion.radius, hits
            ));
        }
        hits
    }

    fn deliver(
        &self,
        targets: &mut [Box<dyn AttackTarget>],
        mut candidates: Vec<Candidate>,
        max_hits: usize,
        commands: &mut CombatCommands,
        build: impl Fn(&Candidate) -> (f32, HitTemplate),
    ) -> usize {
        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        candidates.truncate(max_hits);

        let mut hits = 0;
        for candidate in &candidates {
            let Some(target) = targets.get_mut(candidate.index) else {
                continue;
            };
            let (damage, template) = build(candidate);
            let hit = AttackHit {
                target: target.id(),
                attacker: template.attacker,
                kind: template.kind,
                damage,
                point: candidate.point,
                direction: template.direction,
                projectile: template.projectile,
            };
            target.on_hit(&hit, commands);
            hits += 1;
        }
        hits
    }
}

struct HitTemplate {
    attacker: Option<TargetId>,
    kind: HitKind,
    direction: Vec3,
    projectile: Option<ProjectileId>,
}
