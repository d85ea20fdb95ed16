//! ProjectileSystem: pooled projectiles (motion, collision, lifecycle).
//!
//! # Tick order (per live projectile, newest first)
//! 1. Forces: per-instance `ForceHook`, default = gravity × type scale
//! 2. Sweep old → new position against attack targets, world colliders and
//!    blockers, nearest first (target wins ties with an obstacle)
//! 3. Expiry: max lifetime or downward crossing of the ground plane
//! 4. Removal (at most one cause) → pending action, bookkeeping release,
//!    `on_remove` exactly once
//!
//! After the sweep the deferred `CombatCommands` queue is drained (spawns,
//! chained explosions, forced removals, resource grants), bounded by
//! `CombatConfig::max_command_chain`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::record::{
    FireArgs, ForceContext, HitGroupId, PendingAction, Projectile, ProjectileId, RemovalCause,
    RemovedProjectile,
};
use super::types::{HitResponse, ProjectileHitContext, ProjectileSpawnInfo, ProjectileTypeRegistry};
use super::world::{BlockHit, Blocker, WorldCollider};
use crate::combat::{
    normalize_direction, rounded_damage, AttackHit, AttackTarget, AttackTargetResolver, CombatCommand,
    CombatCommands, ExplosionParams, HitKind, ResourceGrant, TargetId, TargetIntersection,
};
use crate::config::CombatConfig;
use crate::logger;
use crate::stats::ResourceKind;

/// Float slack on `age >= max_life` (accumulated `delta` rounding)
const LIFETIME_EPSILON: f32 = 1e-4;

const MIN_SWEEP_LENGTH: f32 = 1e-6;

#[derive(Debug, Default)]
struct HitGroup {
    /// Live projectiles in the group
    members: usize,
    /// Targets already damaged by any member
    hit: HashSet<TargetId>,
}

/// Direct projectile hit delivered this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileHitRecord {
    pub projectile: ProjectileId,
    pub target: TargetId,
    pub damage: f32,
    pub point: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionRecord {
    /// None for explosions queued through `CombatCommands`
    pub projectile: Option<ProjectileId>,
    pub center: Vec3,
    pub radius: f32,
    pub hits: usize,
}

/// Everything that happened during one `update` (or `remove` / `clear`).
#[derive(Debug, Clone, Default)]
pub struct ProjectileTickReport {
    /// Projectiles spawned by drained `Fire` commands
    pub spawned: Vec<ProjectileId>,
    pub hits: Vec<ProjectileHitRecord>,
    pub explosions: Vec<ExplosionRecord>,
    pub removed: Vec<RemovedProjectile>,
    pub grants: Vec<ResourceGrant>,
    /// Commands dropped by the chain limit (or discarded by `clear`)
    pub dropped_commands: usize,
}

impl ProjectileTickReport {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty()
            && self.hits.is_empty()
            && self.explosions.is_empty()
            && self.removed.is_empty()
            && self.grants.is_empty()
            && self.dropped_commands == 0
    }

    pub fn merge(&mut self, other: ProjectileTickReport) {
        self.spawned.extend(other.spawned);
        self.hits.extend(other.hits);
        self.explosions.extend(other.explosions);
        self.removed.extend(other.removed);
        self.grants.extend(other.grants);
        self.dropped_commands += other.dropped_commands;
    }

    pub fn removal_cause(&self, id: ProjectileId) -> Option<RemovalCause> {
        self.removed.iter().find(|r| r.id == id).map(|r| r.cause)
    }
}

/// Once-guards for one projectile's resolution within a tick.
#[derive(Default)]
struct Resolution {
    removal: Option<RemovalCause>,
    /// Targets already hit this tick (piercing projectiles)
    hit_this_tick: Vec<TargetId>,
}

impl Resolution {
    /// First removal request wins; later ones are ignored.
    fn remove(&mut self, cause: RemovalCause) -> bool {
        if self.removal.is_some() {
            return false;
        }
        self.removal = Some(cause);
        true
    }
}

enum Obstacle {
    World,
    Blocker(Blocker),
}

/// Pool of live projectiles and their shared bookkeeping.
pub struct ProjectileSystem {
    config: CombatConfig,
    registry: Arc<ProjectileTypeRegistry>,
    resolver: AttackTargetResolver,
    live: Vec<Projectile>,
    world: Vec<WorldCollider>,
    hit_groups: HashMap<HitGroupId, HitGroup>,
    next_id: u64,
    next_group: u64,
    rng: ChaCha8Rng,
}

impl ProjectileSystem {
    pub fn new(config: &CombatConfig, mut registry: Arc<ProjectileTypeRegistry>) -> Self {
        if registry.fallback_id() != config.fallback_projectile_type {
            Arc::make_mut(&mut registry).set_fallback(config.fallback_projectile_type.clone());
        }
        Self {
            config: config.clone(),
            registry,
            resolver: AttackTargetResolver::new(),
            live: Vec::new(),
            world: Vec::new(),
            hit_groups: HashMap::new(),
            next_id: 1,
            next_group: 1,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProjectileTypeRegistry {
        &self.registry
    }

    pub fn add_world_collider(&mut self, collider: WorldCollider) {
        self.world.push(collider);
    }

    pub fn world_colliders(&self) -> &[WorldCollider] {
        &self.world
    }

    pub fn clear_world(&mut self) {
        self.world.clear();
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.live.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.live.iter()
    }

    /// Hit groups that still have live members
    pub fn hit_group_count(&self) -> usize {
        self.hit_groups.len()
    }

    /// Allocate a fresh shared hit group id.
    pub fn new_hit_group(&mut self) -> HitGroupId {
        let id = HitGroupId(self.next_group);
        self.next_group += 1;
        id
    }

    /// Spawn one projectile. `None` for a degenerate direction or origin.
    pub fn fire(&mut self, origin: Vec3, direction: Vec3, args: FireArgs) -> Option<ProjectileId> {
        let Some(dir) = normalize_direction(direction) else {
            logger::log_warning(&format!(
                "⚠️ fire('{}'): degenerate direction {:?}, ignored",
                args.type_id, direction
            ));
            return None;
        };
        if !origin.is_finite() {
            logger::log_warning(&format!(
                "⚠️ fire('{}'): non-finite origin {:?}, ignored",
                args.type_id, origin
            ));
            return None;
        }

        let FireArgs {
            type_id,
            owner,
            speed,
            lifetime,
            radius,
            target_hit_radius,
            damage,
            gravity_scale,
            explosion,
            rules,
            energy_on_hit,
            mana_on_hit,
            shared_hit_group,
            single_hit_per_target,
            force_hook,
            on_remove,
            pending,
        } = args;

        let resolved = self.registry.resolve(&type_id);
        let def = resolved.def;

        let id = ProjectileId(self.next_id);
        self.next_id += 1;

        let speed = non_negative(speed.unwrap_or(def.speed));
        let radius = non_negative(radius.unwrap_or(def.radius));
        let visual = resolved.hooks.as_ref().and_then(|hooks| {
            hooks.create_mesh(&ProjectileSpawnInfo {
                projectile: id,
                type_id: &def.id,
                origin,
                direction: dir,
                radius,
            })
        });

        if let Some(group) = shared_hit_group {
            self.hit_groups.entry(group).or_default().members += 1;
        }

        logger::log(&format!(
            "🚀 Projectile {:?} '{}' fired from {:?} dir {:?} (owner {:?})",
            id, def.id, origin, dir, owner
        ));

        self.live.push(Projectile {
            id,
            type_id: def.id,
            owner,
            position: origin,
            velocity: dir * speed,
            radius,
            target_hit_radius: non_negative(target_hit_radius.unwrap_or(def.target_hit_radius)),
            age: 0.0,
            max_life: non_negative(lifetime.unwrap_or(def.lifetime)),
            damage: damage.unwrap_or(def.damage),
            energy_on_hit: non_negative(energy_on_hit.unwrap_or(def.energy_on_hit)),
            mana_on_hit: non_negative(mana_on_hit.unwrap_or(def.mana_on_hit)),
            gravity_scale: finite_or_zero(gravity_scale.unwrap_or(def.gravity_scale)),
            explosion: explosion.or(def.explosion),
            rules: rules.unwrap_or(def.rules),
            shared_hit_group,
            single_hit_per_target,
            pending,
            visual,
            stuck: false,
            exploded: false,
            hit_targets: HashSet::new(),
            passed_blockers: HashSet::new(),
            force_hook,
            on_remove,
            hooks: resolved.hooks,
        });
        Some(id)
    }

    /// Fan `count` projectiles across `spread_deg` (yaw around the aim), all
    /// in one fresh shared hit group. `args_for(i)` builds each member's args.
    pub fn fire_volley(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        count: usize,
        spread_deg: f32,
        mut args_for: impl FnMut(usize) -> FireArgs,
    ) -> Vec<ProjectileId> {
        let Some(dir) = normalize_direction(direction) else {
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }

        let group = self.new_hit_group();
        let axis = volley_axis(dir);
        let spread = if spread_deg.is_finite() { spread_deg.max(0.0) } else { 0.0 };
        let jitter = self.config.volley_jitter_deg;

        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let mut angle = if count == 1 {
                0.0
            } else {
                -spread * 0.5 + spread * i as f32 / (count - 1) as f32
            };
            if jitter.is_finite() && jitter > 0.0 {
                angle += self.rng.gen_range(-jitter..=jitter);
            }
            let member_dir = Quat::from_axis_angle(axis, angle.to_radians()) * dir;
            let mut args = args_for(i);
            args.shared_hit_group = Some(group);
            if let Some(id) = self.fire(origin, member_dir, args) {
                ids.push(id);
            }
        }
        ids
    }

    /// `update` without dynamic blockers.
    pub fn tick(
        &mut self,
        now: f64,
        delta: f32,
        targets: &mut [Box<dyn AttackTarget>],
    ) -> ProjectileTickReport {
        self.update(now, delta, targets, &[], &mut |_, _| true)
    }

    /// Advance every live projectile by `delta` seconds.
    ///
    /// `on_block` is asked for each blocker a projectile reaches before any
    /// target: `true` consumes the projectile, `false` lets it pass through
    /// (that blocker is not consulted again for this projectile).
    pub fn update(
        &mut self,
        now: f64,
        delta: f32,
        targets: &mut [Box<dyn AttackTarget>],
        blockers: &[Blocker],
        on_block: &mut dyn FnMut(&BlockHit, &mut CombatCommands) -> bool,
    ) -> ProjectileTickReport {
        let mut report = ProjectileTickReport::default();
        if !(delta >= 0.0) || !delta.is_finite() {
            return report;
        }
        let mut commands = CombatCommands::new();

        // Hooks only reach the pool through `commands`, so nothing is
        // spawned into `self.live` while it is taken out.
        let mut live = std::mem::take(&mut self.live);
        let mut index = live.len();
        while index > 0 {
            index -= 1;
            let removal = self.step(
                now,
                delta,
                &mut live[index],
                targets,
                blockers,
                on_block,
                &mut commands,
                &mut report,
            );
            if let Some(cause) = removal {
                let projectile = live.remove(index);
                self.finish_removal(projectile, cause, targets, &mut commands, &mut report);
            }
        }
        self.live = live;

        self.drain_commands(targets, &mut commands, &mut report);
        report
    }

    /// Forced removal. `None` when `id` is not live (already removed).
    pub fn remove(
        &mut self,
        id: ProjectileId,
        targets: &mut [Box<dyn AttackTarget>],
    ) -> Option<ProjectileTickReport> {
        let index = self.live.iter().position(|p| p.id == id)?;
        let mut report = ProjectileTickReport::default();
        let mut commands = CombatCommands::new();
        let projectile = self.live.remove(index);
        self.finish_removal(projectile, RemovalCause::Forced, targets, &mut commands, &mut report);
        self.drain_commands(targets, &mut commands, &mut report);
        Some(report)
    }

    /// Run commands queued outside a tick (skill handlers, world scripts)
    /// under the same chain limit as hook follow-ups.
    pub fn execute(
        &mut self,
        commands: &mut CombatCommands,
        targets: &mut [Box<dyn AttackTarget>],
    ) -> ProjectileTickReport {
        let mut report = ProjectileTickReport::default();
        self.drain_commands(targets, commands, &mut report);
        report
    }

    /// Remove everything (scene teardown). Pending actions are dropped and
    /// follow-ups queued by removal hooks are discarded, except grants.
    pub fn clear(&mut self) -> ProjectileTickReport {
        let mut report = ProjectileTickReport::default();
        let mut commands = CombatCommands::new();
        let live = std::mem::take(&mut self.live);
        for projectile in live.into_iter().rev() {
            self.finish_removal(projectile, RemovalCause::Cleared, &mut [], &mut commands, &mut report);
        }
        for command in commands.take() {
            match command {
                CombatCommand::GrantResource(grant) => report.grants.push(grant),
                _ => report.dropped_commands += 1,
            }
        }
        self.hit_groups.clear();
        if !report.removed.is_empty() {
            logger::log(&format!("🧹 Cleared {} projectile(s)", report.removed.len()));
        }
        report
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        now: f64,
        delta: f32,
        p: &mut Projectile,
        targets: &mut [Box<dyn AttackTarget>],
        blockers: &[Blocker],
        on_block: &mut dyn FnMut(&BlockHit, &mut CombatCommands) -> bool,
        commands: &mut CombatCommands,
        report: &mut ProjectileTickReport,
    ) -> Option<RemovalCause> {
        let mut resolution = Resolution::default();
        let start = p.position;

        if !p.stuck {
            let gravity = self.config.gravity * p.gravity_scale;
            match p.force_hook.as_mut() {
                Some(hook) => {
                    let ctx = ForceContext {
                        projectile: p.id,
                        position: start,
                        age: p.age,
                        gravity,
                    };
                    hook.apply_forces(&ctx, &mut p.velocity, delta);
                }
                None => p.velocity.y -= gravity * delta,
            }
            if !p.velocity.is_finite() {
                p.velocity = Vec3::ZERO;
            }

            let end = start + p.velocity * delta;
            self.sweep(
                now,
                p,
                start,
                end,
                targets,
                blockers,
                on_block,
                commands,
                report,
                &mut resolution,
            );
            if resolution.removal.is_none() && !p.stuck {
                p.position = end;
            }
        }
        p.age += delta;

        if let Some(cause) = resolution.removal {
            return Some(cause);
        }

        if let Some(ground) = self.config.ground_height {
            if !p.stuck && start.y >= ground && p.position.y < ground {
                let t = (start.y - ground) / (start.y - p.position.y);
                p.position = start.lerp(p.position, t);
                self.expire(now, p, targets, commands, report);
                return Some(RemovalCause::GroundHit);
            }
        }

        if p.age + LIFETIME_EPSILON >= p.max_life {
            self.expire(now, p, targets, commands, report);
            return Some(RemovalCause::Expired);
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn sweep(
        &mut self,
        now: f64,
        p: &mut Projectile,
        start: Vec3,
        end: Vec3,
        targets: &mut [Box<dyn AttackTarget>],
        blockers: &[Blocker],
        on_block: &mut dyn FnMut(&BlockHit, &mut CombatCommands) -> bool,
        commands: &mut CombatCommands,
        report: &mut ProjectileTickReport,
        resolution: &mut Resolution,
    ) {
        let segment = end - start;
        let length = segment.length();
        if !(length > MIN_SWEEP_LENGTH) {
            return;
        }
        let dir = segment / length;

        let mut obstacles: Vec<(f32, Obstacle)> = Vec::new();
        for collider in &self.world {
            if let Some(distance) = collider.cast_ball(start, dir, length, p.radius) {
                obstacles.push((distance, Obstacle::World));
            }
        }
        for blocker in blockers {
            if p.passed_blockers.contains(&blocker.id) {
                continue;
            }
            if let Some(distance) = blocker.volume.swept_enter(start, dir, p.radius) {
                if distance <= length {
                    obstacles.push((distance, Obstacle::Blocker(*blocker)));
                }
            }
        }
        obstacles.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Each pass consumes one target or one obstacle
        let budget = targets.len() + obstacles.len() + 1;
        let mut obstacles = obstacles.into_iter().peekable();
        for _ in 0..budget {
            let target = self.nearest_target(p, start, dir, length, targets, &resolution.hit_this_tick);
            let target_first = match (&target, obstacles.peek()) {
                (Some(hit), Some((distance, _))) => hit.distance <= *distance,
                (Some(_), None) => true,
                (None, _) => false,
            };

            if target_first {
                if let Some(hit) = target {
                    self.resolve_target_hit(now, p, dir, hit, targets, commands, report, resolution);
                    if resolution.removal.is_some() {
                        return;
                    }
                }
                continue;
            }

            let Some((distance, obstacle)) = obstacles.next() else {
                return;
            };
            let point = start + dir * distance;
            match obstacle {
                Obstacle::World => {
                    self.resolve_world_hit(now, p, point, targets, commands, report, resolution);
                    return;
                }
                Obstacle::Blocker(blocker) => {
                    let block = BlockHit {
                        blocker: blocker.id,
                        blocker_owner: blocker.owner,
                        projectile: p.id,
                        projectile_owner: p.owner,
                        point,
                        velocity: p.velocity,
                        damage: p.damage,
                    };
                    if on_block(&block, commands) && resolution.remove(RemovalCause::BlockerHit) {
                        p.position = point;
                        logger::log(&format!(
                            "🛡️ Projectile {:?} blocked by {:?} at {:?}",
                            p.id, blocker.id, point
                        ));
                        return;
                    }
                    p.passed_blockers.insert(blocker.id);
                }
            }
        }
    }

    fn nearest_target(
        &self,
        p: &Projectile,
        start: Vec3,
        dir: Vec3,
        length: f32,
        targets: &[Box<dyn AttackTarget>],
        skip: &[TargetId],
    ) -> Option<TargetIntersection> {
        let group_hits = p
            .shared_hit_group
            .and_then(|group| self.hit_groups.get(&group))
            .map(|group| &group.hit);
        let accept = |id: TargetId| {
            Some(id) != p.owner
                && !skip.contains(&id)
                && !(p.single_hit_per_target && p.hit_targets.contains(&id))
                && !group_hits.is_some_and(|hits| hits.contains(&id))
        };
        self.resolver
            .intersect_filtered(targets, start, dir, length, p.target_hit_radius, &accept)
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_target_hit(
        &mut self,
        now: f64,
        p: &mut Projectile,
        dir: Vec3,
        hit: TargetIntersection,
        targets: &mut [Box<dyn AttackTarget>],
        commands: &mut CombatCommands,
        report: &mut ProjectileTickReport,
        resolution: &mut Resolution,
    ) {
        resolution.hit_this_tick.push(hit.id);
        if p.single_hit_per_target {
            p.hit_targets.insert(hit.id);
        }
        if let Some(group) = p.shared_hit_group.and_then(|g| self.hit_groups.get_mut(&g)) {
            group.hit.insert(hit.id);
        }

        if let Some(damage) = rounded_damage(p.damage) {
            if let Some(target) = targets.get_mut(hit.index) {
                let attack = AttackHit {
                    target: hit.id,
                    attacker: p.owner,
                    kind: HitKind::Projectile,
                    damage,
                    point: hit.point,
                    direction: dir,
                    projectile: Some(p.id),
                };
                target.on_hit(&attack, commands);
                report.hits.push(ProjectileHitRecord {
                    projectile: p.id,
                    target: hit.id,
                    damage,
                    point: hit.point,
                });
            }
        }

        if p.rules.grant_resource_on_hit {
            commands.grant(p.owner, ResourceKind::Energy, p.energy_on_hit);
            commands.grant(p.owner, ResourceKind::Mana, p.mana_on_hit);
        }

        let response = match p.hooks.clone() {
            Some(hooks) => hooks.on_target_hit(&hit_context(now, p, Some(hit.id), hit.point), commands),
            None => HitResponse::keep_rules(),
        };
        if response.explode.unwrap_or(p.rules.explode_on_target_hit) {
            self.trigger_explosion(p, hit.point, Some(hit.id), None, targets, commands, report);
        }
        if response.remove.unwrap_or(p.rules.remove_on_target_hit)
            && resolution.remove(RemovalCause::TargetHit)
        {
            p.position = hit.point;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_world_hit(
        &mut self,
        now: f64,
        p: &mut Projectile,
        point: Vec3,
        targets: &mut [Box<dyn AttackTarget>],
        commands: &mut CombatCommands,
        report: &mut ProjectileTickReport,
        resolution: &mut Resolution,
    ) {
        let response = match p.hooks.clone() {
            Some(hooks) => hooks.on_world_hit(&hit_context(now, p, None, point), commands),
            None => HitResponse::keep_rules(),
        };
        if response.explode.unwrap_or(p.rules.explode_on_world_hit) {
            self.trigger_explosion(p, point, None, None, targets, commands, report);
        }
        p.position = point;
        if response.remove.unwrap_or(p.rules.remove_on_world_hit) {
            resolution.remove(RemovalCause::WorldHit);
        } else {
            // Sticks where it landed until it expires
            p.stuck = true;
            p.velocity = Vec3::ZERO;
        }
    }

    fn expire(
        &mut self,
        now: f64,
        p: &mut Projectile,
        targets: &mut [Box<dyn AttackTarget>],
        commands: &mut CombatCommands,
        report: &mut ProjectileTickReport,
    ) {
        let at = p.position;
        let response = match p.hooks.clone() {
            Some(hooks) => hooks.on_expire(&hit_context(now, p, None, at), commands),
            None => HitResponse::keep_rules(),
        };
        if response.explode.unwrap_or(p.rules.explode_on_expire) {
            self.trigger_explosion(p, at, None, None, targets, commands, report);
        }
    }

    /// Explode at most once per projectile. Returns whether it exploded now.
    #[allow(clippy::too_many_arguments)]
    fn trigger_explosion(
        &mut self,
        p: &mut Projectile,
        center: Vec3,
        primary: Option<TargetId>,
        params: Option<ExplosionParams>,
        targets: &mut [Box<dyn AttackTarget>],
        commands: &mut CombatCommands,
        report: &mut ProjectileTickReport,
    ) -> bool {
        if p.exploded {
            return false;
        }
        let Some(explosion) = params.or(p.explosion).filter(ExplosionParams::is_effective) else {
            return false;
        };
        p.exploded = true;

        if let Some(hooks) = p.hooks.as_ref() {
            hooks.spawn_explosion_fx(center, explosion.radius);
        }
        let exclude = if p.rules.split_on_impact { primary } else { None };
        let hits = self.resolver.apply_explosion_damage_from(
            targets,
            center,
            &explosion,
            p.owner,
            exclude,
            Some(p.id),
            commands,
        );
        report.explosions.push(ExplosionRecord {
            projectile: Some(p.id),
            center,
            radius: explosion.radius,
            hits,
        });
        true
    }

    /// Terminal transition. The record is already out of the pool, so this
    /// runs exactly once per projectile.
    fn finish_removal(
        &mut self,
        mut p: Projectile,
        cause: RemovalCause,
        targets: &mut [Box<dyn AttackTarget>],
        commands: &mut CombatCommands,
        report: &mut ProjectileTickReport,
    ) {
        let at = p.position;
        match p.pending.take() {
            Some(PendingAction::ExplodeOnRemove) if cause != RemovalCause::Cleared => {
                self.trigger_explosion(&mut p, at, None, None, targets, commands, report);
            }
            Some(PendingAction::ExplodeOnRemoveWith(params)) if cause != RemovalCause::Cleared => {
                self.trigger_explosion(&mut p, at, None, Some(params), targets, commands, report);
            }
            _ => {}
        }

        self.release_bookkeeping(&mut p);

        let removed = RemovedProjectile {
            id: p.id,
            type_id: std::mem::take(&mut p.type_id),
            owner: p.owner,
            position: at,
            cause,
            exploded: p.exploded,
        };
        if let Some(on_remove) = p.on_remove.take() {
            on_remove(&removed, commands);
        }
        logger::log(&format!(
            "🗑️ Projectile {:?} '{}' removed: {:?} at {:?}",
            removed.id, removed.type_id, cause, at
        ));
        report.removed.push(removed);
    }

    fn release_bookkeeping(&mut self, p: &mut Projectile) {
        if let Some(group) = p.shared_hit_group {
            if let Some(entry) = self.hit_groups.get_mut(&group) {
                entry.members = entry.members.saturating_sub(1);
                if entry.members == 0 {
                    self.hit_groups.remove(&group);
                }
            }
        }
        p.hit_targets.clear();
        p.passed_blockers.clear();
        p.force_hook = None;
        if let (Some(hooks), Some(visual)) = (p.hooks.as_ref(), p.visual.take()) {
            hooks.dispose_mesh(visual);
        }
    }

    fn drain_commands(
        &mut self,
        targets: &mut [Box<dyn AttackTarget>],
        commands: &mut CombatCommands,
        report: &mut ProjectileTickReport,
    ) {
        let limit = self.config.max_command_chain;
        let mut processed = 0usize;
        loop {
            let batch = commands.take();
            if batch.is_empty() {
                break;
            }
            for command in batch {
                // Гранты не порождают новых команд, в лимит не входят
                if let CombatCommand::GrantResource(grant) = command {
                    report.grants.push(grant);
                    continue;
                }
                if processed >= limit {
                    report.dropped_commands += 1;
                    continue;
                }
                processed += 1;
                match command {
                    CombatCommand::Fire {
                        origin,
                        direction,
                        args,
                    } => {
                        if let Some(id) = self.fire(origin, direction, args) {
                            report.spawned.push(id);
                        }
                    }
                    CombatCommand::Explode {
                        center,
                        explosion,
                        attacker,
                        exclude,
                    } => {
                        let hits = self.resolver.apply_explosion_damage(
                            targets, center, &explosion, attacker, exclude, commands,
                        );
                        report.explosions.push(ExplosionRecord {
                            projectile: None,
                            center,
                            radius: explosion.radius,
                            hits,
                        });
                    }
                    CombatCommand::RemoveProjectile(id) => {
                        if let Some(index) = self.live.iter().position(|p| p.id == id) {
                            let projectile = self.live.remove(index);
                            self.finish_removal(projectile, RemovalCause::Forced, targets, commands, report);
                        }
                    }
                    CombatCommand::GrantResource(grant) => report.grants.push(grant),
                }
            }
        }

        if report.dropped_commands > 0 {
            logger::log_warning(&format!(
                "⚠️ Command chain limit ({}) reached, dropped {} command(s)",
                limit, report.dropped_commands
            ));
        }
    }
}

fn hit_context<'a>(
    now: f64,
    p: &'a Projectile,
    target: Option<TargetId>,
    point: Vec3,
) -> ProjectileHitContext<'a> {
    ProjectileHitContext {
        now,
        projectile: p.id,
        type_id: &p.type_id,
        owner: p.owner,
        target,
        point,
        velocity: p.velocity,
    }
}

/// Yaw axis for a volley fan: world up made perpendicular to the aim.
fn volley_axis(dir: Vec3) -> Vec3 {
    let up = if dir.dot(Vec3::Y).abs() > 0.99 { Vec3::X } else { Vec3::Y };
    normalize_direction(up - dir * dir.dot(up)).unwrap_or(Vec3::Y)
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
