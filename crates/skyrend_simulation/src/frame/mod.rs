//! FrameUpdater: per-tick orchestration of one playable character.
//!
//! Fixed order each tick:
//! 1. movement (status × runtime speed multiplier)
//! 2. projectiles (+ block hits routed to the owner's runtime, resource grants)
//! 3. status dot through `before_damage`, health mirror, regen, cooldown prune
//! 4. world callback
//! 5. UI snapshot, emitted only when its content hash changed

pub mod plugin;

#[cfg(test)]
mod frame_tests;

use std::sync::Arc;

use bevy::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::character::{CharacterRegistry, CharacterRuntime, DamageKind};
use crate::combat::{AttackTarget, CombatCommands, ResourceGrant, TargetId};
use crate::components::{HealthPool, ResourcePool};
use crate::config::CombatConfig;
use crate::logger;
use crate::projectile::{BlockHit, Blocker, ProjectileSystem, ProjectileTickReport, ProjectileTypeRegistry};
use crate::skill::{Aim, SkillInvocation, SkillState, SkillUseOutcome};
use crate::stats::{CharacterDecl, StatsState};
use crate::status::{StatusApplyOutcome, StatusEffectState, StatusRequest};

pub use plugin::{
    advance_combat_frame, CombatFrame, CombatPlugin, CombatScene, ProjectileRemovedEvent, SkillUsed,
    UiSnapshotChanged, UseSkillRequest,
};

const MOVING_EPSILON: f32 = 1e-6;

/// Player input for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Desired direction; length is clamped to 1
    pub move_intent: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillCooldownView {
    pub key: String,
    pub remaining: f32,
    pub duration: f32,
}

/// HUD state: cooldowns per skill key + mana / energy.
///
/// Values are quantized (0.1) before hashing so sub-frame drift does not
/// re-emit an identical-looking snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiSnapshot {
    pub skills: Vec<SkillCooldownView>,
    pub mana: ResourcePool,
    pub energy: ResourcePool,
    pub hash: [u8; 32],
}

#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub velocity: Vec3,
    pub move_multiplier: f32,
    pub projectiles: ProjectileTickReport,
    /// Raw dot damage accrued this tick (before `before_damage`)
    pub dot_damage: f32,
    /// Health actually removed from the pool
    pub health_lost: f32,
    /// Present only when the snapshot changed
    pub ui: Option<UiSnapshot>,
}

/// Result of `use_skill`: the gate decision plus everything its follow-up
/// commands did.
#[derive(Debug, Clone)]
pub struct SkillCast {
    pub outcome: SkillUseOutcome,
    pub report: ProjectileTickReport,
}

/// Borrowed world state for one tick.
pub struct CombatView<'a> {
    pub targets: &'a mut [Box<dyn AttackTarget>],
    pub blockers: &'a [Blocker],
    /// Player's health pool (owned by the world)
    pub health: &'a mut dyn HealthPool,
}

pub trait CombatWorld {
    fn view(&mut self) -> CombatView<'_>;

    /// Called after status/regen, before the UI snapshot.
    fn after_frame(&mut self, _now: f64, _output: &FrameOutput) {}
}

pub struct FrameUpdater {
    config: CombatConfig,
    player: TargetId,
    character_id: String,
    projectiles: ProjectileSystem,
    stats: StatsState,
    skills: SkillState,
    status: StatusEffectState,
    runtime: Box<dyn CharacterRuntime>,
    /// Fractional dot damage not yet applied to the integer health pool
    dot_carry: f32,
    last_ui_hash: Option<[u8; 32]>,
}

impl FrameUpdater {
    pub fn new(
        config: &CombatConfig,
        types: Arc<ProjectileTypeRegistry>,
        decl: &CharacterDecl,
        runtime: Box<dyn CharacterRuntime>,
        player: TargetId,
    ) -> Self {
        Self {
            config: config.clone(),
            player,
            character_id: decl.id.clone(),
            projectiles: ProjectileSystem::new(config, types),
            stats: StatsState::new(decl),
            skills: SkillState::new(&decl.skills),
            status: StatusEffectState::new(),
            runtime,
            dot_carry: 0.0,
            last_ui_hash: None,
        }
    }

    /// Build for a registered character. `None` when `character_id` is unknown.
    pub fn for_character(
        config: &CombatConfig,
        types: Arc<ProjectileTypeRegistry>,
        characters: &CharacterRegistry,
        character_id: &str,
        player: TargetId,
    ) -> Option<Self> {
        let decl = characters.get(character_id)?;
        let runtime = characters.instantiate(character_id)?;
        Some(Self::new(config, types, decl, runtime, player))
    }

    /// Swap the active character; current pool values are kept (clamped).
    pub fn set_character(&mut self, decl: &CharacterDecl, runtime: Box<dyn CharacterRuntime>) {
        logger::log_info(&format!("🔄 Character {} → {}", self.character_id, decl.id));
        self.character_id = decl.id.clone();
        self.stats.apply_character(decl);
        self.stats.reset_cooldowns();
        self.skills = SkillState::new(&decl.skills);
        self.status.clear();
        self.runtime = runtime;
        self.last_ui_hash = None;
    }

    pub fn player(&self) -> TargetId {
        self.player
    }

    pub fn character_id(&self) -> &str {
        &self.character_id
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn projectiles(&self) -> &ProjectileSystem {
        &self.projectiles
    }

    pub fn projectiles_mut(&mut self) -> &mut ProjectileSystem {
        &mut self.projectiles
    }

    pub fn stats(&self) -> &StatsState {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut StatsState {
        &mut self.stats
    }

    pub fn skills(&self) -> &SkillState {
        &self.skills
    }

    pub fn status(&self) -> &StatusEffectState {
        &self.status
    }

    pub fn runtime(&self) -> &dyn CharacterRuntime {
        self.runtime.as_ref()
    }

    pub fn set_infinite_resources(&mut self, enabled: bool) {
        self.stats.set_infinite(enabled);
    }

    /// Status on the player, through the runtime's immunity and modifier.
    pub fn apply_status(&mut self, now: f64, request: StatusRequest) -> StatusApplyOutcome {
        self.status.apply(now, request, self.runtime.as_mut())
    }

    /// Direct damage to the player through `before_damage`; returns health lost.
    pub fn apply_damage(&mut self, amount: f32, kind: DamageKind, health: &mut dyn HealthPool) -> f32 {
        if !(amount > 0.0) || !amount.is_finite() {
            return 0.0;
        }
        let adjusted = self.runtime.before_damage(amount, kind);
        let lost = health.take_damage(sanitize(adjusted));
        self.stats.sync_health(&*health);
        lost
    }

    /// Status slow/root × runtime multiplier.
    pub fn movement_multiplier(&self, now: f64) -> f32 {
        let runtime = sanitize(self.runtime.movement_speed_multiplier(now));
        self.status.movement_speed_multiplier(now) * runtime
    }

    pub fn update(
        &mut self,
        now: f64,
        delta: f32,
        input: &FrameInput,
        world: &mut dyn CombatWorld,
    ) -> FrameOutput {
        let mut output = FrameOutput::default();
        if !now.is_finite() || !(delta >= 0.0) || !delta.is_finite() {
            return output;
        }

        output.move_multiplier = self.movement_multiplier(now);
        output.velocity = clamp_intent(input.move_intent) * self.config.base_move_speed * output.move_multiplier;
        let moving = output.velocity.length_squared() > MOVING_EPSILON;

        {
            let view = world.view();

            let player = self.player;
            let runtime = &mut self.runtime;
            let report = self.projectiles.update(
                now,
                delta,
                view.targets,
                view.blockers,
                &mut |hit: &BlockHit, commands: &mut CombatCommands| {
                    route_block_hit(player, runtime.as_mut(), hit, commands)
                },
            );
            self.apply_grants(&report.grants);
            output.projectiles = report;

            output.dot_damage = self.status.update(now, delta);
            output.health_lost = self.deal_dot(output.dot_damage, view.health);
            self.stats.sync_health(&*view.health);
            self.stats.regen(delta, moving);
            self.stats.prune_cooldowns(now);
        }

        world.after_frame(now, &output);

        let snapshot = self.ui_snapshot(now);
        if self.last_ui_hash != Some(snapshot.hash) {
            self.last_ui_hash = Some(snapshot.hash);
            output.ui = Some(snapshot);
        }
        output
    }

    /// Run a skill now; projectiles it fires start moving on the next update.
    pub fn use_skill(&mut self, key: &str, now: f64, aim: Aim, world: &mut dyn CombatWorld) -> SkillCast {
        let view = world.view();
        let mut commands = CombatCommands::new();
        let outcome = {
            let mut invocation = SkillInvocation {
                caster: self.player,
                aim,
                targets: &mut *view.targets,
                projectiles: &mut self.projectiles,
                commands: &mut commands,
            };
            self.skills
                .try_use_skill(key, now, &mut self.stats, self.runtime.as_mut(), &mut invocation)
        };
        let report = self.projectiles.execute(&mut commands, view.targets);
        self.apply_grants(&report.grants);
        SkillCast { outcome, report }
    }

    /// Current HUD state (always built; `update` decides whether to emit).
    pub fn ui_snapshot(&self, now: f64) -> UiSnapshot {
        let runtime = self.runtime.as_ref();
        let skills: Vec<SkillCooldownView> = self
            .skills
            .iter()
            .map(|skill| SkillCooldownView {
                key: skill.key.clone(),
                remaining: quantize(self.stats.cooldown_remaining(&skill.key, now, runtime)),
                duration: quantize(self.stats.cooldown_duration(&skill.key, runtime)),
            })
            .collect();
        let mana = quantize_pool(self.stats.mana());
        let energy = quantize_pool(self.stats.energy());
        let hash = content_hash(&skills, &mana, &energy);
        UiSnapshot {
            skills,
            mana,
            energy,
            hash,
        }
    }

    fn apply_grants(&mut self, grants: &[ResourceGrant]) {
        for grant in grants.iter().filter(|g| g.owner == Some(self.player)) {
            self.stats.apply(grant.kind, grant.amount);
        }
    }

    fn deal_dot(&mut self, raw: f32, health: &mut dyn HealthPool) -> f32 {
        if !(raw > 0.0) || !raw.is_finite() {
            return 0.0;
        }
        self.dot_carry += sanitize(self.runtime.before_damage(raw, DamageKind::Dot));
        let whole = self.dot_carry.floor();
        if whole < 1.0 {
            return 0.0;
        }
        self.dot_carry -= whole;
        health.take_damage(whole)
    }
}

/// Blockers owned by the player ask its runtime; a blocker never stops its
/// owner's own projectiles; any other blocker consumes.
fn route_block_hit(
    player: TargetId,
    runtime: &mut dyn CharacterRuntime,
    hit: &BlockHit,
    commands: &mut CombatCommands,
) -> bool {
    if hit.projectile_owner.is_some() && hit.projectile_owner == hit.blocker_owner {
        return false;
    }
    if hit.blocker_owner == Some(player) {
        return runtime.handle_projectile_block_hit(hit, commands);
    }
    true
}

fn clamp_intent(intent: Vec3) -> Vec3 {
    if !intent.is_finite() {
        return Vec3::ZERO;
    }
    intent.clamp_length_max(1.0)
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn quantize(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

fn quantize_pool(pool: &ResourcePool) -> ResourcePool {
    ResourcePool {
        current: quantize(pool.current),
        max: quantize(pool.max),
    }
}

fn content_hash(skills: &[SkillCooldownView], mana: &ResourcePool, energy: &ResourcePool) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for skill in skills {
        hasher.update(skill.key.as_bytes());
        hasher.update([0u8]);
        hasher.update(skill.remaining.to_le_bytes());
        hasher.update(skill.duration.to_le_bytes());
    }
    for pool in [mana, energy] {
        hasher.update(pool.current.to_le_bytes());
        hasher.update(pool.max.to_le_bytes());
    }
    hasher.finalize().into()
}
