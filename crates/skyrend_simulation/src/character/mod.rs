//! Character runtime: per-character capability hooks.
//!
//! Each playable character is a `CharacterDecl` (data) plus a
//! `CharacterRuntime` (behaviour). Characters without bespoke logic get
//! `StandardRuntime`, which is driven by the declared traits only.

use std::collections::HashMap;

use crate::combat::{AttackTargetResolver, CombatCommands, ExplosionParams, MeleeAttack, normalize_direction};
use crate::error::{ConfigError, Result};
use crate::logger;
use crate::projectile::{BlockHit, FireArgs};
use crate::skill::{SkillAction, SkillDef, SkillInvocation, SkillUseModifier};
use crate::stats::{CharacterDecl, CharacterTraits};
use crate::status::{StatusApplyModifier, StatusEffectType, StatusRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageKind {
    Direct,
    /// Status damage-over-time slice
    Dot,
    Explosion,
}

/// Hooks a character may override. Every default is the "no opinion" answer.
pub trait CharacterRuntime: Send + Sync {
    fn character_id(&self) -> &str;

    fn before_skill_use(&mut self, _skill: &SkillDef, _now: f64) -> SkillUseModifier {
        SkillUseModifier::default()
    }

    /// Perform the skill; `false` means it did not fire (nothing is charged).
    fn handle_skill(&mut self, skill: &SkillDef, _now: f64, invocation: &mut SkillInvocation) -> bool {
        perform_skill_action(skill, invocation)
    }

    /// Adjust incoming damage; returns the amount to apply.
    fn before_damage(&mut self, amount: f32, _kind: DamageKind) -> f32 {
        amount
    }

    fn is_immune_to_status(&self, _kind: StatusEffectType) -> bool {
        false
    }

    fn before_status_apply(&mut self, _request: &StatusRequest) -> StatusApplyModifier {
        StatusApplyModifier::default()
    }

    fn movement_speed_multiplier(&self, _now: f64) -> f32 {
        1.0
    }

    /// `Some` overrides the timer-based remaining time.
    fn skill_cooldown_remaining(&self, _key: &str, _now: f64) -> Option<f32> {
        None
    }

    fn skill_cooldown_duration(&self, _key: &str) -> Option<f32> {
        None
    }

    /// `true` when the character tracks this skill's cooldown itself
    /// (charges, combo windows); the timer is then never started.
    fn manages_own_cooldown(&self, _key: &str) -> bool {
        false
    }

    /// A projectile reached one of this character's blockers.
    /// `true` consumes the projectile, `false` lets it through.
    fn handle_projectile_block_hit(&mut self, _hit: &BlockHit, _commands: &mut CombatCommands) -> bool {
        true
    }
}

/// Built-in effect of a skill's declared action. Returns whether it fired.
pub fn perform_skill_action(skill: &SkillDef, invocation: &mut SkillInvocation) -> bool {
    let aim = invocation.aim;
    let caster = invocation.caster;
    match &skill.action {
        SkillAction::None => false,
        SkillAction::Projectile { type_id } => invocation
            .projectiles
            .fire(aim.origin, aim.direction, FireArgs::new(type_id.clone()).with_owner(caster))
            .is_some(),
        SkillAction::Volley {
            type_id,
            count,
            spread_deg,
        } => {
            let ids = invocation
                .projectiles
                .fire_volley(aim.origin, aim.direction, *count, *spread_deg, |_| {
                    FireArgs::new(type_id.clone()).with_owner(caster)
                });
            !ids.is_empty()
        }
        SkillAction::Melee {
            damage,
            range,
            hit_radius,
            max_hits,
        } => {
            // Промах тоже считается ударом: стоимость списывается
            if normalize_direction(aim.direction).is_none() || !(*damage > 0.0) || !(*range > 0.0) {
                return false;
            }
            let attack = MeleeAttack::new(aim.origin, aim.direction, *damage, *range)
                .with_attacker(caster)
                .with_hit_radius(*hit_radius)
                .with_max_hits(*max_hits);
            AttackTargetResolver::new().perform_melee_attack(invocation.targets, &attack, invocation.commands);
            true
        }
        SkillAction::Nova {
            radius,
            base_damage,
            min_damage,
        } => {
            let explosion = ExplosionParams::new(*radius, *base_damage, *min_damage);
            if !explosion.is_effective() {
                return false;
            }
            AttackTargetResolver::new().apply_explosion_damage(
                invocation.targets,
                aim.origin,
                &explosion,
                Some(caster),
                Some(caster),
                invocation.commands,
            );
            true
        }
    }
}

/// Runtime of characters without bespoke logic.
#[derive(Debug, Clone)]
pub struct StandardRuntime {
    id: String,
    traits: CharacterTraits,
}

impl Default for StandardRuntime {
    fn default() -> Self {
        Self {
            id: "default".into(),
            traits: CharacterTraits::default(),
        }
    }
}

impl StandardRuntime {
    pub fn new(decl: &CharacterDecl) -> Self {
        Self {
            id: decl.id.clone(),
            traits: decl.traits.clone(),
        }
    }
}

impl CharacterRuntime for StandardRuntime {
    fn character_id(&self) -> &str {
        &self.id
    }

    fn before_damage(&mut self, amount: f32, _kind: DamageKind) -> f32 {
        let multiplier = self.traits.damage_taken_multiplier;
        if multiplier.is_finite() && multiplier >= 0.0 {
            amount * multiplier
        } else {
            amount
        }
    }

    fn is_immune_to_status(&self, kind: StatusEffectType) -> bool {
        self.traits.status_immunities.contains(&kind)
    }

    fn movement_speed_multiplier(&self, _now: f64) -> f32 {
        self.traits.move_speed_multiplier
    }
}

pub type RuntimeFactory = Box<dyn Fn(&CharacterDecl) -> Box<dyn CharacterRuntime> + Send + Sync>;

/// Read-mostly table of characters, built once at startup.
#[derive(Default)]
pub struct CharacterRegistry {
    decls: HashMap<String, CharacterDecl>,
    factories: HashMap<String, RuntimeFactory>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a RON list of `CharacterDecl`.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let decls: Vec<CharacterDecl> = ron::from_str(source)?;
        let mut registry = Self::new();
        for decl in decls {
            registry.register(decl)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, decl: CharacterDecl) -> Result<()> {
        decl.validate()?;
        if self.decls.contains_key(&decl.id) {
            return Err(ConfigError::DuplicateCharacter(decl.id));
        }
        self.decls.insert(decl.id.clone(), decl);
        Ok(())
    }

    /// Bespoke runtime for `id` (replaces any previous factory).
    pub fn register_runtime(
        &mut self,
        id: impl Into<String>,
        factory: impl Fn(&CharacterDecl) -> Box<dyn CharacterRuntime> + Send + Sync + 'static,
    ) {
        self.factories.insert(id.into(), Box::new(factory));
    }

    pub fn get(&self, id: &str) -> Option<&CharacterDecl> {
        self.decls.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.decls.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Runtime for a declared character; `StandardRuntime` when no factory
    /// is registered. `None` for an unknown id.
    pub fn instantiate(&self, id: &str) -> Option<Box<dyn CharacterRuntime>> {
        let Some(decl) = self.decls.get(id) else {
            logger::log_warning(&format!("⚠️ Unknown character '{}'", id));
            return None;
        };
        Some(match self.factories.get(id) {
            Some(factory) => factory(decl),
            None => Box::new(StandardRuntime::new(decl)),
        })
    }
}
