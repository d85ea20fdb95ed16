//! SkillState: gatekeeper of skill activation.
//!
//! Order of `try_use_skill`:
//! 1. runtime `before_skill_use` → modifier (veto / waive cooldown / waive cost)
//! 2. cooldown and resource checks (unless waived)
//! 3. runtime `handle_skill` performs the effect and reports whether it fired
//! 4. cost + cooldown committed only after a confirmed trigger

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::character::CharacterRuntime;
use crate::combat::{AttackTarget, CombatCommands, TargetId};
use crate::logger;
use crate::projectile::ProjectileSystem;
use crate::stats::{ResourceKind, SkillCost, StatsState};

#[cfg(test)]
mod skill_tests;

/// What the standard handler does when a skill fires.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum SkillAction {
    /// Nothing built in; a bespoke runtime handles the skill
    #[default]
    None,
    Projectile {
        type_id: String,
    },
    Volley {
        type_id: String,
        count: usize,
        spread_deg: f32,
    },
    Melee {
        damage: f32,
        range: f32,
        hit_radius: f32,
        max_hits: usize,
    },
    /// Splash centered on the caster
    Nova {
        radius: f32,
        base_damage: f32,
        min_damage: f32,
    },
}

/// Declared skill: key, cost and cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillDef {
    pub key: String,
    pub resource: ResourceKind,
    pub cost: SkillCost,
    /// seconds
    pub cooldown: f32,
    pub action: SkillAction,
}

impl Default for SkillDef {
    fn default() -> Self {
        Self {
            key: String::new(),
            resource: ResourceKind::Mana,
            cost: SkillCost::default(),
            cooldown: 0.0,
            action: SkillAction::None,
        }
    }
}

impl SkillDef {
    pub fn new(key: impl Into<String>, resource: ResourceKind, cost: SkillCost, cooldown: f32) -> Self {
        Self {
            key: key.into(),
            resource,
            cost,
            cooldown,
            action: SkillAction::None,
        }
    }

    pub fn with_action(mut self, action: SkillAction) -> Self {
        self.action = action;
        self
    }
}

/// Per-invocation override returned by the character runtime.
///
/// `allow = false` vetoes the use even when waivers are set.
/// `ignore_cost_and_cooldown` implies both single waivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillUseModifier {
    pub allow: bool,
    pub ignore_cooldown: bool,
    pub ignore_resource: bool,
    pub ignore_cost_and_cooldown: bool,
}

impl Default for SkillUseModifier {
    fn default() -> Self {
        Self {
            allow: true,
            ignore_cooldown: false,
            ignore_resource: false,
            ignore_cost_and_cooldown: false,
        }
    }
}

impl SkillUseModifier {
    pub fn veto() -> Self {
        Self {
            allow: false,
            ..Default::default()
        }
    }

    pub fn free() -> Self {
        Self {
            ignore_cost_and_cooldown: true,
            ..Default::default()
        }
    }

    pub fn waives_cooldown(&self) -> bool {
        self.ignore_cooldown || self.ignore_cost_and_cooldown
    }

    pub fn waives_resource(&self) -> bool {
        self.ignore_resource || self.ignore_cost_and_cooldown
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkillUseOutcome {
    Triggered,
    Vetoed,
    OnCooldown { remaining: f32 },
    InsufficientResource { kind: ResourceKind },
    /// Handler declined; nothing was charged
    NotTriggered,
    UnknownSkill,
}

impl SkillUseOutcome {
    pub fn is_triggered(&self) -> bool {
        matches!(self, SkillUseOutcome::Triggered)
    }
}

/// Caster aim for one invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aim {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Aim {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }
}

/// Everything a skill handler may touch while performing its effect.
pub struct SkillInvocation<'a> {
    pub caster: TargetId,
    pub aim: Aim,
    pub targets: &'a mut [Box<dyn AttackTarget>],
    pub projectiles: &'a mut ProjectileSystem,
    /// Follow-ups from hit callbacks; drained by the caller
    pub commands: &'a mut CombatCommands,
}

/// Skill table of one character.
#[derive(Debug, Clone, Default)]
pub struct SkillState {
    skills: Vec<SkillDef>,
    index: HashMap<String, usize>,
}

impl SkillState {
    pub fn new(skills: &[SkillDef]) -> Self {
        let mut state = Self::default();
        for skill in skills {
            state.insert(skill.clone());
        }
        state
    }

    /// Add or replace a skill (same key → replaced in place).
    pub fn insert(&mut self, skill: SkillDef) {
        match self.index.get(&skill.key) {
            Some(&i) => self.skills[i] = skill,
            None => {
                self.index.insert(skill.key.clone(), self.skills.len());
                self.skills.push(skill);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&SkillDef> {
        self.index.get(key).map(|&i| &self.skills[i])
    }

    /// Skills in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SkillDef> {
        self.skills.iter()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn try_use_skill(
        &self,
        key: &str,
        now: f64,
        stats: &mut StatsState,
        runtime: &mut dyn CharacterRuntime,
        invocation: &mut SkillInvocation,
    ) -> SkillUseOutcome {
        let Some(skill) = self.get(key) else {
            logger::log_warning(&format!("⚠️ Unknown skill '{}' for {}", key, runtime.character_id()));
            return SkillUseOutcome::UnknownSkill;
        };

        let modifier = runtime.before_skill_use(skill, now);
        if !modifier.allow {
            logger::log(&format!("🚫 Skill '{}' vetoed by {}", key, runtime.character_id()));
            return SkillUseOutcome::Vetoed;
        }
        let waive_cooldown = modifier.waives_cooldown();
        let waive_resource = modifier.waives_resource();

        if !waive_cooldown {
            let remaining = stats.cooldown_remaining(key, now, &*runtime);
            if remaining > 0.0 {
                return SkillUseOutcome::OnCooldown { remaining };
            }
        }
        if !waive_resource && !stats.can_afford(skill.resource, skill.cost) {
            return SkillUseOutcome::InsufficientResource { kind: skill.resource };
        }

        if !runtime.handle_skill(skill, now, invocation) {
            return SkillUseOutcome::NotTriggered;
        }

        if !waive_resource {
            stats.spend_cost(skill.resource, skill.cost);
        }
        if !waive_cooldown {
            stats.start_cooldown(key, now, &*runtime);
        }
        logger::log(&format!("⚡ Skill '{}' triggered at {:.3}", key, now));
        SkillUseOutcome::Triggered
    }
}
