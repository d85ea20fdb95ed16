//! StatsState: per-entity resource pools and skill cooldown bookkeeping.
//!
//! Health is mirrored from the world's `HealthPool`; mana and energy are
//! owned here. Every mutator clamps to `[0, max]` and returns the delta it
//! actually applied.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::character::CharacterRuntime;
use crate::components::{HealthPool, ResourcePool};
use crate::error::{ConfigError, Result};
use crate::logger;
use crate::skill::SkillDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Mana,
    Energy,
}

/// Resource cost of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SkillCost {
    Fixed(f32),
    /// Drains the whole pool; requires a non-empty pool
    All,
}

impl Default for SkillCost {
    fn default() -> Self {
        SkillCost::Fixed(0.0)
    }
}

/// Data-driven tweaks used by the standard character runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterTraits {
    pub status_immunities: Vec<crate::status::StatusEffectType>,
    pub damage_taken_multiplier: f32,
    pub move_speed_multiplier: f32,
}

impl Default for CharacterTraits {
    fn default() -> Self {
        Self {
            status_immunities: Vec::new(),
            damage_taken_multiplier: 1.0,
            move_speed_multiplier: 1.0,
        }
    }
}

/// Declared stats of a playable character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterDecl {
    pub id: String,
    pub max_mana: f32,
    pub max_energy: f32,
    /// per second
    pub mana_regen: f32,
    pub energy_regen: f32,
    /// Extra regen per second while moving
    pub moving_mana_bonus: f32,
    pub moving_energy_bonus: f32,
    pub traits: CharacterTraits,
    pub skills: Vec<SkillDef>,
}

impl Default for CharacterDecl {
    fn default() -> Self {
        Self {
            id: "default".into(),
            max_mana: 100.0,
            max_energy: 100.0,
            mana_regen: 2.0,
            energy_regen: 5.0,
            moving_mana_bonus: 0.0,
            moving_energy_bonus: 0.0,
            traits: CharacterTraits::default(),
            skills: Vec::new(),
        }
    }
}

impl CharacterDecl {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let decl: CharacterDecl = ron::from_str(source)?;
        decl.validate()?;
        Ok(decl)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("max_mana", self.max_mana),
            ("max_energy", self.max_energy),
            ("mana_regen", self.mana_regen),
            ("energy_regen", self.energy_regen),
            ("moving_mana_bonus", self.moving_mana_bonus),
            ("moving_energy_bonus", self.moving_energy_bonus),
        ];
        for (field, value) in checks {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for skill in &self.skills {
            if !seen.insert(skill.key.as_str()) {
                return Err(ConfigError::DuplicateSkill {
                    character: self.id.clone(),
                    skill: skill.key.clone(),
                });
            }
            if !(skill.cooldown >= 0.0) || !skill.cooldown.is_finite() {
                return Err(ConfigError::InvalidValue {
                    field: "cooldown",
                    value: skill.cooldown,
                });
            }
        }
        Ok(())
    }
}

/// Resource pools + cooldown-until map of one combat entity.
#[derive(Debug, Clone)]
pub struct StatsState {
    health: ResourcePool,
    mana: ResourcePool,
    energy: ResourcePool,
    mana_regen: f32,
    energy_regen: f32,
    moving_mana_bonus: f32,
    moving_energy_bonus: f32,
    /// skill key → declared cooldown (seconds)
    cooldown_durations: HashMap<String, f32>,
    /// skill key → time the cooldown ends (same clock as `now`)
    cooldown_until: HashMap<String, f64>,
    infinite: bool,
}

impl StatsState {
    pub fn new(decl: &CharacterDecl) -> Self {
        let mut stats = Self {
            health: ResourcePool::new(0.0),
            mana: ResourcePool::new(decl.max_mana),
            energy: ResourcePool::new(decl.max_energy),
            mana_regen: 0.0,
            energy_regen: 0.0,
            moving_mana_bonus: 0.0,
            moving_energy_bonus: 0.0,
            cooldown_durations: HashMap::new(),
            cooldown_until: HashMap::new(),
            infinite: false,
        };
        stats.apply_character(decl);
        stats.mana.fill();
        stats.energy.fill();
        stats
    }

    /// Re-derive maxima, regen and cooldown table from a declaration.
    /// Current values are kept, clamped to the new maxima.
    pub fn apply_character(&mut self, decl: &CharacterDecl) {
        self.mana.set_max(decl.max_mana);
        self.energy.set_max(decl.max_energy);
        self.mana_regen = non_negative(decl.mana_regen);
        self.energy_regen = non_negative(decl.energy_regen);
        self.moving_mana_bonus = non_negative(decl.moving_mana_bonus);
        self.moving_energy_bonus = non_negative(decl.moving_energy_bonus);
        self.cooldown_durations = decl
            .skills
            .iter()
            .map(|skill| (skill.key.clone(), non_negative(skill.cooldown)))
            .collect();
        if self.infinite {
            self.fill_all();
        }
    }

    pub fn health(&self) -> &ResourcePool {
        &self.health
    }

    pub fn mana(&self) -> &ResourcePool {
        &self.mana
    }

    pub fn energy(&self) -> &ResourcePool {
        &self.energy
    }

    pub fn pool(&self, kind: ResourceKind) -> &ResourcePool {
        match kind {
            ResourceKind::Mana => &self.mana,
            ResourceKind::Energy => &self.energy,
        }
    }

    fn pool_mut(&mut self, kind: ResourceKind) -> &mut ResourcePool {
        match kind {
            ResourceKind::Mana => &mut self.mana,
            ResourceKind::Energy => &mut self.energy,
        }
    }

    /// Mirror the world-owned health pool (HUD only; damage goes to the pool).
    pub fn sync_health(&mut self, pool: &dyn HealthPool) {
        self.health.set_max(pool.max());
        self.health.current = 0.0;
        self.health.apply(pool.current());
    }

    pub fn apply(&mut self, kind: ResourceKind, amount: f32) -> f32 {
        if self.infinite {
            return 0.0;
        }
        self.pool_mut(kind).apply(amount)
    }

    pub fn spend(&mut self, kind: ResourceKind, amount: f32) -> f32 {
        if self.infinite {
            return 0.0;
        }
        self.pool_mut(kind).spend(amount)
    }

    pub fn apply_energy(&mut self, amount: f32) -> f32 {
        self.apply(ResourceKind::Energy, amount)
    }

    pub fn spend_energy(&mut self, amount: f32) -> f32 {
        self.spend(ResourceKind::Energy, amount)
    }

    pub fn apply_mana(&mut self, amount: f32) -> f32 {
        self.apply(ResourceKind::Mana, amount)
    }

    pub fn spend_mana(&mut self, amount: f32) -> f32 {
        self.spend(ResourceKind::Mana, amount)
    }

    /// Drain the energy pool, returns what was consumed.
    pub fn consume_all_energy(&mut self) -> f32 {
        if self.infinite {
            return 0.0;
        }
        self.energy.drain()
    }

    pub fn can_afford(&self, kind: ResourceKind, cost: SkillCost) -> bool {
        if self.infinite {
            return true;
        }
        let pool = self.pool(kind);
        match cost {
            SkillCost::Fixed(amount) => pool.can_afford(amount),
            SkillCost::All => !pool.is_empty(),
        }
    }

    /// Charge a skill cost, returns the amount actually spent.
    pub fn spend_cost(&mut self, kind: ResourceKind, cost: SkillCost) -> f32 {
        if self.infinite {
            return 0.0;
        }
        match cost {
            SkillCost::Fixed(amount) => self.pool_mut(kind).spend(amount),
            SkillCost::All => self.pool_mut(kind).drain(),
        }
    }

    /// Seconds until `key` is usable again.
    ///
    /// A runtime that reports its own remaining time wins over the timer.
    pub fn cooldown_remaining(&self, key: &str, now: f64, runtime: &dyn CharacterRuntime) -> f32 {
        if let Some(remaining) = runtime.skill_cooldown_remaining(key, now) {
            return non_negative(remaining);
        }
        match self.cooldown_until.get(key) {
            Some(until) => non_negative((until - now) as f32),
            None => 0.0,
        }
    }

    pub fn cooldown_duration(&self, key: &str, runtime: &dyn CharacterRuntime) -> f32 {
        if let Some(duration) = runtime.skill_cooldown_duration(key) {
            return non_negative(duration);
        }
        self.cooldown_durations.get(key).copied().unwrap_or(0.0)
    }

    /// Start the cooldown of `key` at `now`. Skipped when the runtime manages
    /// that skill's cooldown itself.
    pub fn start_cooldown(&mut self, key: &str, now: f64, runtime: &dyn CharacterRuntime) {
        if runtime.manages_own_cooldown(key) {
            logger::log(&format!("⏱️ Cooldown of '{}' is self-managed, not started", key));
            return;
        }
        let duration = self.cooldown_duration(key, runtime);
        if duration > 0.0 {
            self.cooldown_until.insert(key.to_string(), now + duration as f64);
        }
    }

    pub fn clear_cooldown(&mut self, key: &str) {
        self.cooldown_until.remove(key);
    }

    pub fn reset_cooldowns(&mut self) {
        self.cooldown_until.clear();
    }

    /// Drop finished timers.
    pub fn prune_cooldowns(&mut self, now: f64) {
        self.cooldown_until.retain(|_, until| *until > now);
    }

    /// Passive regen for `delta` seconds (+ movement bonus while moving).
    pub fn regen(&mut self, delta: f32, moving: bool) {
        if self.infinite {
            self.fill_all();
            return;
        }
        if !(delta > 0.0) || !delta.is_finite() {
            return;
        }
        let (mana_bonus, energy_bonus) = if moving {
            (self.moving_mana_bonus, self.moving_energy_bonus)
        } else {
            (0.0, 0.0)
        };
        self.mana.regenerate(self.mana_regen + mana_bonus, delta);
        self.energy.regenerate(self.energy_regen + energy_bonus, delta);
    }

    /// Debug mode: pools pinned at max, spends are no-ops.
    pub fn set_infinite(&mut self, enabled: bool) {
        self.infinite = enabled;
        if enabled {
            self.fill_all();
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.infinite
    }

    fn fill_all(&mut self) {
        self.mana.fill();
        self.energy.fill();
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::StandardRuntime;
    use crate::components::Health;
    use crate::skill::SkillDef;

    fn decl() -> CharacterDecl {
        CharacterDecl {
            id: "tester".into(),
            max_mana: 50.0,
            max_energy: 100.0,
            mana_regen: 1.0,
            energy_regen: 10.0,
            moving_mana_bonus: 0.0,
            moving_energy_bonus: 5.0,
            skills: vec![SkillDef::new("dash", ResourceKind::Energy, SkillCost::Fixed(30.0), 2.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_never_exceeds_max() {
        let mut stats = StatsState::new(&decl());
        stats.spend_energy(40.0);

        let gained = stats.apply_energy(1.0e9);
        assert_eq!(gained, 40.0);
        assert_eq!(stats.energy().current, 100.0);
        assert_eq!(stats.apply_energy(10.0), 0.0);
    }

    #[test]
    fn test_spend_on_empty_pool_returns_zero() {
        let mut stats = StatsState::new(&decl());
        assert_eq!(stats.consume_all_energy(), 100.0);
        assert_eq!(stats.spend_energy(25.0), 0.0);
        assert_eq!(stats.energy().current, 0.0);
    }

    #[test]
    fn test_spend_returns_actual_delta() {
        let mut stats = StatsState::new(&decl());
        assert_eq!(stats.spend_mana(80.0), 50.0);
        assert_eq!(stats.spend_mana(f32::NAN), 0.0);
        assert_eq!(stats.apply_mana(-5.0), 0.0);
        assert_eq!(stats.mana().current, 0.0);
    }

    #[test]
    fn test_skill_cost_all_requires_non_empty_pool() {
        let mut stats = StatsState::new(&decl());
        assert!(stats.can_afford(ResourceKind::Energy, SkillCost::All));
        assert_eq!(stats.spend_cost(ResourceKind::Energy, SkillCost::All), 100.0);
        assert!(!stats.can_afford(ResourceKind::Energy, SkillCost::All));
        assert!(!stats.can_afford(ResourceKind::Energy, SkillCost::Fixed(1.0)));
        assert!(stats.can_afford(ResourceKind::Energy, SkillCost::Fixed(0.0)));
    }

    #[test]
    fn test_regen_with_movement_bonus() {
        let mut stats = StatsState::new(&decl());
        stats.consume_all_energy();

        stats.regen(1.0, false);
        assert!((stats.energy().current - 10.0).abs() < 1e-4);

        stats.regen(1.0, true);
        assert!((stats.energy().current - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_infinite_mode_pins_pools() {
        let mut stats = StatsState::new(&decl());
        stats.spend_mana(20.0);
        stats.set_infinite(true);

        assert_eq!(stats.mana().current, 50.0);
        assert_eq!(stats.spend_mana(20.0), 0.0);
        assert_eq!(stats.consume_all_energy(), 0.0);
        assert_eq!(stats.energy().current, 100.0);

        stats.set_infinite(false);
        assert_eq!(stats.spend_mana(20.0), 20.0);
    }

    #[test]
    fn test_cooldown_timer() {
        let runtime = StandardRuntime::default();
        let mut stats = StatsState::new(&decl());

        assert_eq!(stats.cooldown_remaining("dash", 10.0, &runtime), 0.0);
        stats.start_cooldown("dash", 10.0, &runtime);
        assert!((stats.cooldown_remaining("dash", 10.5, &runtime) - 1.5).abs() < 1e-5);
        assert_eq!(stats.cooldown_remaining("dash", 12.0, &runtime), 0.0);
        assert_eq!(stats.cooldown_duration("dash", &runtime), 2.0);

        stats.prune_cooldowns(12.0);
        stats.start_cooldown("dash", 20.0, &runtime);
        stats.reset_cooldowns();
        assert_eq!(stats.cooldown_remaining("dash", 20.1, &runtime), 0.0);
    }

    #[test]
    fn test_apply_character_clamps_current() {
        let mut stats = StatsState::new(&decl());
        let mut smaller = decl();
        smaller.max_energy = 40.0;
        stats.apply_character(&smaller);
        assert_eq!(stats.energy().max, 40.0);
        assert_eq!(stats.energy().current, 40.0);
    }

    #[test]
    fn test_sync_health_mirrors_pool() {
        let mut stats = StatsState::new(&decl());
        let health = Health { current: 30, max: 80 };
        stats.sync_health(&health);
        assert_eq!(stats.health().current, 30.0);
        assert_eq!(stats.health().max, 80.0);
    }

    #[test]
    fn test_declaration_rejects_duplicate_skill() {
        let source = r#"(
            id: "twin",
            skills: [
                (key: "q", resource: Mana, cost: Fixed(10.0), cooldown: 1.0),
                (key: "q", resource: Energy, cost: All, cooldown: 3.0),
            ],
        )"#;
        let err = CharacterDecl::from_ron_str(source).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSkill { ref skill, .. } if skill == "q"));
    }
}
