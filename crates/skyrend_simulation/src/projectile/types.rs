//! Projectile type table: per-type defaults, rule flags and factory hooks.
//!
//! Built once at startup (from RON or code) and shared read-only with the
//! projectile system through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::record::ProjectileId;
use crate::combat::{CombatCommands, ExplosionParams, TargetId};
use crate::error::{ConfigError, Result};
use crate::logger;

/// Id of the built-in type used when nothing else resolves.
pub const DEFAULT_PROJECTILE_TYPE: &str = "default";

/// Opaque handle returned by `create_mesh`; the core only hands it back to
/// `dispose_mesh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

/// Per-type behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileRules {
    pub grant_resource_on_hit: bool,
    pub explode_on_target_hit: bool,
    pub explode_on_world_hit: bool,
    pub explode_on_expire: bool,
    pub remove_on_target_hit: bool,
    pub remove_on_world_hit: bool,
    /// Splash skips the target that was hit directly
    pub split_on_impact: bool,
}

impl Default for ProjectileRules {
    fn default() -> Self {
        Self {
            grant_resource_on_hit: false,
            explode_on_target_hit: false,
            explode_on_world_hit: false,
            explode_on_expire: false,
            remove_on_target_hit: true,
            remove_on_world_hit: true,
            split_on_impact: false,
        }
    }
}

/// Default kinematic / damage parameters of one projectile type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileTypeDef {
    pub id: String,
    /// м/с
    pub speed: f32,
    /// секунды
    pub lifetime: f32,
    /// Collision radius against world geometry and blockers
    pub radius: f32,
    /// Extra reach against attack targets (thick projectiles)
    pub target_hit_radius: f32,
    pub damage: f32,
    /// Multiplier on the configured gravity (0 = straight flight)
    pub gravity_scale: f32,
    pub explosion: Option<ExplosionParams>,
    pub rules: ProjectileRules,
    pub energy_on_hit: f32,
    pub mana_on_hit: f32,
}

impl Default for ProjectileTypeDef {
    fn default() -> Self {
        Self {
            id: DEFAULT_PROJECTILE_TYPE.into(),
            speed: 20.0,
            lifetime: 3.0,
            radius: 0.1,
            target_hit_radius: 0.25,
            damage: 10.0,
            gravity_scale: 0.0,
            explosion: None,
            rules: ProjectileRules::default(),
            energy_on_hit: 0.0,
            mana_on_hit: 0.0,
        }
    }
}

impl ProjectileTypeDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// What a projectile sees when it is created.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileSpawnInfo<'a> {
    pub projectile: ProjectileId,
    pub type_id: &'a str,
    pub origin: Vec3,
    pub direction: Vec3,
    pub radius: f32,
}

/// Context passed to the impact / expiry hooks.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileHitContext<'a> {
    pub now: f64,
    pub projectile: ProjectileId,
    pub type_id: &'a str,
    pub owner: Option<TargetId>,
    /// Target hit directly (None for world hits and expiry)
    pub target: Option<TargetId>,
    pub point: Vec3,
    pub velocity: Vec3,
}

/// Hook answer; `None` keeps the type's rule flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitResponse {
    pub explode: Option<bool>,
    pub remove: Option<bool>,
}

impl HitResponse {
    pub fn keep_rules() -> Self {
        Self::default()
    }

    pub fn explode(mut self, explode: bool) -> Self {
        self.explode = Some(explode);
        self
    }

    pub fn remove(mut self, remove: bool) -> Self {
        self.remove = Some(remove);
        self
    }
}

/// Factory hooks an ability attaches to its projectile type.
///
/// All methods have no-op defaults. `remove` in the `on_expire` answer is
/// ignored: an expired projectile is always removed.
pub trait ProjectileHooks: Send + Sync {
    fn create_mesh(&self, _spawn: &ProjectileSpawnInfo) -> Option<VisualHandle> {
        None
    }

    fn dispose_mesh(&self, _handle: VisualHandle) {}

    fn spawn_explosion_fx(&self, _center: Vec3, _radius: f32) {}

    fn on_target_hit(&self, _ctx: &ProjectileHitContext, _commands: &mut CombatCommands) -> HitResponse {
        HitResponse::keep_rules()
    }

    fn on_world_hit(&self, _ctx: &ProjectileHitContext, _commands: &mut CombatCommands) -> HitResponse {
        HitResponse::keep_rules()
    }

    fn on_expire(&self, _ctx: &ProjectileHitContext, _commands: &mut CombatCommands) -> HitResponse {
        HitResponse::keep_rules()
    }
}

#[derive(Clone)]
pub struct ProjectileTypeEntry {
    pub def: ProjectileTypeDef,
    pub hooks: Option<Arc<dyn ProjectileHooks>>,
}

/// Type definition resolved for one `fire` call.
#[derive(Clone)]
pub struct ResolvedProjectileType {
    pub def: ProjectileTypeDef,
    pub hooks: Option<Arc<dyn ProjectileHooks>>,
    /// True when the requested id was unknown and a fallback was used
    pub is_fallback: bool,
}

/// Registry: type id → definition + hooks.
#[derive(Clone)]
pub struct ProjectileTypeRegistry {
    types: HashMap<String, ProjectileTypeEntry>,
    fallback_id: String,
}

impl std::fmt::Debug for ProjectileTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.types.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ProjectileTypeRegistry")
            .field("types", &ids)
            .field("fallback_id", &self.fallback_id)
            .finish()
    }
}

impl Default for ProjectileTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectileTypeRegistry {
    /// Registry containing only the built-in default type.
    pub fn new() -> Self {
        let mut types = HashMap::new();
        types.insert(
            DEFAULT_PROJECTILE_TYPE.to_string(),
            ProjectileTypeEntry {
                def: ProjectileTypeDef::default(),
                hooks: None,
            },
        );
        Self {
            types,
            fallback_id: DEFAULT_PROJECTILE_TYPE.into(),
        }
    }

    /// Parse a RON list of definitions on top of the built-in default.
    ///
    /// A table entry with id `"default"` replaces the built-in one.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let defs: Vec<ProjectileTypeDef> = ron::from_str(source)?;
        let mut registry = Self::new();
        let mut seen = std::collections::HashSet::new();
        for def in defs {
            if !seen.insert(def.id.clone()) {
                return Err(ConfigError::DuplicateProjectileType(def.id));
            }
            validate_def(&def)?;
            registry.types.insert(
                def.id.clone(),
                ProjectileTypeEntry { def, hooks: None },
            );
        }
        Ok(registry)
    }

    pub fn register(&mut self, def: ProjectileTypeDef) -> Result<()> {
        self.insert(def, None)
    }

    pub fn register_with_hooks(
        &mut self,
        def: ProjectileTypeDef,
        hooks: Arc<dyn ProjectileHooks>,
    ) -> Result<()> {
        self.insert(def, Some(hooks))
    }

    /// Attach hooks to an already registered type (RON tables carry no code).
    pub fn set_hooks(&mut self, id: &str, hooks: Arc<dyn ProjectileHooks>) -> bool {
        match self.types.get_mut(id) {
            Some(entry) => {
                entry.hooks = Some(hooks);
                true
            }
            None => false,
        }
    }

    pub fn set_fallback(&mut self, id: impl Into<String>) {
        self.fallback_id = id.into();
    }

    pub fn fallback_id(&self) -> &str {
        &self.fallback_id
    }

    pub fn get(&self, id: &str) -> Option<&ProjectileTypeEntry> {
        self.types.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Resolve `id`, falling back to the configured fallback type (and
    /// then to the built-in default) instead of failing the frame.
    pub fn resolve(&self, id: &str) -> ResolvedProjectileType {
        if let Some(entry) = self.types.get(id) {
            return ResolvedProjectileType {
                def: entry.def.clone(),
                hooks: entry.hooks.clone(),
                is_fallback: false,
            };
        }

        logger::log_warning(&format!(
            "⚠️ Unknown projectile type '{}', falling back to '{}'",
            id, self.fallback_id
        ));
        match self.types.get(&self.fallback_id) {
            Some(entry) => ResolvedProjectileType {
                def: entry.def.clone(),
                hooks: entry.hooks.clone(),
                is_fallback: true,
            },
            None => ResolvedProjectileType {
                def: ProjectileTypeDef::default(),
                hooks: None,
                is_fallback: true,
            },
        }
    }

    fn insert(&mut self, def: ProjectileTypeDef, hooks: Option<Arc<dyn ProjectileHooks>>) -> Result<()> {
        validate_def(&def)?;
        // Built-in default may be replaced once by the game's own table
        if self.types.contains_key(&def.id) && def.id != DEFAULT_PROJECTILE_TYPE {
            return Err(ConfigError::DuplicateProjectileType(def.id));
        }
        self.types
            .insert(def.id.clone(), ProjectileTypeEntry { def, hooks });
        Ok(())
    }
}

fn validate_def(def: &ProjectileTypeDef) -> Result<()> {
    let checks = [
        ("speed", def.speed),
        ("lifetime", def.lifetime),
        ("radius", def.radius),
        ("target_hit_radius", def.target_hit_radius),
    ];
    for (field, value) in checks {
        if !(value >= 0.0) || !value.is_finite() {
            return Err(ConfigError::InvalidValue { field, value });
        }
    }
    if !def.gravity_scale.is_finite() {
        return Err(ConfigError::InvalidValue {
            field: "gravity_scale",
            value: def.gravity_scale,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"[
        (id: "arrow", speed: 40.0, damage: 12.0, gravity_scale: 1.0),
        (
            id: "fireball",
            speed: 15.0,
            lifetime: 2.0,
            explosion: Some((radius: 3.0, base_damage: 30.0, min_damage: 5.0)),
            rules: (explode_on_target_hit: true, explode_on_world_hit: true, split_on_impact: true),
        ),
    ]"#;

    #[test]
    fn test_ron_table_layers_over_defaults() {
        let registry = ProjectileTypeRegistry::from_ron_str(TABLE).unwrap();
        assert_eq!(registry.len(), 3);

        let arrow = &registry.get("arrow").unwrap().def;
        assert_eq!(arrow.speed, 40.0);
        assert_eq!(arrow.lifetime, 3.0);
        assert!(arrow.rules.remove_on_target_hit);

        let fireball = &registry.get("fireball").unwrap().def;
        assert_eq!(fireball.explosion.unwrap().radius, 3.0);
        assert!(fireball.rules.split_on_impact);
        assert!(!fireball.rules.explode_on_expire);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = ProjectileTypeRegistry::from_ron_str(r#"[(id: "a"), (id: "a")]"#).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProjectileType(id) if id == "a"));

        let mut registry = ProjectileTypeRegistry::new();
        registry.register(ProjectileTypeDef::new("bolt")).unwrap();
        assert!(registry.register(ProjectileTypeDef::new("bolt")).is_err());
    }

    #[test]
    fn test_negative_speed_rejected() {
        let mut def = ProjectileTypeDef::new("broken");
        def.speed = -1.0;
        let err = ProjectileTypeRegistry::new().register(def).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "speed", .. }));
    }

    #[test]
    fn test_unknown_type_falls_back() {
        let mut registry = ProjectileTypeRegistry::new();
        registry.register(ProjectileTypeDef::new("arrow")).unwrap();
        registry.set_fallback("arrow");

        let resolved = registry.resolve("does-not-exist");
        assert!(resolved.is_fallback);
        assert_eq!(resolved.def.id, "arrow");

        registry.set_fallback("also-missing");
        let resolved = registry.resolve("does-not-exist");
        assert!(resolved.is_fallback);
        assert_eq!(resolved.def.id, DEFAULT_PROJECTILE_TYPE);
    }
}
