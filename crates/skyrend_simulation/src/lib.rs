//! SKYREND Simulation Core
//!
//! Real-time combat core: attack resolution, projectiles, resource pools,
//! skill gating and status effects of one playable character.
//!
//! Plain structs do the work (`FrameUpdater` and the systems under it);
//! `SimulationPlugin` runs them inside a Bevy `FixedUpdate` schedule.

use bevy::prelude::*;

// Публичные модули
pub mod character;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod frame;
pub mod logger;
pub mod projectile;
pub mod skill;
pub mod stats;
pub mod status;

#[cfg(test)]
mod test_support;

// Re-export для удобства
pub use character::{CharacterRegistry, CharacterRuntime, DamageKind, StandardRuntime};
pub use combat::{
    AttackHit, AttackTarget, AttackTargetResolver, CombatCommand, CombatCommands, ExplosionParams, HitKind,
    HitVolume, MeleeAttack, TargetId,
};
pub use components::{Health, HealthPool, ResourcePool};
pub use config::CombatConfig;
pub use error::ConfigError;
pub use frame::{
    CombatFrame, CombatPlugin, CombatScene, CombatView, CombatWorld, FrameInput, FrameOutput, FrameUpdater,
    ProjectileRemovedEvent, SkillUsed, UiSnapshot, UiSnapshotChanged, UseSkillRequest,
};
pub use logger::{init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel, LogPrinter};
pub use projectile::{FireArgs, ProjectileId, ProjectileSystem, ProjectileTypeDef, ProjectileTypeRegistry};
pub use skill::{Aim, SkillDef, SkillState, SkillUseOutcome};
pub use stats::{CharacterDecl, ResourceKind, SkillCost, StatsState};
pub use status::{StatusEffectState, StatusEffectType, StatusRequest};

/// Главный plugin симуляции
#[derive(Default)]
pub struct SimulationPlugin {
    /// Used when the app has no `CombatConfig` resource yet
    pub config: CombatConfig,
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<CombatConfig>()
            .cloned()
            .unwrap_or_else(|| self.config.clone());

        app
            // Fixed timestep для combat tick
            .insert_resource(Time::<Fixed>::from_hz(config.tick_hz))
            .insert_resource(config)
            .init_resource::<CombatScene>()
            .add_plugins(CombatPlugin);
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    let config = CombatConfig {
        rng_seed: seed,
        ..Default::default()
    };
    app.add_plugins(MinimalPlugins)
        .insert_resource(Time::<Fixed>::from_hz(config.tick_hz))
        .insert_resource(config);

    app
}

/// Step `FixedUpdate` exactly `ticks` times, independent of wall-clock time.
pub fn run_fixed_ticks(app: &mut App, ticks: usize) {
    let Some(timestep) = app.world().get_resource::<Time<Fixed>>().map(|time| time.timestep()) else {
        log_warning("⚠️ run_fixed_ticks: no Time<Fixed> resource");
        return;
    };
    for _ in 0..ticks {
        if let Some(mut time) = app.world_mut().get_resource_mut::<Time<Fixed>>() {
            time.advance_by(timestep);
        }
        app.world_mut().run_schedule(FixedUpdate);
    }
}
