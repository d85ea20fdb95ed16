//! Headless симуляция SKYREND
//!
//! Один персонаж, три манекена, залп и нова: 3 секунды FixedUpdate без рендера.

use std::sync::Arc;

use bevy::prelude::*;
use skyrend_simulation::*;

const PROJECTILE_TYPES: &str = r#"[
    (id: "arrow", speed: 25.0, lifetime: 2.0, damage: 12.0),
    (
        id: "firebomb",
        speed: 12.0,
        lifetime: 1.0,
        damage: 8.0,
        explosion: Some((radius: 2.0, base_damage: 30.0, min_damage: 10.0)),
        rules: (explode_on_target_hit: true, explode_on_expire: true, split_on_impact: true),
    ),
]"#;

const CHARACTERS: &str = r#"[
    (
        id: "ranger",
        max_mana: 120.0,
        max_energy: 100.0,
        mana_regen: 4.0,
        energy_regen: 8.0,
        skills: [
            (key: "volley", resource: Energy, cost: Fixed(30.0), cooldown: 1.5,
             action: Volley(type_id: "arrow", count: 5, spread_deg: 30.0)),
            (key: "firebomb", resource: Mana, cost: Fixed(25.0), cooldown: 2.0,
             action: Projectile(type_id: "firebomb")),
            (key: "nova", resource: Mana, cost: All, cooldown: 6.0,
             action: Nova(radius: 4.0, base_damage: 40.0, min_damage: 15.0)),
        ],
    ),
]"#;

/// Манекен: считает полученный урон
struct TrainingDummy {
    id: TargetId,
    center: Vec3,
    health: Health,
}

impl AttackTarget for TrainingDummy {
    fn id(&self) -> TargetId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.health.is_alive()
    }

    fn volume(&self) -> HitVolume {
        HitVolume::sphere(self.center, 0.6)
    }

    fn on_hit(&mut self, hit: &AttackHit, _commands: &mut CombatCommands) {
        let lost = self.health.take_damage(hit.damage);
        log_info(&format!(
            "🎯 Dummy {:?} took {} ({:?}), {} HP left",
            self.id, lost, hit.kind, self.health.current
        ));
    }
}

fn main() -> Result<(), ConfigError> {
    let seed = 42;
    println!("Starting SKYREND headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin::default());

    let config = app.world().resource::<CombatConfig>().clone();
    let types = Arc::new(ProjectileTypeRegistry::from_ron_str(PROJECTILE_TYPES)?);
    let characters = CharacterRegistry::from_ron_str(CHARACTERS)?;
    let player = TargetId(1);
    let Some(updater) = FrameUpdater::for_character(&config, types, &characters, "ranger", player) else {
        log_error("Character 'ranger' is not registered");
        return Ok(());
    };
    app.insert_resource(CombatFrame::new(updater));

    {
        let mut scene = app.world_mut().resource_mut::<CombatScene>();
        for (i, x) in [-2.0f32, 0.0, 2.0].into_iter().enumerate() {
            scene.targets.push(Box::new(TrainingDummy {
                id: TargetId(10 + i as u64),
                center: Vec3::new(x, 1.0, 12.0),
                health: Health::new(100),
            }));
        }
    }

    let aim = Aim::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z);
    for key in ["volley", "firebomb", "nova"] {
        app.world_mut().send_event(UseSkillRequest { key: key.into(), aim });
        run_fixed_ticks(&mut app, 60);
    }

    let frame = app.world().resource::<CombatFrame>();
    let stats = frame.updater.stats();
    println!(
        "Simulation complete! mana {:.1}/{:.1}, energy {:.1}/{:.1}, live projectiles {}",
        stats.mana().current,
        stats.mana().max,
        stats.energy().current,
        stats.energy().max,
        frame.updater.projectiles().live_count()
    );
    Ok(())
}
