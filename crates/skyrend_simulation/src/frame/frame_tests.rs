#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bevy::prelude::*;

    use crate::character::{CharacterRuntime, DamageKind, StandardRuntime};
    use crate::combat::{AttackTarget, CombatCommands, HitVolume, TargetId};
    use crate::components::Health;
    use crate::config::CombatConfig;
    use crate::frame::*;
    use crate::projectile::{
        BlockHit, Blocker, BlockerId, FireArgs, ProjectileRules, ProjectileTypeDef, ProjectileTypeRegistry,
        RemovalCause,
    };
    use crate::skill::{Aim, SkillAction, SkillDef, SkillUseOutcome};
    use crate::stats::{CharacterDecl, CharacterTraits, ResourceKind, SkillCost};
    use crate::status::StatusRequest;
    use crate::test_support::{sphere_target, HitLog};

    const PLAYER: TargetId = TargetId(1);
    const TICK: f32 = 0.25;

    struct TestWorld {
        targets: Vec<Box<dyn AttackTarget>>,
        blockers: Vec<Blocker>,
        health: Health,
        frames: usize,
    }

    impl TestWorld {
        fn new() -> Self {
            Self {
                targets: Vec::new(),
                blockers: Vec::new(),
                health: Health::new(100),
                frames: 0,
            }
        }
    }

    impl CombatWorld for TestWorld {
        fn view(&mut self) -> CombatView<'_> {
            CombatView {
                targets: &mut self.targets,
                blockers: &self.blockers,
                health: &mut self.health,
            }
        }

        fn after_frame(&mut self, _now: f64, _output: &FrameOutput) {
            self.frames += 1;
        }
    }

    /// Lets every projectile through its owner's shield.
    struct Phaser;

    impl CharacterRuntime for Phaser {
        fn character_id(&self) -> &str {
            "phaser"
        }

        fn handle_projectile_block_hit(&mut self, _hit: &BlockHit, _commands: &mut CombatCommands) -> bool {
            false
        }
    }

    fn decl() -> CharacterDecl {
        CharacterDecl {
            id: "tester".into(),
            max_mana: 100.0,
            max_energy: 100.0,
            mana_regen: 0.0,
            energy_regen: 0.0,
            skills: vec![
                SkillDef::new("nova", ResourceKind::Mana, SkillCost::Fixed(40.0), 3.0).with_action(SkillAction::Nova {
                    radius: 3.0,
                    base_damage: 30.0,
                    min_damage: 10.0,
                }),
            ],
            ..Default::default()
        }
    }

    fn types() -> Arc<ProjectileTypeRegistry> {
        let mut registry = ProjectileTypeRegistry::new();
        let mut bolt = ProjectileTypeDef::new("bolt");
        bolt.speed = 10.0;
        bolt.damage = 10.0;
        registry.register(bolt).unwrap();
        Arc::new(registry)
    }

    fn updater(decl: &CharacterDecl, runtime: Box<dyn CharacterRuntime>) -> FrameUpdater {
        FrameUpdater::new(&CombatConfig::default(), types(), decl, runtime, PLAYER)
    }

    fn standard() -> FrameUpdater {
        let decl = decl();
        updater(&decl, Box::new(StandardRuntime::new(&decl)))
    }

    fn walk(x: f32) -> FrameInput {
        FrameInput {
            move_intent: Vec3::new(x, 0.0, 0.0),
        }
    }

    #[test]
    fn test_movement_scaled_by_status() {
        let mut frame = standard();
        let mut world = TestWorld::new();

        let output = frame.update(0.0, TICK, &walk(1.0), &mut world);
        assert_eq!(output.velocity, Vec3::new(5.0, 0.0, 0.0));

        frame.apply_status(0.0, StatusRequest::slow(0.5, 1.0));
        let output = frame.update(0.25, TICK, &walk(3.0), &mut world);
        assert_eq!(output.move_multiplier, 0.5);
        assert_eq!(output.velocity, Vec3::new(2.5, 0.0, 0.0));

        frame.apply_status(0.25, StatusRequest::root(0.5));
        let output = frame.update(0.5, TICK, &walk(1.0), &mut world);
        assert_eq!(output.velocity, Vec3::ZERO);
        assert_eq!(world.frames, 3);
    }

    #[test]
    fn test_runtime_speed_multiplier() {
        let mut decl = decl();
        decl.traits = CharacterTraits {
            move_speed_multiplier: 1.2,
            ..Default::default()
        };
        let mut frame = updater(&decl, Box::new(StandardRuntime::new(&decl)));
        let mut world = TestWorld::new();

        let output = frame.update(0.0, TICK, &walk(1.0), &mut world);
        assert!((output.velocity.x - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_dot_reaches_health_with_fractional_carry() {
        let mut frame = standard();
        let mut world = TestWorld::new();
        frame.apply_status(0.0, StatusRequest::dot(10.0, 1.0).with_tag("burn"));

        let mut lost = 0.0;
        for i in 1..=4 {
            let output = frame.update(i as f64 * 0.25, TICK, &FrameInput::default(), &mut world);
            lost += output.health_lost;
        }

        assert_eq!(lost, 10.0);
        assert_eq!(world.health.current, 90);
        assert_eq!(frame.stats().health().current, 90.0);
        assert!(frame.status().is_empty());
    }

    #[test]
    fn test_dot_goes_through_before_damage() {
        let mut decl = decl();
        decl.traits.damage_taken_multiplier = 0.5;
        let mut frame = updater(&decl, Box::new(StandardRuntime::new(&decl)));
        let mut world = TestWorld::new();
        frame.apply_status(0.0, StatusRequest::dot(8.0, 1.0));

        let output = frame.update(1.0, 1.0, &FrameInput::default(), &mut world);
        assert_eq!(output.dot_damage, 8.0);
        assert_eq!(output.health_lost, 4.0);
    }

    #[test]
    fn test_ui_snapshot_only_on_change() {
        let mut frame = standard();
        let mut world = TestWorld::new();

        let first = frame.update(0.0, TICK, &FrameInput::default(), &mut world);
        let snapshot = first.ui.expect("first snapshot is always emitted");
        assert_eq!(snapshot.skills.len(), 1);
        assert_eq!(snapshot.skills[0].remaining, 0.0);
        assert_eq!(snapshot.skills[0].duration, 3.0);

        let second = frame.update(0.25, TICK, &FrameInput::default(), &mut world);
        assert!(second.ui.is_none());

        let cast = frame.use_skill("nova", 0.25, Aim::new(Vec3::ZERO, Vec3::Z), &mut world);
        assert_eq!(cast.outcome, SkillUseOutcome::Triggered);

        let third = frame.update(0.5, TICK, &FrameInput::default(), &mut world);
        let snapshot = third.ui.expect("cooldown and mana changed");
        assert_eq!(snapshot.mana.current, 60.0);
        assert_eq!(snapshot.skills[0].remaining, 2.8);
        assert_ne!(snapshot.hash, [0u8; 32]);
    }

    #[test]
    fn test_use_skill_nova_spares_caster() {
        let mut frame = standard();
        let mut world = TestWorld::new();
        let log = HitLog::default();
        world.targets.push(sphere_target(1, Vec3::ZERO, 0.5, &log));
        world.targets.push(sphere_target(2, Vec3::new(1.5, 0.0, 0.0), 0.5, &log));

        let cast = frame.use_skill("nova", 0.0, Aim::new(Vec3::ZERO, Vec3::Z), &mut world);

        assert!(cast.outcome.is_triggered());
        assert_eq!(log.count_for(1), 0);
        assert_eq!(log.damage_to(2), 20.0);

        let again = frame.use_skill("nova", 1.0, Aim::new(Vec3::ZERO, Vec3::Z), &mut world);
        assert_eq!(again.outcome, SkillUseOutcome::OnCooldown { remaining: 2.0 });
    }

    #[test]
    fn test_projectile_grants_reach_owner_stats() {
        let mut frame = standard();
        let mut world = TestWorld::new();
        let log = HitLog::default();
        world.targets.push(sphere_target(5, Vec3::new(0.0, 1.0, 2.0), 0.5, &log));
        frame.stats_mut().spend_energy(50.0);

        let rules = ProjectileRules {
            grant_resource_on_hit: true,
            ..Default::default()
        };
        frame.projectiles_mut().fire(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Z,
            FireArgs::new("bolt").with_owner(PLAYER).with_rules(rules).with_grants(15.0, 0.0),
        );

        let output = frame.update(0.25, TICK, &FrameInput::default(), &mut world);
        assert_eq!(output.projectiles.hits.len(), 1);
        assert_eq!(log.damage_to(5), 10.0);
        assert_eq!(frame.stats().energy().current, 65.0);
    }

    #[test]
    fn test_grants_for_other_owners_are_ignored() {
        let mut frame = standard();
        let mut world = TestWorld::new();
        let log = HitLog::default();
        world.targets.push(sphere_target(5, Vec3::new(0.0, 1.0, 2.0), 0.5, &log));
        frame.stats_mut().spend_energy(50.0);

        let rules = ProjectileRules {
            grant_resource_on_hit: true,
            ..Default::default()
        };
        frame.projectiles_mut().fire(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Z,
            FireArgs::new("bolt").with_owner(TargetId(42)).with_rules(rules).with_grants(15.0, 0.0),
        );

        frame.update(0.25, TICK, &FrameInput::default(), &mut world);
        assert_eq!(frame.stats().energy().current, 50.0);
    }

    fn incoming_bolt(frame: &mut FrameUpdater) {
        frame.projectiles_mut().fire(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Z,
            FireArgs::new("bolt").with_owner(TargetId(99)),
        );
    }

    #[test]
    fn test_player_shield_asks_runtime() {
        let decl = decl();
        let mut frame = updater(&decl, Box::new(Phaser));
        let mut world = TestWorld::new();
        world
            .blockers
            .push(Blocker::new(BlockerId(1), HitVolume::sphere(Vec3::new(0.0, 1.0, 1.5), 0.5)).owned_by(PLAYER));
        incoming_bolt(&mut frame);

        let output = frame.update(0.25, TICK, &FrameInput::default(), &mut world);
        assert!(output.projectiles.removed.is_empty());
        assert_eq!(frame.projectiles().live_count(), 1);
    }

    #[test]
    fn test_foreign_shield_consumes() {
        let mut frame = standard();
        let mut world = TestWorld::new();
        world
            .blockers
            .push(Blocker::new(BlockerId(1), HitVolume::sphere(Vec3::new(0.0, 1.0, 1.5), 0.5)).owned_by(TargetId(7)));
        incoming_bolt(&mut frame);

        let output = frame.update(0.25, TICK, &FrameInput::default(), &mut world);
        assert_eq!(output.projectiles.removed.len(), 1);
        assert_eq!(output.projectiles.removed[0].cause, RemovalCause::BlockerHit);
    }

    #[test]
    fn test_own_shield_never_stops_own_projectiles() {
        let mut frame = standard();
        let mut world = TestWorld::new();
        world
            .blockers
            .push(Blocker::new(BlockerId(1), HitVolume::sphere(Vec3::new(0.0, 1.0, 1.5), 0.5)).owned_by(TargetId(99)));
        incoming_bolt(&mut frame);

        let output = frame.update(0.25, TICK, &FrameInput::default(), &mut world);
        assert!(output.projectiles.removed.is_empty());
    }

    #[test]
    fn test_apply_damage_uses_runtime() {
        let mut decl = decl();
        decl.traits.damage_taken_multiplier = 0.5;
        let mut frame = updater(&decl, Box::new(StandardRuntime::new(&decl)));
        let mut health = Health::new(100);

        assert_eq!(frame.apply_damage(30.0, DamageKind::Direct, &mut health), 15.0);
        assert_eq!(frame.apply_damage(f32::NAN, DamageKind::Direct, &mut health), 0.0);
        assert_eq!(health.current, 85);
        assert_eq!(frame.stats().health().current, 85.0);
    }

    #[test]
    fn test_set_character_replaces_skills() {
        let mut frame = standard();
        let mut world = TestWorld::new();
        frame.use_skill("nova", 0.0, Aim::new(Vec3::ZERO, Vec3::Z), &mut world);

        let other = CharacterDecl {
            id: "other".into(),
            max_mana: 30.0,
            skills: vec![SkillDef::new("dash", ResourceKind::Energy, SkillCost::Fixed(10.0), 1.0)],
            ..Default::default()
        };
        frame.set_character(&other, Box::new(StandardRuntime::new(&other)));

        assert_eq!(frame.character_id(), "other");
        assert!(frame.skills().get("nova").is_none());
        assert!(frame.skills().get("dash").is_some());
        assert_eq!(frame.stats().mana().max, 30.0);
        assert_eq!(frame.stats().mana().current, 30.0);
    }

    #[test]
    fn test_non_finite_time_is_a_no_op() {
        let mut frame = standard();
        let mut world = TestWorld::new();
        let output = frame.update(f64::NAN, TICK, &walk(1.0), &mut world);
        assert!(output.ui.is_none());
        assert_eq!(world.frames, 0);
    }
}
