#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bevy::prelude::*;

    use crate::character::{CharacterRuntime, StandardRuntime};
    use crate::combat::{AttackTarget, CombatCommands, TargetId};
    use crate::config::CombatConfig;
    use crate::projectile::{ProjectileSystem, ProjectileTypeDef, ProjectileTypeRegistry};
    use crate::skill::*;
    use crate::stats::{CharacterDecl, ResourceKind, SkillCost, StatsState};
    use crate::test_support::{sphere_target, HitLog};

    /// Runtime with a scripted modifier and trigger result.
    struct Scripted {
        modifier: SkillUseModifier,
        triggers: bool,
        handled: usize,
        own_cooldown: Option<f32>,
    }

    impl Scripted {
        fn new(modifier: SkillUseModifier, triggers: bool) -> Self {
            Self {
                modifier,
                triggers,
                handled: 0,
                own_cooldown: None,
            }
        }
    }

    impl CharacterRuntime for Scripted {
        fn character_id(&self) -> &str {
            "scripted"
        }

        fn before_skill_use(&mut self, _skill: &SkillDef, _now: f64) -> SkillUseModifier {
            self.modifier
        }

        fn handle_skill(&mut self, _skill: &SkillDef, _now: f64, _invocation: &mut SkillInvocation) -> bool {
            self.handled += 1;
            self.triggers
        }

        fn skill_cooldown_remaining(&self, _key: &str, _now: f64) -> Option<f32> {
            self.own_cooldown
        }

        fn manages_own_cooldown(&self, _key: &str) -> bool {
            self.own_cooldown.is_some()
        }
    }

    struct Fixture {
        stats: StatsState,
        skills: SkillState,
        projectiles: ProjectileSystem,
        targets: Vec<Box<dyn AttackTarget>>,
        commands: CombatCommands,
    }

    impl Fixture {
        fn new(skills: Vec<SkillDef>) -> Self {
            let decl = CharacterDecl {
                id: "tester".into(),
                max_mana: 100.0,
                max_energy: 50.0,
                skills: skills.clone(),
                ..Default::default()
            };
            let mut registry = ProjectileTypeRegistry::new();
            let mut bolt = ProjectileTypeDef::new("bolt");
            bolt.speed = 10.0;
            registry.register(bolt).unwrap();
            Self {
                stats: StatsState::new(&decl),
                skills: SkillState::new(&skills),
                projectiles: ProjectileSystem::new(&CombatConfig::default(), Arc::new(registry)),
                targets: Vec::new(),
                commands: CombatCommands::new(),
            }
        }

        fn use_skill(&mut self, key: &str, now: f64, runtime: &mut dyn CharacterRuntime) -> SkillUseOutcome {
            let mut invocation = SkillInvocation {
                caster: TargetId(1),
                aim: Aim::new(Vec3::ZERO, Vec3::Z),
                targets: &mut self.targets,
                projectiles: &mut self.projectiles,
                commands: &mut self.commands,
            };
            self.skills
                .try_use_skill(key, now, &mut self.stats, runtime, &mut invocation)
        }
    }

    fn fireball() -> SkillDef {
        SkillDef::new("fireball", ResourceKind::Mana, SkillCost::Fixed(30.0), 2.0)
    }

    #[test]
    fn test_not_triggered_charges_nothing() {
        let mut fx = Fixture::new(vec![fireball()]);
        let mut runtime = Scripted::new(SkillUseModifier::default(), false);

        let outcome = fx.use_skill("fireball", 0.0, &mut runtime);

        assert_eq!(outcome, SkillUseOutcome::NotTriggered);
        assert_eq!(runtime.handled, 1);
        assert_eq!(fx.stats.mana().current, 100.0);
        assert_eq!(fx.stats.cooldown_remaining("fireball", 0.0, &runtime), 0.0);
    }

    #[test]
    fn test_trigger_commits_cost_and_cooldown() {
        let mut fx = Fixture::new(vec![fireball()]);
        let mut runtime = Scripted::new(SkillUseModifier::default(), true);

        assert_eq!(fx.use_skill("fireball", 0.0, &mut runtime), SkillUseOutcome::Triggered);
        assert_eq!(fx.stats.mana().current, 70.0);

        let outcome = fx.use_skill("fireball", 1.0, &mut runtime);
        assert_eq!(outcome, SkillUseOutcome::OnCooldown { remaining: 1.0 });
        assert_eq!(runtime.handled, 1);

        assert_eq!(fx.use_skill("fireball", 2.0, &mut runtime), SkillUseOutcome::Triggered);
        assert_eq!(fx.stats.mana().current, 40.0);
    }

    #[test]
    fn test_insufficient_resource_skips_handler() {
        let mut fx = Fixture::new(vec![SkillDef::new("nuke", ResourceKind::Energy, SkillCost::Fixed(80.0), 0.0)]);
        let mut runtime = Scripted::new(SkillUseModifier::default(), true);

        let outcome = fx.use_skill("nuke", 0.0, &mut runtime);
        assert_eq!(
            outcome,
            SkillUseOutcome::InsufficientResource {
                kind: ResourceKind::Energy
            }
        );
        assert_eq!(runtime.handled, 0);
    }

    #[test]
    fn test_ignore_cooldown_keeps_cost() {
        let mut fx = Fixture::new(vec![fireball()]);
        let mut runtime = Scripted::new(SkillUseModifier::default(), true);
        fx.use_skill("fireball", 0.0, &mut runtime);

        runtime.modifier = SkillUseModifier {
            ignore_cooldown: true,
            ..Default::default()
        };
        assert_eq!(fx.use_skill("fireball", 0.5, &mut runtime), SkillUseOutcome::Triggered);
        assert_eq!(fx.stats.mana().current, 40.0);
        // Waived cooldown is not restarted
        assert!((fx.stats.cooldown_remaining("fireball", 0.5, &runtime) - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_ignore_cost_and_cooldown_waives_both() {
        let mut fx = Fixture::new(vec![SkillDef::new("nuke", ResourceKind::Energy, SkillCost::Fixed(80.0), 5.0)]);
        let mut runtime = Scripted::new(SkillUseModifier::free(), true);

        assert_eq!(fx.use_skill("nuke", 0.0, &mut runtime), SkillUseOutcome::Triggered);
        assert_eq!(fx.use_skill("nuke", 0.1, &mut runtime), SkillUseOutcome::Triggered);
        assert_eq!(fx.stats.energy().current, 50.0);
        assert_eq!(fx.stats.cooldown_remaining("nuke", 0.1, &runtime), 0.0);
    }

    #[test]
    fn test_veto_beats_waivers() {
        let mut fx = Fixture::new(vec![fireball()]);
        let mut runtime = Scripted::new(
            SkillUseModifier {
                allow: false,
                ignore_cooldown: true,
                ignore_resource: true,
                ignore_cost_and_cooldown: true,
            },
            true,
        );

        assert_eq!(fx.use_skill("fireball", 0.0, &mut runtime), SkillUseOutcome::Vetoed);
        assert_eq!(runtime.handled, 0);
        assert_eq!(fx.stats.mana().current, 100.0);
    }

    #[test]
    fn test_self_managed_cooldown() {
        let mut fx = Fixture::new(vec![fireball()]);
        let mut runtime = Scripted::new(SkillUseModifier::default(), true);
        runtime.own_cooldown = Some(0.0);

        assert_eq!(fx.use_skill("fireball", 0.0, &mut runtime), SkillUseOutcome::Triggered);
        // Timer never started: the runtime answers for the cooldown
        assert_eq!(fx.use_skill("fireball", 0.1, &mut runtime), SkillUseOutcome::Triggered);

        runtime.own_cooldown = Some(3.0);
        assert_eq!(
            fx.use_skill("fireball", 0.2, &mut runtime),
            SkillUseOutcome::OnCooldown { remaining: 3.0 }
        );
    }

    #[test]
    fn test_unknown_skill() {
        let mut fx = Fixture::new(vec![fireball()]);
        let mut runtime = StandardRuntime::default();
        assert_eq!(fx.use_skill("nope", 0.0, &mut runtime), SkillUseOutcome::UnknownSkill);
    }

    #[test]
    fn test_cost_all_drains_pool() {
        let mut fx = Fixture::new(vec![SkillDef::new("overload", ResourceKind::Energy, SkillCost::All, 0.0)]);
        let mut runtime = Scripted::new(SkillUseModifier::default(), true);

        assert_eq!(fx.use_skill("overload", 0.0, &mut runtime), SkillUseOutcome::Triggered);
        assert_eq!(fx.stats.energy().current, 0.0);
        assert_eq!(
            fx.use_skill("overload", 0.1, &mut runtime),
            SkillUseOutcome::InsufficientResource {
                kind: ResourceKind::Energy
            }
        );
    }

    #[test]
    fn test_standard_projectile_skill_fires() {
        let skill = fireball().with_action(SkillAction::Projectile {
            type_id: "bolt".into(),
        });
        let mut fx = Fixture::new(vec![skill]);
        let mut runtime = StandardRuntime::default();

        assert_eq!(fx.use_skill("fireball", 0.0, &mut runtime), SkillUseOutcome::Triggered);
        assert_eq!(fx.projectiles.live_count(), 1);
        let projectile = fx.projectiles.iter().next().unwrap();
        assert_eq!(projectile.owner, Some(TargetId(1)));
        assert_eq!(projectile.velocity, Vec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn test_standard_action_none_does_not_trigger() {
        let mut fx = Fixture::new(vec![fireball()]);
        let mut runtime = StandardRuntime::default();

        assert_eq!(fx.use_skill("fireball", 0.0, &mut runtime), SkillUseOutcome::NotTriggered);
        assert_eq!(fx.stats.mana().current, 100.0);
    }

    #[test]
    fn test_standard_melee_skill_hits() {
        let skill = SkillDef::new("slash", ResourceKind::Energy, SkillCost::Fixed(10.0), 0.5).with_action(
            SkillAction::Melee {
                damage: 20.0,
                range: 5.0,
                hit_radius: 0.5,
                max_hits: 1,
            },
        );
        let mut fx = Fixture::new(vec![skill]);
        let log = HitLog::default();
        fx.targets.push(sphere_target(7, Vec3::new(0.0, 0.0, 3.0), 0.5, &log));
        let mut runtime = StandardRuntime::default();

        assert_eq!(fx.use_skill("slash", 0.0, &mut runtime), SkillUseOutcome::Triggered);
        assert_eq!(log.count_for(7), 1);
        assert_eq!(log.damage_to(7), 20.0);
        assert_eq!(fx.stats.energy().current, 40.0);
    }
}
