//! Bevy glue: runs `FrameUpdater` in `FixedUpdate` against `CombatScene`.

use bevy::prelude::*;

use super::{CombatView, CombatWorld, FrameInput, FrameOutput, FrameUpdater, UiSnapshot};
use crate::combat::AttackTarget;
use crate::components::Health;
use crate::projectile::{Blocker, RemovedProjectile};
use crate::skill::{Aim, SkillUseOutcome};

/// The player's combat core. Inserted by the game once a character is chosen.
#[derive(Resource)]
pub struct CombatFrame {
    pub updater: FrameUpdater,
}

impl CombatFrame {
    pub fn new(updater: FrameUpdater) -> Self {
        Self { updater }
    }
}

/// World side of the combat tick: attackable targets, dynamic blockers and
/// the player's health pool.
#[derive(Resource, Default)]
pub struct CombatScene {
    pub targets: Vec<Box<dyn AttackTarget>>,
    pub blockers: Vec<Blocker>,
    pub player_health: Health,
    /// Written by input, read once per tick
    pub move_intent: Vec3,
    /// Velocity produced by the last tick (movement is applied by the host)
    pub velocity: Vec3,
}

impl CombatWorld for CombatScene {
    fn view(&mut self) -> CombatView<'_> {
        CombatView {
            targets: &mut self.targets,
            blockers: &self.blockers,
            health: &mut self.player_health,
        }
    }

    fn after_frame(&mut self, _now: f64, output: &FrameOutput) {
        self.velocity = output.velocity;
    }
}

/// Skill activation request (input layer → combat core)
#[derive(Event, Debug, Clone)]
pub struct UseSkillRequest {
    pub key: String,
    pub aim: Aim,
}

#[derive(Event, Debug, Clone)]
pub struct SkillUsed {
    pub key: String,
    pub outcome: SkillUseOutcome,
}

/// HUD state changed since the last emitted snapshot
#[derive(Event, Debug, Clone)]
pub struct UiSnapshotChanged(pub UiSnapshot);

#[derive(Event, Debug, Clone)]
pub struct ProjectileRemovedEvent(pub RemovedProjectile);

/// Combat tick: pending skill requests first, then one `FrameUpdater::update`.
pub fn advance_combat_frame(
    time: Res<Time<Fixed>>,
    frame: ResMut<CombatFrame>,
    scene: ResMut<CombatScene>,
    mut requests: EventReader<UseSkillRequest>,
    mut skill_events: EventWriter<SkillUsed>,
    mut ui_events: EventWriter<UiSnapshotChanged>,
    mut removed_events: EventWriter<ProjectileRemovedEvent>,
) {
    let now = time.elapsed_secs_f64();
    let delta = time.delta_secs();
    let updater = &mut frame.into_inner().updater;
    let scene = scene.into_inner();

    for request in requests.read() {
        let cast = updater.use_skill(&request.key, now, request.aim, &mut *scene);
        for removed in cast.report.removed {
            removed_events.write(ProjectileRemovedEvent(removed));
        }
        skill_events.write(SkillUsed {
            key: request.key.clone(),
            outcome: cast.outcome,
        });
    }

    let input = FrameInput {
        move_intent: scene.move_intent,
    };
    let output = updater.update(now, delta, &input, &mut *scene);
    for removed in output.projectiles.removed {
        removed_events.write(ProjectileRemovedEvent(removed));
    }
    if let Some(snapshot) = output.ui {
        ui_events.write(UiSnapshotChanged(snapshot));
    }
}

/// Events + the fixed-step combat system. Runs only while both `CombatFrame`
/// and `CombatScene` exist.
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<UseSkillRequest>()
            .add_event::<SkillUsed>()
            .add_event::<UiSnapshotChanged>()
            .add_event::<ProjectileRemovedEvent>()
            .add_systems(
                FixedUpdate,
                advance_combat_frame
                    .run_if(resource_exists::<CombatFrame>)
                    .run_if(resource_exists::<CombatScene>),
            );
    }
}
