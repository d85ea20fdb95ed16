//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use bevy::prelude::*;

use crate::combat::{AttackHit, AttackTarget, CombatCommands, HitVolume, TargetId};

/// Shared record of every hit delivered to the dummies that hold it.
#[derive(Clone, Default)]
pub(crate) struct HitLog(Arc<Mutex<Vec<AttackHit>>>);

impl HitLog {
    pub fn hits(&self) -> Vec<AttackHit> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_for(&self, id: u64) -> usize {
        self.hits().iter().filter(|h| h.target == TargetId(id)).count()
    }

    pub fn damage_to(&self, id: u64) -> f32 {
        self.hits()
            .iter()
            .filter(|h| h.target == TargetId(id))
            .map(|h| h.damage)
            .sum()
    }

    fn push(&self, hit: AttackHit) {
        self.0.lock().unwrap().push(hit);
    }
}

type HitReaction = Box<dyn FnMut(&AttackHit, &mut CombatCommands) + Send + Sync>;

pub(crate) struct DummyTarget {
    pub id: TargetId,
    pub volume: HitVolume,
    pub active: bool,
    pub log: HitLog,
    pub reaction: Option<HitReaction>,
}

impl AttackTarget for DummyTarget {
    fn id(&self) -> TargetId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn volume(&self) -> HitVolume {
        self.volume
    }

    fn on_hit(&mut self, hit: &AttackHit, commands: &mut CombatCommands) {
        self.log.push(hit.clone());
        if let Some(reaction) = self.reaction.as_mut() {
            reaction(hit, commands);
        }
    }
}

pub(crate) fn sphere_target(id: u64, center: Vec3, radius: f32, log: &HitLog) -> Box<dyn AttackTarget> {
    Box::new(DummyTarget {
        id: TargetId(id),
        volume: HitVolume::sphere(center, radius),
        active: true,
        log: log.clone(),
        reaction: None,
    })
}

pub(crate) fn inactive_target(id: u64, center: Vec3, radius: f32, log: &HitLog) -> Box<dyn AttackTarget> {
    Box::new(DummyTarget {
        id: TargetId(id),
        volume: HitVolume::sphere(center, radius),
        active: false,
        log: log.clone(),
        reaction: None,
    })
}

pub(crate) fn reacting_target(
    id: u64,
    center: Vec3,
    radius: f32,
    log: &HitLog,
    reaction: impl FnMut(&AttackHit, &mut CombatCommands) + Send + Sync + 'static,
) -> Box<dyn AttackTarget> {
    Box::new(DummyTarget {
        id: TargetId(id),
        volume: HitVolume::sphere(center, radius),
        active: true,
        log: log.clone(),
        reaction: Some(Box::new(reaction)),
    })
}
