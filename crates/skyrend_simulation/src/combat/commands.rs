//! Deferred follow-up work queued by hit and lifecycle callbacks.
//!
//! Callbacks run while the projectile pool and the target list are
//! borrowed, so they cannot call back into the core directly. They push a
//! `CombatCommand` instead; the owner drains the queue once the current
//! resolution finished.

use bevy::prelude::*;

use super::resolver::ExplosionParams;
use super::target::TargetId;
use crate::projectile::{FireArgs, ProjectileId};
use crate::stats::ResourceKind;

/// Resource gain routed to the owner's stats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceGrant {
    pub owner: Option<TargetId>,
    pub kind: ResourceKind,
    pub amount: f32,
}

pub enum CombatCommand {
    /// Spawn a projectile; it starts simulating on the next tick.
    Fire {
        origin: Vec3,
        direction: Vec3,
        args: FireArgs,
    },
    /// Splash damage at `center`
    Explode {
        center: Vec3,
        explosion: ExplosionParams,
        attacker: Option<TargetId>,
        exclude: Option<TargetId>,
    },
    /// Forced removal of a live projectile
    RemoveProjectile(ProjectileId),
    GrantResource(ResourceGrant),
}

impl std::fmt::Debug for CombatCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombatCommand::Fire {
                origin,
                direction,
                args,
            } => f
                .debug_struct("Fire")
                .field("origin", origin)
                .field("direction", direction)
                .field("type_id", &args.type_id)
                .finish(),
            CombatCommand::Explode {
                center,
                explosion,
                attacker,
                exclude,
            } => f
                .debug_struct("Explode")
                .field("center", center)
                .field("explosion", explosion)
                .field("attacker", attacker)
                .field("exclude", exclude)
                .finish(),
            CombatCommand::RemoveProjectile(id) => f.debug_tuple("RemoveProjectile").field(id).finish(),
            CombatCommand::GrantResource(grant) => f.debug_tuple("GrantResource").field(grant).finish(),
        }
    }
}

/// FIFO command queue.
#[derive(Debug, Default)]
pub struct CombatCommands {
    queue: Vec<CombatCommand>,
}

impl CombatCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: CombatCommand) {
        self.queue.push(command);
    }

    pub fn fire(&mut self, origin: Vec3, direction: Vec3, args: FireArgs) {
        self.push(CombatCommand::Fire {
            origin,
            direction,
            args,
        });
    }

    pub fn explode(
        &mut self,
        center: Vec3,
        explosion: ExplosionParams,
        attacker: Option<TargetId>,
        exclude: Option<TargetId>,
    ) {
        self.push(CombatCommand::Explode {
            center,
            explosion,
            attacker,
            exclude,
        });
    }

    pub fn remove_projectile(&mut self, id: ProjectileId) {
        self.push(CombatCommand::RemoveProjectile(id));
    }

    pub fn grant(&mut self, owner: Option<TargetId>, kind: ResourceKind, amount: f32) {
        if amount > 0.0 {
            self.push(CombatCommand::GrantResource(ResourceGrant {
                owner,
                kind,
                amount,
            }));
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take everything queued so far, leaving the queue empty.
    pub fn take(&mut self) -> Vec<CombatCommand> {
        std::mem::take(&mut self.queue)
    }
}
