//! Projectiles: type registry, pooled records, world obstacles, simulation.
//!
//! `ProjectileSystem` owns every projectile from `fire` to removal; callers
//! only see `&Projectile` and the per-tick `ProjectileTickReport`.

pub mod record;
pub mod system;
pub mod types;
pub mod world;


pub use record::{
    FireArgs, ForceContext, ForceHook, HitGroupId, PendingAction, Projectile, ProjectileId,
    RemovalCause, RemoveHook, RemovedProjectile,
};
pub use system::{ExplosionRecord, ProjectileHitRecord, ProjectileSystem, ProjectileTickReport};
pub use types::{
    HitResponse, ProjectileHitContext, ProjectileHooks, ProjectileRules, ProjectileSpawnInfo,
    ProjectileTypeDef, ProjectileTypeRegistry, ResolvedProjectileType, VisualHandle,
    DEFAULT_PROJECTILE_TYPE,
};
pub use world::{BlockHit, Blocker, BlockerId, WorldCollider};
