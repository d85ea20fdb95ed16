//! Базовые ресурсы актора: Health, ResourcePool

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// External health pool the stats layer mirrors.
///
/// The world owns health (death handling, respawn); the combat core only
/// reads it for the HUD and routes damage-over-time into it.
pub trait HealthPool {
    fn current(&self) -> f32;
    fn max(&self) -> f32;

    /// Apply damage, returns the amount actually removed.
    fn take_damage(&mut self, amount: f32) -> f32;
}

/// Здоровье актора
///
/// Инвариант: 0 ≤ current ≤ max
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub fn heal(&mut self, amount: u32) {
        self.current = self.current.saturating_add(amount).min(self.max);
    }
}

impl HealthPool for Health {
    fn current(&self) -> f32 {
        self.current as f32
    }

    fn max(&self) -> f32 {
        self.max as f32
    }

    fn take_damage(&mut self, amount: f32) -> f32 {
        if !(amount > 0.0) {
            return 0.0;
        }
        let amount = amount.round().min(u32::MAX as f32) as u32;
        let before = self.current;
        self.current = self.current.saturating_sub(amount);
        (before - self.current) as f32
    }
}

/// Mana / energy pool.
///
/// Инвариант: 0.0 ≤ current ≤ max. Every mutator clamps and returns the
/// delta it actually applied, never the requested amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub current: f32,
    pub max: f32,
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl ResourcePool {
    pub fn new(max: f32) -> Self {
        let max = sanitize(max);
        Self { current: max, max }
    }

    pub fn empty(max: f32) -> Self {
        Self {
            current: 0.0,
            max: sanitize(max),
        }
    }

    pub fn can_afford(&self, cost: f32) -> bool {
        self.current >= sanitize(cost)
    }

    pub fn is_empty(&self) -> bool {
        self.current <= 0.0
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Add up to `amount`, returns the gain actually applied.
    pub fn apply(&mut self, amount: f32) -> f32 {
        let amount = sanitize(amount);
        let before = self.current;
        self.current = (self.current + amount).min(self.max);
        self.current - before
    }

    /// Remove up to `amount`, returns the amount actually spent.
    pub fn spend(&mut self, amount: f32) -> f32 {
        let amount = sanitize(amount);
        let before = self.current;
        self.current = (self.current - amount).max(0.0);
        before - self.current
    }

    /// Empty the pool, returns what was drained.
    pub fn drain(&mut self) -> f32 {
        let drained = self.current;
        self.current = 0.0;
        drained
    }

    pub fn fill(&mut self) {
        self.current = self.max;
    }

    /// Change the maximum, keeping `current` inside the new bounds.
    pub fn set_max(&mut self, max: f32) {
        self.max = sanitize(max);
        self.current = self.current.clamp(0.0, self.max);
    }

    pub fn regenerate(&mut self, rate_per_sec: f32, delta_time: f32) -> f32 {
        self.apply(rate_per_sec * delta_time)
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            self.current / self.max
        }
    }
}

/// NaN / negative / infinite amounts collapse to a no-op.
fn sanitize(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage() {
        let mut health = Health::new(100);

        assert_eq!(health.take_damage(30.0), 30.0);
        assert_eq!(health.current, 70);
        assert!(health.is_alive());

        assert_eq!(health.take_damage(100.0), 70.0); // Saturating sub
        assert_eq!(health.current, 0);
        assert!(!health.is_alive());
    }

    #[test]
    fn test_health_ignores_nan_and_negative() {
        let mut health = Health::new(50);
        assert_eq!(health.take_damage(f32::NAN), 0.0);
        assert_eq!(health.take_damage(-5.0), 0.0);
        assert_eq!(health.current, 50);
    }

    #[test]
    fn test_health_heal() {
        let mut health = Health::new(100);
        health.take_damage(50.0);
        health.heal(30);
        assert_eq!(health.current, 80);

        health.heal(100); // Clamped to max
        assert_eq!(health.current, 100);
    }

    #[test]
    fn test_pool_apply_clamps_to_max() {
        let mut pool = ResourcePool::empty(100.0);
        assert_eq!(pool.apply(1.0e9), 100.0);
        assert_eq!(pool.current, 100.0);
        assert_eq!(pool.apply(10.0), 0.0);
    }

    #[test]
    fn test_pool_spend_reports_actual_delta() {
        let mut pool = ResourcePool::new(100.0);
        pool.spend(90.0);
        assert_eq!(pool.spend(30.0), 10.0);
        assert_eq!(pool.current, 0.0);
        assert_eq!(pool.spend(5.0), 0.0);
    }

    #[test]
    fn test_pool_set_max_clamps_current() {
        let mut pool = ResourcePool::new(100.0);
        pool.set_max(40.0);
        assert_eq!(pool.current, 40.0);
        pool.set_max(-3.0);
        assert_eq!(pool.max, 0.0);
        assert_eq!(pool.current, 0.0);
    }

    #[test]
    fn test_pool_regenerate() {
        let mut pool = ResourcePool::new(100.0);
        pool.spend(50.0);
        pool.regenerate(10.0, 2.0); // 2 sec × 10 units/sec = +20
        assert_eq!(pool.current, 70.0);
        pool.regenerate(10.0, 10.0); // Clamp to max
        assert_eq!(pool.current, 100.0);
    }
}
