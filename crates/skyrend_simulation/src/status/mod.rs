//! StatusEffectState: slows, roots and damage-over-time of one entity.
//!
//! Same type + same tag refreshes the existing entry in place (longest end
//! time, most severe magnitude). Untagged effects never merge.

use serde::{Deserialize, Serialize};

use crate::character::CharacterRuntime;
use crate::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusEffectType {
    Slow,
    Root,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusEffectId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEffect {
    pub id: StatusEffectId,
    pub kind: StatusEffectType,
    /// Source tag (aura id, skill key); `None` = independent entry
    pub tag: Option<String>,
    pub applied_at: f64,
    pub ends_at: f64,
    /// [0, 1]; 1.0 for non-slow effects
    pub move_speed_multiplier: f32,
    pub dot_damage_per_second: f32,
}

impl StatusEffect {
    pub fn is_active(&self, now: f64) -> bool {
        self.ends_at > now
    }

    pub fn remaining(&self, now: f64) -> f32 {
        (self.ends_at - now).max(0.0) as f32
    }
}

/// Application request, before immunity / modifier are consulted.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRequest {
    pub kind: StatusEffectType,
    pub tag: Option<String>,
    /// seconds
    pub duration: f32,
    pub move_speed_multiplier: f32,
    pub dot_damage_per_second: f32,
}

impl StatusRequest {
    pub fn slow(multiplier: f32, duration: f32) -> Self {
        Self {
            kind: StatusEffectType::Slow,
            tag: None,
            duration,
            move_speed_multiplier: multiplier,
            dot_damage_per_second: 0.0,
        }
    }

    pub fn root(duration: f32) -> Self {
        Self {
            kind: StatusEffectType::Root,
            tag: None,
            duration,
            move_speed_multiplier: 0.0,
            dot_damage_per_second: 0.0,
        }
    }

    pub fn dot(damage_per_second: f32, duration: f32) -> Self {
        Self {
            kind: StatusEffectType::Dot,
            tag: None,
            duration,
            move_speed_multiplier: 1.0,
            dot_damage_per_second: damage_per_second,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Character override consulted before applying a status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusApplyModifier {
    pub allow: bool,
    pub duration_scale: f32,
    pub move_speed_multiplier: Option<f32>,
    pub dot_damage_per_second: Option<f32>,
}

impl Default for StatusApplyModifier {
    fn default() -> Self {
        Self {
            allow: true,
            duration_scale: 1.0,
            move_speed_multiplier: None,
            dot_damage_per_second: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusApplyOutcome {
    Applied(StatusEffectId),
    /// Merged into an existing type+tag entry
    Refreshed(StatusEffectId),
    Immune,
    Vetoed,
    /// Zero/invalid duration or magnitude
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct StatusEffectState {
    effects: Vec<StatusEffect>,
    next_id: u64,
}

impl StatusEffectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        now: f64,
        request: StatusRequest,
        runtime: &mut dyn CharacterRuntime,
    ) -> StatusApplyOutcome {
        if runtime.is_immune_to_status(request.kind) {
            return StatusApplyOutcome::Immune;
        }
        let modifier = runtime.before_status_apply(&request);
        if !modifier.allow {
            return StatusApplyOutcome::Vetoed;
        }

        let scale = if modifier.duration_scale.is_finite() {
            modifier.duration_scale.max(0.0)
        } else {
            1.0
        };
        let duration = request.duration * scale;
        if !(duration > 0.0) || !duration.is_finite() || !now.is_finite() {
            return StatusApplyOutcome::Ignored;
        }

        let (multiplier, dps) = match request.kind {
            StatusEffectType::Slow => {
                let m = modifier.move_speed_multiplier.unwrap_or(request.move_speed_multiplier);
                if m.is_nan() {
                    return StatusApplyOutcome::Ignored;
                }
                (m.clamp(0.0, 1.0), 0.0)
            }
            StatusEffectType::Root => (0.0, 0.0),
            StatusEffectType::Dot => {
                let d = modifier.dot_damage_per_second.unwrap_or(request.dot_damage_per_second);
                if !(d > 0.0) || !d.is_finite() {
                    return StatusApplyOutcome::Ignored;
                }
                (1.0, d)
            }
        };
        let ends_at = now + duration as f64;

        if request.tag.is_some() {
            let existing = self
                .effects
                .iter_mut()
                .find(|e| e.kind == request.kind && e.tag == request.tag);
            if let Some(effect) = existing {
                if effect.is_active(now) {
                    effect.ends_at = effect.ends_at.max(ends_at);
                    effect.move_speed_multiplier = effect.move_speed_multiplier.min(multiplier);
                    effect.dot_damage_per_second = effect.dot_damage_per_second.max(dps);
                } else {
                    // Истёкший, но ещё не вычищенный: перезаписываем
                    effect.applied_at = now;
                    effect.ends_at = ends_at;
                    effect.move_speed_multiplier = multiplier;
                    effect.dot_damage_per_second = dps;
                }
                return StatusApplyOutcome::Refreshed(effect.id);
            }
        }

        let id = StatusEffectId(self.next_id);
        self.next_id += 1;
        logger::log(&format!(
            "🌀 Status {:?} [{}] applied for {:.2}s",
            request.kind,
            request.tag.as_deref().unwrap_or("-"),
            duration
        ));
        self.effects.push(StatusEffect {
            id,
            kind: request.kind,
            tag: request.tag,
            applied_at: now,
            ends_at,
            move_speed_multiplier: multiplier,
            dot_damage_per_second: dps,
        });
        StatusApplyOutcome::Applied(id)
    }

    /// Dot damage accrued over `[now - delta, now]`, then expired entries
    /// are pruned.
    pub fn update(&mut self, now: f64, delta: f32) -> f32 {
        let mut damage = 0.0f64;
        if delta > 0.0 && delta.is_finite() {
            let slice_start = now - delta as f64;
            for effect in self.effects.iter().filter(|e| e.kind == StatusEffectType::Dot) {
                let from = slice_start.max(effect.applied_at);
                let to = now.min(effect.ends_at);
                if to > from {
                    damage += effect.dot_damage_per_second as f64 * (to - from);
                }
            }
        }
        self.effects.retain(|e| e.is_active(now));
        damage as f32
    }

    /// 0 under any active root, else the strongest active slow, in [0, 1].
    pub fn movement_speed_multiplier(&self, now: f64) -> f32 {
        let mut multiplier = 1.0f32;
        for effect in self.active(now) {
            match effect.kind {
                StatusEffectType::Root => return 0.0,
                StatusEffectType::Slow => multiplier = multiplier.min(effect.move_speed_multiplier),
                StatusEffectType::Dot => {}
            }
        }
        multiplier.clamp(0.0, 1.0)
    }

    pub fn is_rooted(&self, now: f64) -> bool {
        self.active(now).any(|e| e.kind == StatusEffectType::Root)
    }

    pub fn active(&self, now: f64) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter().filter(move |e| e.is_active(now))
    }

    /// Remove every effect carrying `tag`; returns how many were removed.
    pub fn clear_tag(&mut self, tag: &str) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| e.tag.as_deref() != Some(tag));
        before - self.effects.len()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
