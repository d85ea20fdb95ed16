//! Ray / sphere / box primitives used by hit testing.

use bevy::prelude::*;

/// Directions shorter than this are treated as degenerate.
pub const MIN_DIRECTION_LENGTH_SQ: f32 = 1e-8;

/// Unit direction, or `None` for zero-length / non-finite input.
pub fn normalize_direction(dir: Vec3) -> Option<Vec3> {
    if !dir.is_finite() {
        return None;
    }
    let len_sq = dir.length_squared();
    if len_sq <= MIN_DIRECTION_LENGTH_SQ {
        return None;
    }
    Some(dir / len_sq.sqrt())
}

#[inline]
pub fn ray_sphere_enter(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    if !(radius >= 0.0) {
        return None;
    }
    let m = origin - center;
    let b = m.dot(dir);
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    if b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    Some((-b - disc.sqrt()).max(0.0))
}

#[inline]
pub fn ray_aabb_enter(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let mut tmin = 0.0f32;
    let mut tmax = f32::INFINITY;
    for i in 0..3 {
        let s = origin[i];
        let d = dir[i];
        if d.abs() < 1e-6 {
            if s < min[i] || s > max[i] {
                return None;
            }
        } else {
            let inv = 1.0 / d;
            let mut t0 = (min[i] - s) * inv;
            let mut t1 = (max[i] - s) * inv;
            if t0 > t1 {
                core::mem::swap(&mut t0, &mut t1);
            }
            tmin = tmin.max(t0);
            tmax = tmax.min(t1);
            if tmin > tmax {
                return None;
            }
        }
    }
    Some(tmin)
}

/// Distance along the ray to first contact with a sphere of
/// `radius + pad`. Used for thick projectiles and sweeps.
#[inline]
pub fn ray_padded_sphere_enter(
    origin: Vec3,
    dir: Vec3,
    center: Vec3,
    radius: f32,
    pad: f32,
) -> Option<f32> {
    ray_sphere_enter(origin, dir, center, radius.max(0.0) + pad.max(0.0))
}

/// Project `point` onto the ray: (along-ray distance, perpendicular distance).
#[inline]
pub fn project_onto_ray(origin: Vec3, dir: Vec3, point: Vec3) -> (f32, f32) {
    let to_point = point - origin;
    let along = to_point.dot(dir);
    let perp = (to_point - dir * along).length();
    (along, perp)
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
