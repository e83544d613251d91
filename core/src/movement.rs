//! Guy locomotion: straight seek, circular arc paths, and boids-style
//! separation layered on top of either.

use crate::{rng::SubsystemRng, types::Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementModel {
    /// Head straight for the destination.
    StraightSeek,
    /// Follow a randomized circular arc to the destination.
    Arc,
}

/// A circular arc from `start` to `end`, walked by arc length.
/// Curvature close to zero degenerates into a straight segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArcPath {
    pub start:       Vec2,
    pub end:         Vec2,
    center:          Vec2,
    radius:          f32,
    start_angle:     f32,
    sweep:           f32,
    length:          f32,
    pub travelled:   f32,
}

const STRAIGHT_EPSILON: f32 = 1e-3;

impl ArcPath {
    /// `bend` is the sagitta as a signed fraction of the chord length;
    /// |bend| must stay below 0.5 so the path is the minor arc.
    pub fn new(start: Vec2, end: Vec2, bend: f32) -> Self {
        let chord = end - start;
        let c = chord.length();
        let bend = bend.clamp(-0.45, 0.45);
        let h = bend.abs() * c;
        if c < STRAIGHT_EPSILON || h < STRAIGHT_EPSILON {
            return Self::straight(start, end);
        }
        let half = c * 0.5;
        let radius = (h * h + half * half) / (2.0 * h);
        let normal = Vec2::new(-chord.y, chord.x) / c * bend.signum();
        let mid = start + chord * 0.5;
        let center = mid + normal * (h - radius);
        let a0 = (start - center).y.atan2((start - center).x);
        let a1 = (end - center).y.atan2((end - center).x);
        let sweep = wrap_angle(a1 - a0);
        Self {
            start,
            end,
            center,
            radius,
            start_angle: a0,
            sweep,
            length: radius * sweep.abs(),
            travelled: 0.0,
        }
    }

    pub fn straight(start: Vec2, end: Vec2) -> Self {
        Self {
            start,
            end,
            center: start,
            radius: 0.0,
            start_angle: 0.0,
            sweep: 0.0,
            length: start.distance(end),
            travelled: 0.0,
        }
    }

    /// Random side and curvature within `[min_bend, max_bend]`.
    pub fn randomized(start: Vec2, end: Vec2, min_bend: f32, max_bend: f32, rng: &mut SubsystemRng) -> Self {
        let bend = rng.range_f32(min_bend, max_bend) * rng.sign();
        Self::new(start, end, bend)
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn is_straight(&self) -> bool {
        self.radius == 0.0
    }

    pub fn point_at(&self, s: f32) -> Vec2 {
        if self.length <= STRAIGHT_EPSILON {
            return self.end;
        }
        let t = (s / self.length).clamp(0.0, 1.0);
        if self.is_straight() {
            return self.start.lerp(self.end, t);
        }
        let a = self.start_angle + self.sweep * t;
        self.center + Vec2::new(a.cos(), a.sin()) * self.radius
    }

    pub fn finished(&self) -> bool {
        self.travelled >= self.length
    }

    /// Advance by `distance` along the arc and return the velocity needed to
    /// get from `from` to the new point within `dt`.
    pub fn advance(&mut self, from: Vec2, distance: f32, dt: f32) -> Vec2 {
        self.travelled = (self.travelled + distance).min(self.length);
        let next = self.point_at(self.travelled);
        if dt <= 0.0 {
            return Vec2::ZERO;
        }
        (next - from) / dt
    }
}

fn wrap_angle(a: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let mut a = a % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Velocity straight toward `to` at `speed`, slowing so it never overshoots
/// within one frame.
pub fn seek(from: Vec2, to: Vec2, speed: f32, dt: f32) -> Vec2 {
    let delta = to - from;
    let dist = delta.length();
    if dist < STRAIGHT_EPSILON {
        return Vec2::ZERO;
    }
    let max_step = if dt > 0.0 { dist / dt } else { speed };
    delta / dist * speed.min(max_step)
}

/// Inverse-distance-weighted repulsion from every neighbour within
/// `radius`. Coincident neighbours are ignored.
pub fn separation(me: Vec2, neighbours: impl IntoIterator<Item = Vec2>, radius: f32, strength: f32) -> Vec2 {
    let mut force = Vec2::ZERO;
    for other in neighbours {
        let away = me - other;
        let d = away.length();
        if d < STRAIGHT_EPSILON || d > radius {
            continue;
        }
        force += away / d * (strength / d.max(1.0)) * (1.0 - d / radius);
    }
    force
}
