//! Axis-aligned box geometry for the physics-style games
//!
//! Only the primitive overlap tests live here; each engine resolves its own
//! contacts (what bounces, what is destroyed, who loses a life).

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle stored as center + half extents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub center: Vec2,
    pub half: Vec2,
}

impl Rect {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Self {
            center,
            half: size * 0.5,
        }
    }

    pub fn size(&self) -> Vec2 {
        self.half * 2.0
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.center.y - self.half.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.center.y + self.half.y
    }

    /// Strict overlap (touching edges do not count)
    pub fn overlaps(&self, other: &Rect) -> bool {
        let d = (self.center - other.center).abs();
        let reach = self.half + other.half;
        d.x < reach.x && d.y < reach.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        let d = (p - self.center).abs();
        d.x <= self.half.x && d.y <= self.half.y
    }

    /// Keep the rectangle fully inside `[0, width] x [0, height]` on the given axes
    pub fn clamp_into(&mut self, width: f32, height: f32) {
        let max = Vec2::new(width, height) - self.half;
        self.center = self.center.clamp(self.half, max.max(self.half));
    }
}

/// Reflect velocity off a surface
///
/// Formula: v' = v - 2(v·n)n
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}
