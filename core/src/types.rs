//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};

pub use glam::Vec2;

/// A simulation tick. One tick = one engine frame.
pub type Tick = u64;

/// The canonical run identifier.
pub type RunId = String;

/// Board entity identifiers. Allocated by the board, never reused within a run.
pub type ThingId = u64;
pub type BoxId = u64;
pub type GuyId = u64;
pub type ParticleId = u64;

/// Registry keys.
pub type ThingTypeId = String;
pub type GuyTypeId = String;
pub type UpgradeId = String;

/// One of the four sides of the board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    North,
    East,
    South,
    West,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::North, Edge::East, Edge::South, Edge::West];

    pub fn opposite(self) -> Edge {
        match self {
            Edge::North => Edge::South,
            Edge::South => Edge::North,
            Edge::East  => Edge::West,
            Edge::West  => Edge::East,
        }
    }

    /// Unit vector pointing from this edge into the board.
    pub fn inward(self) -> Vec2 {
        match self {
            Edge::North => Vec2::Y,
            Edge::South => Vec2::NEG_Y,
            Edge::East  => Vec2::NEG_X,
            Edge::West  => Vec2::X,
        }
    }
}

/// Board dimensions measured in tiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardSize {
    pub width:  u32,
    pub height: u32,
}

impl BoardSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// Axis-aligned rectangle in world units. `min` is the north-west corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn centered(half_extent: Vec2) -> Self {
        Self { min: -half_extent, max: half_extent }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Shrink by `margin` on every side. Collapses to the centre if too small.
    pub fn inset(&self, margin: f32) -> Rect {
        let c = self.center();
        let half = (self.size() * 0.5 - Vec2::splat(margin)).max(Vec2::ZERO);
        Rect { min: c - half, max: c + half }
    }
}

/// Who caused an entity mutation. Used in event payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Player,
    Guy(GuyId),
    System,
}
