//! Seeded random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! All randomness (spawn type, target box, arc curvature, edge selection,
//! scatter offsets) flows through SubsystemRng instances derived from the
//! single seed the engine was built with.
//!
//! Each subsystem owns its own stream, seeded from
//! (master_seed XOR subsystem_index). This means:
//!   - Adding a new subsystem never changes existing subsystems' streams.
//!   - Tests can hand any function a fixed-seed stream.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

use crate::types::Vec2;

/// A named, seeded RNG for a single subsystem.
pub struct SubsystemRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SubsystemRng {
    /// Create a subsystem RNG from the master seed and a stable
    /// subsystem index. The index must never change once assigned.
    pub fn new(master_seed: u64, subsystem_index: u64) -> Self {
        let derived_seed = master_seed ^ (subsystem_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f32(&mut self) -> f32 {
        let bits = self.inner.next_u32();
        (bits >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
    }

    /// Roll a float in [lo, hi). Returns `lo` for an empty range.
    pub fn range_f32(&mut self, lo: f32, hi: f32) -> f32 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.next_f32()
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Roll an index in [0, len). `None` for an empty collection.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.next_u64_below(len as u64) as usize)
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// -1.0 or 1.0 with equal probability.
    pub fn sign(&mut self) -> f32 {
        if self.chance(0.5) { 1.0 } else { -1.0 }
    }

    /// Pick an index proportionally to `weights`. Non-positive weights are
    /// never picked; `None` when nothing has positive weight.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut roll = self.next_f64() * total;
        let mut last_positive = None;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            last_positive = Some(i);
            if roll < *w {
                return Some(i);
            }
            roll -= w;
        }
        // Float drift at the top of the range.
        last_positive
    }

    /// Uniform direction on the unit circle.
    pub fn unit_vec(&mut self) -> Vec2 {
        let angle = self.range_f32(0.0, std::f32::consts::TAU);
        Vec2::new(angle.cos(), angle.sin())
    }
}

/// All subsystem RNGs for a single run, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn for_subsystem(&self, slot: SubsystemSlot) -> SubsystemRng {
        SubsystemRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable subsystem slot assignments.
/// NEVER reorder or remove entries; only append.
/// Reordering changes every subsystem's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u64)]
pub enum SubsystemSlot {
    Round = 0,
    BoxSpawner = 1,
    GuySpawner = 2,
    Guys = 3,
    Things = 4,
    Chaos = 5,
}

impl SubsystemSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Round => "round",
            Self::BoxSpawner => "box_spawner",
            Self::GuySpawner => "guy_spawner",
            Self::Guys => "guys",
            Self::Things => "things",
            Self::Chaos => "chaos",
        }
    }
}
