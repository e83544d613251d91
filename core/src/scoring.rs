//! Round scoring: multiplier bands, penalties, messiness and the star award.
//!
//! Everything here is pure arithmetic over a [`RoundTally`]; the round
//! subsystem feeds it from events.

use crate::{config::ScoringConfig, event::RoundResult};
use serde::{Deserialize, Serialize};

/// Score multiplier for the current particle count.
pub fn multiplier_for(particles: u32, cfg: &ScoringConfig) -> f32 {
    if particles < cfg.low_chaos_particles {
        cfg.high_multiplier
    } else if particles > cfg.high_chaos_particles {
        cfg.reduced_multiplier
    } else {
        cfg.medium_multiplier
    }
}

/// Particles relative to what the board can hold, clamped to [0, 1].
pub fn messiness_ratio(particles: u32, board_tiles: u32, coverage_per_tile: f32) -> f32 {
    let capacity = board_tiles as f32 * coverage_per_tile;
    if capacity <= 0.0 {
        return if particles > 0 { 1.0 } else { 0.0 };
    }
    (particles as f32 / capacity).clamp(0.0, 1.0)
}

/// Subtract a penalty, flooring at zero.
pub fn apply_penalty(score: u64, amount: u64) -> u64 {
    score.saturating_sub(amount)
}

/// Points for returning a thing worth `base_score` under `multiplier`.
pub fn return_points(base_score: u32, multiplier: f32) -> u64 {
    (f64::from(base_score) * f64::from(multiplier)).round().max(0.0) as u64
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StarAward {
    pub survived: bool,
    pub stocked:  bool,
    pub calm:     bool,
}

impl StarAward {
    pub fn count(&self) -> u32 {
        u32::from(self.survived) + u32::from(self.stocked) + u32::from(self.calm)
    }
}

pub fn award_stars(
    result: RoundResult,
    stocked_ratio: f32,
    tantrums: u32,
    lowest_multiplier: f32,
    cfg: &ScoringConfig,
) -> StarAward {
    StarAward {
        survived: result == RoundResult::Victory,
        stocked:  stocked_ratio >= cfg.stocked_ratio_for_star,
        calm:     tantrums < cfg.tantrum_cap_for_star && lowest_multiplier >= cfg.min_multiplier_for_star,
    }
}

/// Published with `score.round.tallied`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub result:            RoundResult,
    pub things_returned:   u32,
    pub return_points:     u64,
    pub tantrums:          u32,
    pub empty_box_events:  u32,
    pub penalty_points:    u64,
    pub stocked_ratio:     f32,
    pub lowest_multiplier: f32,
    pub stars:             StarAward,
}

/// Per-round counters. Reset at every setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundTally {
    pub round_score:       u64,
    pub things_returned:   u32,
    pub return_points:     u64,
    pub tantrums:          u32,
    pub empty_box_events:  u32,
    pub penalty_points:    u64,
    pub multiplier:        f32,
    pub lowest_multiplier: f32,
    stocked_seconds:       f64,
    active_seconds:        f64,
}

impl RoundTally {
    pub fn new(multiplier: f32) -> Self {
        Self {
            round_score: 0,
            things_returned: 0,
            return_points: 0,
            tantrums: 0,
            empty_box_events: 0,
            penalty_points: 0,
            multiplier,
            lowest_multiplier: multiplier,
            stocked_seconds: 0.0,
            active_seconds: 0.0,
        }
    }

    /// Credit a returned thing. Returns the points added.
    pub fn record_return(&mut self, base_score: u32) -> u64 {
        let points = return_points(base_score, self.multiplier);
        self.things_returned += 1;
        self.return_points += points;
        self.round_score += points;
        points
    }

    /// Apply a penalty. Returns how much was actually taken off.
    pub fn record_penalty(&mut self, amount: u64) -> u64 {
        let before = self.round_score;
        self.round_score = apply_penalty(before, amount);
        self.penalty_points += amount;
        before - self.round_score
    }

    /// Set the multiplier. Returns true if it changed.
    pub fn set_multiplier(&mut self, multiplier: f32) -> bool {
        if (multiplier - self.multiplier).abs() < f32::EPSILON {
            return false;
        }
        self.multiplier = multiplier;
        self.lowest_multiplier = self.lowest_multiplier.min(multiplier);
        true
    }

    /// Accumulate `dt` seconds with `stocked` of `total` boxes holding
    /// something.
    pub fn sample_stock(&mut self, stocked: u32, total: u32, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let ratio = if total == 0 { 0.0 } else { f64::from(stocked) / f64::from(total) };
        self.stocked_seconds += ratio * f64::from(dt);
        self.active_seconds += f64::from(dt);
    }

    /// Time-weighted share of boxes that were stocked. 1.0 before any
    /// active time has passed.
    pub fn stocked_ratio(&self) -> f32 {
        if self.active_seconds <= 0.0 {
            return 1.0;
        }
        (self.stocked_seconds / self.active_seconds) as f32
    }

    pub fn breakdown(&self, result: RoundResult, cfg: &ScoringConfig) -> ScoreBreakdown {
        let stocked_ratio = self.stocked_ratio();
        ScoreBreakdown {
            result,
            things_returned: self.things_returned,
            return_points: self.return_points,
            tantrums: self.tantrums,
            empty_box_events: self.empty_box_events,
            penalty_points: self.penalty_points,
            stocked_ratio,
            lowest_multiplier: self.lowest_multiplier,
            stars: award_stars(result, stocked_ratio, self.tantrums, self.lowest_multiplier, cfg),
        }
    }
}
