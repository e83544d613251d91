//! Persistent round parameters and the deltas upgrades apply to them.

use crate::types::BoardSize;
use serde::{Deserialize, Serialize};

/// Knobs read by the board and the spawners at the start of each round.
/// Written only by upgrades and by restoring a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundParams {
    pub box_count:          u32,
    pub thing_type_count:   u32,
    pub guy_type_count:     u32,
    pub board_size:         BoardSize,
    /// Seconds between guy spawns at the start of a round.
    pub guy_spawn_interval: f32,
    /// Seconds.
    pub round_duration:     f32,
    pub things_per_box:     u32,
}

impl Default for RoundParams {
    fn default() -> Self {
        Self {
            box_count:          4,
            thing_type_count:   2,
            guy_type_count:     1,
            board_size:         BoardSize::new(16, 12),
            guy_spawn_interval: 3.0,
            round_duration:     120.0,
            things_per_box:     3,
        }
    }
}

/// A single named change to [`RoundParams`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "param", content = "by", rename_all = "snake_case")]
pub enum ParamDelta {
    AddBoxCount(i32),
    AddThingTypeCount(i32),
    AddGuyTypeCount(i32),
    ExpandBoard { width: i32, height: i32 },
    ScaleSpawnInterval(f32),
    AddRoundDuration(f32),
    AddThingsPerBox(i32),
}

fn add_floor(value: u32, delta: i32, floor: u32) -> u32 {
    let next = i64::from(value) + i64::from(delta);
    next.clamp(i64::from(floor), i64::from(u32::MAX)) as u32
}

impl ParamDelta {
    pub fn apply(&self, params: &mut RoundParams) {
        match self {
            Self::AddBoxCount(n)       => params.box_count = add_floor(params.box_count, *n, 1),
            Self::AddThingTypeCount(n) => params.thing_type_count = add_floor(params.thing_type_count, *n, 1),
            Self::AddGuyTypeCount(n)   => params.guy_type_count = add_floor(params.guy_type_count, *n, 1),
            Self::ExpandBoard { width, height } => {
                params.board_size.width = add_floor(params.board_size.width, *width, 1);
                params.board_size.height = add_floor(params.board_size.height, *height, 1);
            }
            Self::ScaleSpawnInterval(factor) => {
                params.guy_spawn_interval = (params.guy_spawn_interval * factor).max(0.1);
            }
            Self::AddRoundDuration(secs) => {
                params.round_duration = (params.round_duration + secs).max(10.0);
            }
            Self::AddThingsPerBox(n) => params.things_per_box = add_floor(params.things_per_box, *n, 0),
        }
    }
}

impl RoundParams {
    /// Apply a list of deltas, returning the projected parameters.
    pub fn with_deltas(&self, deltas: &[ParamDelta]) -> RoundParams {
        let mut next = self.clone();
        for d in deltas {
            d.apply(&mut next);
        }
        next
    }

    /// Rough "points available per round" figure shown next to upgrade
    /// previews. Not used by scoring.
    pub fn score_potential(&self, avg_base_score: f64) -> f64 {
        let stock = f64::from(self.box_count * self.things_per_box);
        let variety = f64::from(self.thing_type_count.min(self.box_count)).sqrt();
        let pressure = f64::from(self.round_duration) / f64::from(self.guy_spawn_interval.max(0.1));
        let room = f64::from(self.board_size.area()).sqrt();
        avg_base_score * (stock * variety + pressure * 0.5) * (room / 14.0)
    }
}
