//! Tuning and content configuration.
//!
//! `SimConfig::default()` carries the shipped values. `SimConfig::load`
//! reads the same structure from the `data/` directory:
//!   data/thing_types.json   { "thing_types": [...] }
//!   data/guy_types.json     { "guy_types": [...] }
//!   data/upgrades.json      { "upgrades": [...] }
//!   data/tuning.json        every other section; missing keys keep defaults

use crate::{
    error::{SimError, SimResult},
    movement::MovementModel,
    params::RoundParams,
    registry::{default_guy_types, default_thing_types, GuyType, ThingType},
    types::BoardSize,
    upgrade::{default_upgrades, UpgradeConfig},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoardConfig {
    /// World units per tile.
    pub tile_size:            f32,
    pub min_size:             BoardSize,
    pub max_size:             BoardSize,
    /// Used when a board is built without an explicit size.
    pub fallback_size:        BoardSize,
    /// Extra tiles kept clear of box slots at each corner.
    pub corner_padding_tiles: u32,
    /// How far outside the bounds exit points sit, in tiles.
    pub exit_margin_tiles:    f32,
    /// Central spawn zone size as a fraction of the board.
    pub spawn_zone_fraction:  f32,
    pub box_radius:           f32,
    pub thing_radius:         f32,
    pub player_speed:         f32,
    pub player_reach:         f32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            tile_size:            32.0,
            min_size:             BoardSize::new(8, 6),
            max_size:             BoardSize::new(32, 24),
            fallback_size:        BoardSize::new(16, 12),
            corner_padding_tiles: 1,
            exit_margin_tiles:    3.0,
            spawn_zone_fraction:  0.3,
            box_radius:           20.0,
            thing_radius:         8.0,
            player_speed:         160.0,
            player_reach:         28.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoundRules {
    /// Seconds spent in Setup before Active begins.
    pub setup_duration:               f32,
    pub max_rounds:                   u32,
    /// Rounds that must be completed to unlock endless mode.
    pub min_rounds_for_endless:       u32,
    /// Continue requests during Resolution are ignored before this.
    pub resolution_min_secs:          f32,
    /// Advance out of Resolution on its own after this many seconds.
    pub resolution_auto_advance_secs: Option<f32>,
}

impl Default for RoundRules {
    fn default() -> Self {
        Self {
            setup_duration:               2.0,
            max_rounds:                   10,
            min_rounds_for_endless:       5,
            resolution_min_secs:          1.0,
            resolution_auto_advance_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub tantrum_penalty:         u64,
    pub empty_box_penalty:       u64,
    /// Below this many particles the high multiplier applies.
    pub low_chaos_particles:     u32,
    /// Above this many particles the reduced multiplier applies.
    pub high_chaos_particles:    u32,
    pub high_multiplier:         f32,
    pub medium_multiplier:       f32,
    pub reduced_multiplier:      f32,
    pub stocked_ratio_for_star:  f32,
    /// Tantrums must stay strictly below this for the third star.
    pub tantrum_cap_for_star:    u32,
    pub min_multiplier_for_star: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tantrum_penalty:         25,
            empty_box_penalty:       15,
            low_chaos_particles:     10,
            high_chaos_particles:    40,
            high_multiplier:         1.5,
            medium_multiplier:       1.0,
            reduced_multiplier:      0.5,
            stocked_ratio_for_star:  0.8,
            tantrum_cap_for_star:    3,
            min_multiplier_for_star: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChaosConfig {
    /// Particles per board tile that count as "fully messy".
    pub coverage_per_tile: f32,
    pub warning_ratio:     f32,
    pub failure_ratio:     f32,
    /// Initial outward speed of a tantrum particle.
    pub burst_speed:       f32,
    /// Velocity decay per second.
    pub drag:              f32,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            coverage_per_tile: 0.5,
            warning_ratio:     0.6,
            failure_ratio:     0.9,
            burst_speed:       90.0,
            drag:              4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpawnConfig {
    /// Interval multiplier applied after every spawn attempt.
    pub interval_decay:        f32,
    pub min_interval:          f32,
    pub max_concurrent_guys:   usize,
    /// Minimum distance between boxes, in tiles.
    pub min_box_spacing_tiles: f32,
    pub normal_weight:         f64,
    pub special_weight:        f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            interval_decay:        0.95,
            min_interval:          0.8,
            max_concurrent_guys:   8,
            min_box_spacing_tiles: 2.0,
            normal_weight:         3.0,
            special_weight:        1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuyConfig {
    pub arrival_radius:          f32,
    /// Seconds a guy fiddles at a box or drop point before acting.
    pub action_delay:            f32,
    pub spawn_duration:          f32,
    pub tantrum_duration:        f32,
    /// Chance a guy goes for another box after dropping its loot.
    pub reseek_probability:      f64,
    pub separation_radius:       f32,
    pub separation_strength:     f32,
    pub min_bend:                f32,
    pub max_bend:                f32,
    pub path_recompute_interval: f32,
    /// Destination drift that forces a new arc.
    pub path_recompute_distance: f32,
    pub scatter_min_tiles:       f32,
    pub scatter_max_tiles:       f32,
    /// Minimum distance from the box to where loot gets dumped, in tiles.
    pub drop_distance_tiles:     f32,
    pub shake_intensity:         f32,
    pub shake_duration:          f32,
    /// Particles land within this radius of the tantrum.
    pub tantrum_spread:          f32,
    /// How close a thief must get to snatch from the player's hands.
    pub steal_reach:             f32,
}

impl Default for GuyConfig {
    fn default() -> Self {
        Self {
            arrival_radius:          18.0,
            action_delay:            0.6,
            spawn_duration:          0.5,
            tantrum_duration:        1.5,
            reseek_probability:      0.7,
            separation_radius:       40.0,
            separation_strength:     400.0,
            min_bend:                0.15,
            max_bend:                0.4,
            path_recompute_interval: 0.75,
            path_recompute_distance: 16.0,
            scatter_min_tiles:       1.0,
            scatter_max_tiles:       2.5,
            drop_distance_tiles:     4.0,
            shake_intensity:         0.6,
            shake_duration:          0.3,
            tantrum_spread:          24.0,
            steal_reach:             24.0,
        }
    }
}

/// Where guys appear relative to their target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPlacement {
    /// Just outside the edge opposite the target box.
    OppositeEdge,
    /// Inside the central spawn zone.
    CentralZone,
}

/// The two guy behavior profiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorPreset {
    /// Arc movement, guys walk in from outside the board.
    Outward,
    /// Straight seek, guys pop up in the middle of the board.
    Central,
}

impl BehaviorPreset {
    pub fn movement(self) -> MovementModel {
        match self {
            Self::Outward => MovementModel::Arc,
            Self::Central => MovementModel::StraightSeek,
        }
    }

    pub fn placement(self) -> SpawnPlacement {
        match self {
            Self::Outward => SpawnPlacement::OppositeEdge,
            Self::Central => SpawnPlacement::CentralZone,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "outward" => Some(Self::Outward),
            "central" => Some(Self::Central),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Tuning {
    pub initial_params:     RoundParams,
    pub board:              BoardConfig,
    pub round:              RoundRules,
    pub scoring:            ScoringConfig,
    pub chaos:              ChaosConfig,
    pub spawning:           SpawnConfig,
    pub guys:               GuyConfig,
    pub preset:             BehaviorPreset,
    /// Oldest entries are dropped past this many.
    pub event_log_capacity: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            initial_params:     RoundParams::default(),
            board:              BoardConfig::default(),
            round:              RoundRules::default(),
            scoring:            ScoringConfig::default(),
            chaos:              ChaosConfig::default(),
            spawning:           SpawnConfig::default(),
            guys:               GuyConfig::default(),
            preset:             BehaviorPreset::Outward,
            event_log_capacity: 20_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ThingTypesFile {
    thing_types: Vec<ThingType>,
}

#[derive(Debug, Clone, Deserialize)]
struct GuyTypesFile {
    guy_types: Vec<GuyType>,
}

#[derive(Debug, Clone, Deserialize)]
struct UpgradesFile {
    upgrades: Vec<UpgradeConfig>,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub thing_types:        Vec<ThingType>,
    pub guy_types:          Vec<GuyType>,
    pub upgrades:           Vec<UpgradeConfig>,
    pub initial_params:     RoundParams,
    pub board:              BoardConfig,
    pub round:              RoundRules,
    pub scoring:            ScoringConfig,
    pub chaos:              ChaosConfig,
    pub spawning:           SpawnConfig,
    pub guys:               GuyConfig,
    pub preset:             BehaviorPreset,
    pub event_log_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_parts(default_thing_types(), default_guy_types(), default_upgrades(), Tuning::default())
    }
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}

impl SimConfig {
    fn from_parts(
        thing_types: Vec<ThingType>,
        guy_types: Vec<GuyType>,
        upgrades: Vec<UpgradeConfig>,
        tuning: Tuning,
    ) -> Self {
        Self {
            thing_types,
            guy_types,
            upgrades,
            initial_params:     tuning.initial_params,
            board:              tuning.board,
            round:              tuning.round,
            scoring:            tuning.scoring,
            chaos:              tuning.chaos,
            spawning:           tuning.spawning,
            guys:               tuning.guys,
            preset:             tuning.preset,
            event_log_capacity: tuning.event_log_capacity,
        }
    }

    /// Load from the data/ directory.
    /// In tests, use SimConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let things: ThingTypesFile = read_json(&format!("{data_dir}/thing_types.json"))?;
        let guys: GuyTypesFile = read_json(&format!("{data_dir}/guy_types.json"))?;
        let upgrades: UpgradesFile = read_json(&format!("{data_dir}/upgrades.json"))?;
        let tuning: Tuning = read_json(&format!("{data_dir}/tuning.json"))?;

        let config = Self::from_parts(things.thing_types, guys.guy_types, upgrades.upgrades, tuning);
        config.validate()?;
        log::info!(
            "config: {} thing types, {} guy types, {} upgrades, preset {:?}",
            config.thing_types.len(),
            config.guy_types.len(),
            config.upgrades.len(),
            config.preset
        );
        Ok(config)
    }

    pub fn with_preset(mut self, preset: BehaviorPreset) -> Self {
        self.preset = preset;
        self
    }

    /// The tuning half of the config, as written to `tuning.json`.
    pub fn tuning(&self) -> Tuning {
        Tuning {
            initial_params:     self.initial_params.clone(),
            board:              self.board.clone(),
            round:              self.round.clone(),
            scoring:            self.scoring.clone(),
            chaos:              self.chaos.clone(),
            spawning:           self.spawning.clone(),
            guys:               self.guys.clone(),
            preset:             self.preset,
            event_log_capacity: self.event_log_capacity,
        }
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        let invalid = |reason: String| Err(SimError::InvalidConfig { reason });

        if self.thing_types.is_empty() {
            return Err(SimError::EmptyRegistry { name: "thing_types" });
        }
        if self.guy_types.is_empty() {
            return Err(SimError::EmptyRegistry { name: "guy_types" });
        }
        if self.board.tile_size <= 0.0 {
            return invalid(format!("tile_size must be positive, got {}", self.board.tile_size));
        }
        if self.board.min_size.width > self.board.max_size.width
            || self.board.min_size.height > self.board.max_size.height
        {
            return invalid("board min_size exceeds max_size".into());
        }
        if !(0.0 < self.spawning.interval_decay && self.spawning.interval_decay <= 1.0) {
            return invalid(format!("interval_decay must be in (0, 1], got {}", self.spawning.interval_decay));
        }
        if self.chaos.warning_ratio > self.chaos.failure_ratio {
            return invalid("chaos warning_ratio exceeds failure_ratio".into());
        }
        if self.scoring.low_chaos_particles > self.scoring.high_chaos_particles {
            return invalid("low_chaos_particles exceeds high_chaos_particles".into());
        }

        let ids: BTreeSet<&str> = self.upgrades.iter().map(|u| u.id.as_str()).collect();
        if ids.len() != self.upgrades.len() {
            return invalid("duplicate upgrade id".into());
        }
        for u in &self.upgrades {
            if let Some(missing) = u.prerequisites.iter().find(|p| !ids.contains(p.as_str())) {
                return invalid(format!("upgrade '{}' requires unknown '{missing}'", u.id));
            }
        }
        Ok(())
    }
}
