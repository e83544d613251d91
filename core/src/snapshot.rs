//! Snapshot serialization: persistent progress to/from JSON.
//!
//! A snapshot holds what survives between rounds: the round counter,
//! score and star totals, purchased upgrades and the parameter set they
//! produced. Board entities are never saved; restoring resumes the game
//! between rounds, ready to shop or start the next one.

use crate::{
    params::RoundParams,
    types::{RunId, UpgradeId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSnapshot {
    pub run_id:             RunId,
    pub round_number:       u32,
    pub total_score:        u64,
    pub stars_earned:       u32,
    pub stars_available:    u32,
    pub rounds_completed:   u32,
    pub purchased_upgrades: Vec<UpgradeId>,
    pub params:             RoundParams,
    pub saved_at:           DateTime<Utc>,
}

impl GameSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
