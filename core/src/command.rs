use serde::{Deserialize, Serialize};
use crate::types::{RunId, Tick, UpgradeId};

/// All player-issued commands.
/// Variants are only ever appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Flow control ──────────────────────────────
    StartGame,
    Pause,
    Resume,
    ContinueToParameterization,
    StartNextRound,
    StartEndless,

    // ── Parameterization ──────────────────────────
    Purchase { upgrade_id: UpgradeId },

    // ── Player avatar ─────────────────────────────
    MovePlayer { x: f32, y: f32 },
    PickUp,
    Drop,
}

impl PlayerCommand {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::StartGame                  => "start_game",
            Self::Pause                      => "pause",
            Self::Resume                     => "resume",
            Self::ContinueToParameterization => "continue_to_parameterization",
            Self::StartNextRound             => "start_next_round",
            Self::StartEndless               => "start_endless",
            Self::Purchase { .. }            => "purchase",
            Self::MovePlayer { .. }          => "move_player",
            Self::PickUp                     => "pick_up",
            Self::Drop                       => "drop",
        }
    }
}

/// A queued player command with its submission tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub run_id:    RunId,
    pub queued_at: Tick,
    pub command:   PlayerCommand,
}
