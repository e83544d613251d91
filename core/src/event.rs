//! The event catalog: all inter-subsystem communication.
//!
//! RULE: Subsystems communicate ONLY through events.
//! A subsystem may never call another subsystem's functions directly.
//! A subsystem may never read another subsystem's internal state.
//!
//! External layers (UI, audio, VFX) subscribe to these through the
//! [`EventBus`](crate::event_bus::EventBus) and never mutate core state.

use crate::{
    guy::GuyState,
    params::RoundParams,
    scoring::ScoreBreakdown,
    types::{Actor, BoxId, Edge, GuyId, GuyTypeId, ParticleId, RunId, ThingId, ThingTypeId, Tick, UpgradeId, Vec2},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Title,
    Setup,
    Active,
    Resolution,
    Parameterization,
    GameOver,
    Endless,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundResult {
    Victory,
    Failure,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyReason {
    Tantrum,
    BoxEmptied,
}

/// Every event emitted during simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Engine ─────────────────────────────────────
    RunInitialized {
        run_id: RunId,
        seed: u64,
    },
    PlayerCommandReceived {
        command_type: String,
    },

    // ── Round lifecycle ────────────────────────────
    PhaseChanged {
        from: GamePhase,
        to: GamePhase,
    },
    RoundSetupStarted {
        round_number: u32,
        params: RoundParams,
    },
    RoundActiveStarted {
        round_number: u32,
        duration: f32,
        spawn_interval: f32,
        guy_type_count: u32,
    },
    PauseChanged {
        paused: bool,
    },
    RoundEnded {
        round_number: u32,
        result: RoundResult,
    },
    ScoreRoundTallied {
        round_number: u32,
        round_score: u64,
        stars_earned: u32,
        breakdown: ScoreBreakdown,
    },
    GameOver {
        rounds_completed: u32,
        total_score: u64,
        endless_available: bool,
    },
    EndlessStarted {
        round_number: u32,
    },

    // ── Scoring ────────────────────────────────────
    ScoreChanged {
        round_score: u64,
        delta: i64,
    },
    PenaltyApplied {
        reason: PenaltyReason,
        amount: u64,
        round_score: u64,
    },
    MultiplierChanged {
        multiplier: f32,
        particles: u32,
    },

    // ── Upgrades ───────────────────────────────────
    UpgradePurchased {
        upgrade_id: UpgradeId,
        params: RoundParams,
    },
    StarsSpent {
        amount: u32,
        remaining: u32,
        upgrade_id: UpgradeId,
    },

    // ── Boxes and things ───────────────────────────
    BoxesPlaced {
        count: u32,
    },
    BoxSpawned {
        box_id: BoxId,
        thing_type: ThingTypeId,
        position: Vec2,
        edge: Edge,
    },
    ThingSpawned {
        thing: ThingId,
        thing_type: ThingTypeId,
        position: Vec2,
    },
    ThingPickedUp {
        thing: ThingId,
        by: Actor,
    },
    ThingDropped {
        thing: ThingId,
        position: Vec2,
        by: Actor,
    },
    ThingReturned {
        thing: ThingId,
        box_id: BoxId,
        thing_type: ThingTypeId,
    },
    ThingScattered {
        thing: ThingId,
        box_id: BoxId,
        position: Vec2,
        by: Actor,
    },
    BoxThingAdded {
        box_id: BoxId,
        thing: ThingId,
        count: u32,
    },
    BoxThingRemoved {
        box_id: BoxId,
        thing: ThingId,
        count: u32,
        by: Actor,
    },
    BoxRestocked {
        box_id: BoxId,
    },
    BoxEmptied {
        box_id: BoxId,
        by: Actor,
    },

    // ── Guys ───────────────────────────────────────
    GuySpawned {
        guy: GuyId,
        guy_type: GuyTypeId,
        position: Vec2,
        target_box: BoxId,
    },
    SpawnIntervalChanged {
        interval: f32,
    },
    GuyStateChanged {
        guy: GuyId,
        from: GuyState,
        to: GuyState,
    },
    GuyReachedBox {
        guy: GuyId,
        box_id: BoxId,
    },
    GuyLonging {
        guy: GuyId,
    },
    GuyTantrum {
        guy: GuyId,
        position: Vec2,
    },
    ScreenShakeRequested {
        intensity: f32,
        duration: f32,
    },
    GuyStoleFromPlayer {
        guy: GuyId,
        thing: ThingId,
    },
    GuyLeftBoard {
        guy: GuyId,
    },
    GuyDespawned {
        guy: GuyId,
    },

    // ── Chaos ──────────────────────────────────────
    ChaosParticleSpawned {
        particle: ParticleId,
        position: Vec2,
        total: u32,
    },
    ChaosCleared {
        count: u32,
    },
    MessinessChanged {
        ratio: f32,
    },
    ChaosWarning {
        ratio: f32,
    },
    ChaosExceeded {
        ratio: f32,
    },
}

impl SimEvent {
    /// Stable dotted name used as the bus subscription key and the
    /// `event_type` column of the event log.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }        => "run.initialized",
            Self::PlayerCommandReceived { .. } => "player.command_received",
            Self::PhaseChanged { .. }          => "phase.changed",
            Self::RoundSetupStarted { .. }     => "round.setup.started",
            Self::RoundActiveStarted { .. }    => "round.active.started",
            Self::PauseChanged { .. }          => "round.pause_changed",
            Self::RoundEnded { .. }            => "round.ended",
            Self::ScoreRoundTallied { .. }     => "score.round.tallied",
            Self::GameOver { .. }              => "game.over",
            Self::EndlessStarted { .. }        => "game.endless.started",
            Self::ScoreChanged { .. }          => "score.changed",
            Self::PenaltyApplied { .. }        => "score.penalty_applied",
            Self::MultiplierChanged { .. }     => "score.multiplier_changed",
            Self::UpgradePurchased { .. }      => "upgrade.purchased",
            Self::StarsSpent { .. }            => "stars.spent",
            Self::BoxesPlaced { .. }           => "boxes.placed",
            Self::BoxSpawned { .. }            => "box.spawned",
            Self::ThingSpawned { .. }          => "thing.spawned",
            Self::ThingPickedUp { .. }         => "thing.picked_up",
            Self::ThingDropped { .. }          => "thing.dropped",
            Self::ThingReturned { .. }         => "thing.returned",
            Self::ThingScattered { .. }        => "thing.scattered",
            Self::BoxThingAdded { .. }         => "box.thing_added",
            Self::BoxThingRemoved { .. }       => "box.thing_removed",
            Self::BoxRestocked { .. }          => "box.restocked",
            Self::BoxEmptied { .. }            => "box.emptied",
            Self::GuySpawned { .. }            => "guy.spawned",
            Self::SpawnIntervalChanged { .. }  => "guy.spawn_interval_changed",
            Self::GuyStateChanged { .. }       => "guy.state_changed",
            Self::GuyReachedBox { .. }         => "guy.reached_box",
            Self::GuyLonging { .. }            => "guy.longing",
            Self::GuyTantrum { .. }            => "guy.tantrum",
            Self::ScreenShakeRequested { .. }  => "screen.shake_requested",
            Self::GuyStoleFromPlayer { .. }    => "guy.stole_from_player",
            Self::GuyLeftBoard { .. }          => "guy.left_board",
            Self::GuyDespawned { .. }          => "guy.despawned",
            Self::ChaosParticleSpawned { .. }  => "chaos.particle_spawned",
            Self::ChaosCleared { .. }          => "chaos.cleared",
            Self::MessinessChanged { .. }      => "chaos.messiness_changed",
            Self::ChaosWarning { .. }          => "chaos.warning",
            Self::ChaosExceeded { .. }         => "chaos.exceeded",
        }
    }
}

/// One entry of the in-memory event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub run_id: RunId,
    pub tick: Tick,
    pub subsystem: String,
    pub event_type: String,
    pub payload: String, // JSON-serialized SimEvent
}
