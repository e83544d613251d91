//! Round subsystem: the game's phase machine and scorekeeper.
//!
//! Phases:
//!   Title -> Setup -> Active -> Resolution -> Parameterization -> Setup ...
//!   Parameterization -> GameOver once the round counter passes max_rounds
//!   GameOver -> Endless -> Setup ... when enough rounds were completed
//!
//! Setup and Active advance on timers inside update(). Every other
//! transition is an explicit request made through the engine.
//!
//! Scoring listens to the event stream: returned things, tantrums, emptied
//! boxes and chaos particles. Only events seen while Active count.

use crate::{
    board::Board,
    clock::FrameCtx,
    config::{RoundRules, ScoringConfig, SimConfig},
    error::{PurchaseError, SimResult},
    event::{GamePhase, PenaltyReason, RoundResult, SimEvent},
    params::RoundParams,
    registry::ThingTypeRegistry,
    rng::SubsystemRng,
    scoring::{multiplier_for, RoundTally, ScoreBreakdown},
    subsystem::SimSubsystem,
    upgrade::UpgradeCatalog,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub phase:            GamePhase,
    /// 0 on the title screen, 1 for the first round.
    pub round_number:     u32,
    /// Seconds left in the Active phase.
    pub round_timer:      f32,
    /// Seconds spent in the current phase.
    pub phase_timer:      f32,
    pub tally:            RoundTally,
    pub chaos_particles:  u32,
    pub total_score:      u64,
    pub stars_earned:     u32,
    pub stars_available:  u32,
    pub rounds_completed: u32,
    pub endless:          bool,
    pub params:           RoundParams,
    pub last_breakdown:   Option<ScoreBreakdown>,
    chaos_failed:         bool,
}

pub struct RoundSubsystem {
    state:       GameState,
    thing_types: ThingTypeRegistry,
    rules:       RoundRules,
    scoring:     ScoringConfig,
}

impl RoundSubsystem {
    pub fn new(config: &SimConfig) -> SimResult<Self> {
        let tally = RoundTally::new(multiplier_for(0, &config.scoring));
        Ok(Self {
            state: GameState {
                phase: GamePhase::Title,
                round_number: 0,
                round_timer: 0.0,
                phase_timer: 0.0,
                tally,
                chaos_particles: 0,
                total_score: 0,
                stars_earned: 0,
                stars_available: 0,
                rounds_completed: 0,
                endless: false,
                params: config.initial_params.clone(),
                last_breakdown: None,
                chaos_failed: false,
            },
            thing_types: ThingTypeRegistry::new("thing_types", config.thing_types.clone())?,
            rules: config.round.clone(),
            scoring: config.scoring.clone(),
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn params(&self) -> &RoundParams {
        &self.state.params
    }

    pub fn endless_available(&self) -> bool {
        self.state.rounds_completed >= self.rules.min_rounds_for_endless
    }

    /// Mean base score of the types the next round would use.
    pub fn avg_base_score(&self) -> f64 {
        let mut types = self.thing_types.unlocked(self.state.round_number.max(1));
        types.truncate(self.state.params.thing_type_count.max(1) as usize);
        if types.is_empty() {
            return f64::from(self.thing_types.default_entry().base_score);
        }
        types.iter().map(|t| f64::from(t.base_score)).sum::<f64>() / types.len() as f64
    }

    fn set_phase(&mut self, to: GamePhase, out: &mut Vec<SimEvent>) {
        let from = self.state.phase;
        self.state.phase = to;
        self.state.phase_timer = 0.0;
        log::info!("round {}: {from:?} -> {to:?}", self.state.round_number);
        out.push(SimEvent::PhaseChanged { from, to });
    }

    // ── Requests ───────────────────────────────────────────────

    /// Title -> Setup of round 1.
    pub fn start_game(&mut self, board: &mut Board, out: &mut Vec<SimEvent>) -> bool {
        if self.state.phase != GamePhase::Title {
            return false;
        }
        self.state.round_number = 1;
        self.enter_setup(board, out);
        true
    }

    /// Resolution -> Parameterization, once the minimum display time passed.
    pub fn continue_to_parameterization(&mut self, out: &mut Vec<SimEvent>) -> bool {
        if self.state.phase != GamePhase::Resolution || self.state.phase_timer < self.rules.resolution_min_secs {
            return false;
        }
        self.set_phase(GamePhase::Parameterization, out);
        true
    }

    /// Parameterization -> Setup of the next round, or GameOver past the
    /// last round.
    pub fn start_next_round(&mut self, board: &mut Board, out: &mut Vec<SimEvent>) -> bool {
        if self.state.phase != GamePhase::Parameterization {
            return false;
        }
        self.state.round_number += 1;
        if !self.state.endless && self.state.round_number > self.rules.max_rounds {
            self.set_phase(GamePhase::GameOver, out);
            out.push(SimEvent::GameOver {
                rounds_completed: self.state.rounds_completed,
                total_score: self.state.total_score,
                endless_available: self.endless_available(),
            });
            return true;
        }
        self.enter_setup(board, out);
        true
    }

    /// GameOver -> Endless -> Setup, if enough rounds were completed.
    pub fn start_endless(&mut self, board: &mut Board, out: &mut Vec<SimEvent>) -> bool {
        if self.state.phase != GamePhase::GameOver || !self.endless_available() {
            return false;
        }
        self.state.endless = true;
        self.set_phase(GamePhase::Endless, out);
        out.push(SimEvent::EndlessStarted { round_number: self.state.round_number });
        self.enter_setup(board, out);
        true
    }

    pub fn purchase(
        &mut self,
        catalog: &mut UpgradeCatalog,
        id: &str,
        out: &mut Vec<SimEvent>,
    ) -> Result<(), PurchaseError> {
        if self.state.phase != GamePhase::Parameterization {
            return Err(PurchaseError::WrongPhase);
        }
        let s = &mut self.state;
        catalog.purchase(id, s.round_number, &mut s.stars_available, &mut s.params, out)
    }

    /// Overwrite the persistent progress. The game resumes between rounds.
    pub fn restore(
        &mut self,
        round_number: u32,
        total_score: u64,
        stars_earned: u32,
        stars_available: u32,
        rounds_completed: u32,
        params: RoundParams,
    ) {
        let s = &mut self.state;
        s.round_number = round_number;
        s.total_score = total_score;
        s.stars_earned = stars_earned;
        s.stars_available = stars_available;
        s.rounds_completed = rounds_completed;
        s.params = params;
        s.endless = round_number > self.rules.max_rounds;
        s.phase = if round_number == 0 { GamePhase::Title } else { GamePhase::Parameterization };
        s.phase_timer = 0.0;
        s.round_timer = 0.0;
        s.chaos_failed = false;
        s.chaos_particles = 0;
        s.tally = RoundTally::new(multiplier_for(0, &self.scoring));
        s.last_breakdown = None;
    }

    // ── Phase entry ────────────────────────────────────────────

    fn enter_setup(&mut self, board: &mut Board, out: &mut Vec<SimEvent>) {
        self.set_phase(GamePhase::Setup, out);
        let cleared = board.clear_round_entities();
        board.set_size(self.state.params.board_size);
        self.state.params.board_size = board.size();
        if cleared > 0 {
            out.push(SimEvent::ChaosCleared { count: cleared });
        }

        let multiplier = multiplier_for(0, &self.scoring);
        self.state.tally = RoundTally::new(multiplier);
        self.state.chaos_particles = 0;
        self.state.chaos_failed = false;
        out.push(SimEvent::MultiplierChanged { multiplier, particles: 0 });
        out.push(SimEvent::RoundSetupStarted {
            round_number: self.state.round_number,
            params: self.state.params.clone(),
        });
    }

    fn enter_active(&mut self, out: &mut Vec<SimEvent>) {
        self.set_phase(GamePhase::Active, out);
        self.state.round_timer = self.state.params.round_duration;
        out.push(SimEvent::RoundActiveStarted {
            round_number: self.state.round_number,
            duration: self.state.params.round_duration,
            spawn_interval: self.state.params.guy_spawn_interval,
            guy_type_count: self.state.params.guy_type_count,
        });
    }

    fn end_round(&mut self, result: RoundResult, out: &mut Vec<SimEvent>) {
        self.set_phase(GamePhase::Resolution, out);
        out.push(SimEvent::RoundEnded { round_number: self.state.round_number, result });

        let s = &mut self.state;
        let breakdown = s.tally.breakdown(result, &self.scoring);
        let stars = breakdown.stars.count();
        s.total_score += s.tally.round_score;
        s.stars_earned += stars;
        s.stars_available += stars;
        s.rounds_completed += 1;
        log::info!(
            "round {} {result:?}: score {}, {stars} stars, {} tantrums",
            s.round_number,
            s.tally.round_score,
            s.tally.tantrums
        );
        out.push(SimEvent::ScoreRoundTallied {
            round_number: s.round_number,
            round_score: s.tally.round_score,
            stars_earned: stars,
            breakdown: breakdown.clone(),
        });
        s.last_breakdown = Some(breakdown);
    }

    // ── Scoring ────────────────────────────────────────────────

    fn penalize(&mut self, reason: PenaltyReason, amount: u64, out: &mut Vec<SimEvent>) {
        let taken = self.state.tally.record_penalty(amount);
        out.push(SimEvent::PenaltyApplied {
            reason,
            amount,
            round_score: self.state.tally.round_score,
        });
        if taken > 0 {
            out.push(SimEvent::ScoreChanged {
                round_score: self.state.tally.round_score,
                delta: -(taken as i64),
            });
        }
    }

    fn set_particles(&mut self, particles: u32, out: &mut Vec<SimEvent>) {
        self.state.chaos_particles = particles;
        let multiplier = multiplier_for(particles, &self.scoring);
        if self.state.tally.set_multiplier(multiplier) {
            out.push(SimEvent::MultiplierChanged { multiplier, particles });
        }
    }

    fn handle(&mut self, event: &SimEvent, out: &mut Vec<SimEvent>) {
        let active = self.state.phase == GamePhase::Active;
        match event {
            SimEvent::ThingReturned { thing_type, .. } if active => {
                let base = self.thing_types.get(thing_type).base_score;
                let delta = self.state.tally.record_return(base);
                out.push(SimEvent::ScoreChanged {
                    round_score: self.state.tally.round_score,
                    delta: delta as i64,
                });
            }
            SimEvent::GuyTantrum { .. } if active => {
                self.state.tally.tantrums += 1;
                self.penalize(PenaltyReason::Tantrum, self.scoring.tantrum_penalty, out);
            }
            SimEvent::BoxEmptied { .. } if active => {
                self.state.tally.empty_box_events += 1;
                self.penalize(PenaltyReason::BoxEmptied, self.scoring.empty_box_penalty, out);
            }
            SimEvent::ChaosParticleSpawned { total, .. } => self.set_particles(*total, out),
            SimEvent::ChaosCleared { .. } => self.set_particles(0, out),
            SimEvent::ChaosExceeded { .. } if active => self.state.chaos_failed = true,
            _ => {}
        }
    }
}

impl SimSubsystem for RoundSubsystem {
    fn name(&self) -> &'static str {
        "round"
    }

    fn update(
        &mut self,
        ctx: &FrameCtx,
        board: &mut Board,
        inbox: &mut Vec<SimEvent>,
        _rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        if ctx.paused {
            return Ok(vec![]);
        }
        let mut events = Vec::new();
        for event in std::mem::take(inbox) {
            self.handle(&event, &mut events);
        }

        let dt = ctx.dt;
        self.state.phase_timer += dt;
        match self.state.phase {
            GamePhase::Setup => {
                if self.state.phase_timer >= self.rules.setup_duration {
                    self.enter_active(&mut events);
                }
            }
            GamePhase::Active => {
                let (stocked, total) = board.stock_summary();
                self.state.tally.sample_stock(stocked, total, dt);
                self.state.round_timer = (self.state.round_timer - dt).max(0.0);
                if self.state.chaos_failed {
                    self.end_round(RoundResult::Failure, &mut events);
                } else if self.state.round_timer <= 0.0 {
                    self.end_round(RoundResult::Victory, &mut events);
                }
            }
            GamePhase::Resolution => {
                if let Some(after) = self.rules.resolution_auto_advance_secs {
                    if self.state.phase_timer >= after {
                        self.continue_to_parameterization(&mut events);
                    }
                }
            }
            GamePhase::Title | GamePhase::Parameterization | GamePhase::GameOver | GamePhase::Endless => {}
        }
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Actor, Vec2};

    struct Rig {
        round: RoundSubsystem,
        board: Board,
        rng:   SubsystemRng,
    }

    impl Rig {
        fn new(config: SimConfig) -> Self {
            Self {
                board: Board::new(config.board.clone(), None),
                round: RoundSubsystem::new(&config).unwrap(),
                rng:   SubsystemRng::new(1, 0),
            }
        }

        fn frame(&mut self, inbox: Vec<SimEvent>) -> Vec<SimEvent> {
            let ctx = FrameCtx { tick: 0, dt: 0.5, paused: false };
            let mut inbox = inbox;
            self.round.update(&ctx, &mut self.board, &mut inbox, &mut self.rng).unwrap()
        }

        fn to_active(&mut self) {
            self.round.start_game(&mut self.board, &mut Vec::new());
            while self.round.phase() != GamePhase::Active {
                self.frame(vec![]);
            }
        }
    }

    fn returned() -> SimEvent {
        SimEvent::ThingReturned { thing: 1, box_id: 1, thing_type: "ball".into() }
    }

    #[test]
    fn returns_only_score_while_active() {
        let mut rig = Rig::new(SimConfig::default());
        rig.round.start_game(&mut rig.board, &mut Vec::new());
        rig.frame(vec![returned()]);
        assert_eq!(rig.round.state().tally.round_score, 0, "setup stocking is free");

        rig.to_active();
        let out = rig.frame(vec![returned()]);
        assert_eq!(rig.round.state().tally.round_score, 15, "ball is 10 at x1.5");
        assert!(out.contains(&SimEvent::ScoreChanged { round_score: 15, delta: 15 }));
    }

    #[test]
    fn penalties_never_push_score_negative() {
        let mut rig = Rig::new(SimConfig::default());
        rig.to_active();
        rig.frame(vec![
            returned(),
            SimEvent::GuyTantrum { guy: 1, position: Vec2::ZERO },
            SimEvent::BoxEmptied { box_id: 1, by: Actor::Guy(1) },
        ]);
        let t = &rig.round.state().tally;
        assert_eq!(t.round_score, 0);
        assert_eq!(t.tantrums, 1);
        assert_eq!(t.empty_box_events, 1);
    }

    #[test]
    fn particles_move_the_multiplier() {
        let mut rig = Rig::new(SimConfig::default());
        rig.to_active();
        let out = rig.frame(vec![SimEvent::ChaosParticleSpawned { particle: 1, position: Vec2::ZERO, total: 45 }]);
        assert!(out.contains(&SimEvent::MultiplierChanged { multiplier: 0.5, particles: 45 }));
        let out = rig.frame(vec![SimEvent::ChaosCleared { count: 45 }]);
        assert!(out.contains(&SimEvent::MultiplierChanged { multiplier: 1.5, particles: 0 }));
        assert_eq!(rig.round.state().tally.lowest_multiplier, 0.5);
    }

    #[test]
    fn chaos_exceeded_fails_the_round() {
        let mut rig = Rig::new(SimConfig::default());
        rig.to_active();
        let out = rig.frame(vec![SimEvent::ChaosExceeded { ratio: 0.95 }]);
        assert_eq!(rig.round.phase(), GamePhase::Resolution);
        assert!(out.contains(&SimEvent::RoundEnded { round_number: 1, result: RoundResult::Failure }));
        let b = rig.round.state().last_breakdown.clone().unwrap();
        assert!(!b.stars.survived);
    }

    #[test]
    fn timer_expiry_is_victory_with_three_stars_when_clean() {
        let mut rig = Rig::new(SimConfig::default());
        rig.to_active();
        let mut frames = 0;
        while rig.round.phase() == GamePhase::Active {
            rig.frame(vec![]);
            frames += 1;
        }
        assert_eq!(frames, 240, "120 s at 0.5 s per frame");
        let s = rig.round.state();
        assert_eq!(s.phase, GamePhase::Resolution);
        // No boxes on this board: the stocked star is lost, the others stand.
        let b = s.last_breakdown.clone().unwrap();
        assert_eq!(b.result, RoundResult::Victory);
        assert!(b.stars.survived && b.stars.calm && !b.stars.stocked);
        assert_eq!(s.stars_available, 2);
        assert_eq!(s.rounds_completed, 1);
    }

    #[test]
    fn continue_waits_for_the_minimum_display_time() {
        let mut rig = Rig::new(SimConfig::default());
        rig.to_active();
        rig.frame(vec![SimEvent::ChaosExceeded { ratio: 1.0 }]);
        assert!(!rig.round.continue_to_parameterization(&mut Vec::new()));
        rig.frame(vec![]);
        rig.frame(vec![]);
        assert!(rig.round.continue_to_parameterization(&mut Vec::new()));
        assert_eq!(rig.round.phase(), GamePhase::Parameterization);
    }

    #[test]
    fn auto_advance_leaves_resolution_on_its_own() {
        let mut config = SimConfig::default();
        config.round.resolution_auto_advance_secs = Some(2.0);
        let mut rig = Rig::new(config);
        rig.to_active();
        rig.frame(vec![SimEvent::ChaosExceeded { ratio: 1.0 }]);
        for _ in 0..4 {
            rig.frame(vec![]);
        }
        assert_eq!(rig.round.phase(), GamePhase::Parameterization);
    }

    #[test]
    fn game_ends_after_the_last_round_and_endless_unlocks() {
        let mut config = SimConfig::default();
        config.round.max_rounds = 2;
        config.round.min_rounds_for_endless = 2;
        let mut rig = Rig::new(config);
        rig.to_active();
        for round in 1..=2 {
            assert_eq!(rig.round.state().round_number, round);
            rig.frame(vec![SimEvent::ChaosExceeded { ratio: 1.0 }]);
            rig.frame(vec![]);
            rig.frame(vec![]);
            assert!(rig.round.continue_to_parameterization(&mut Vec::new()));
            let mut out = Vec::new();
            assert!(rig.round.start_next_round(&mut rig.board, &mut out));
            if round == 1 {
                while rig.round.phase() != GamePhase::Active {
                    rig.frame(vec![]);
                }
            } else {
                assert!(out.iter().any(|e| matches!(e, SimEvent::GameOver { endless_available: true, .. })));
            }
        }
        assert_eq!(rig.round.phase(), GamePhase::GameOver);

        let mut out = Vec::new();
        assert!(rig.round.start_endless(&mut rig.board, &mut out));
        assert_eq!(rig.round.phase(), GamePhase::Setup);
        assert!(rig.round.state().endless);
        assert!(out.contains(&SimEvent::EndlessStarted { round_number: 3 }));
    }

    #[test]
    fn purchases_only_between_rounds() {
        let mut rig = Rig::new(SimConfig::default());
        let mut catalog = UpgradeCatalog::new(SimConfig::default().upgrades);
        assert_eq!(rig.round.purchase(&mut catalog, "extra_box", &mut Vec::new()), Err(PurchaseError::WrongPhase));
    }
}
