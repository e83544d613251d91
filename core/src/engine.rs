//! The simulation engine: owns the board, the clock, the RNG bank, the
//! event bus, the round state machine and the upgrade catalog.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Round subsystem        (phase timers, scoring)
//!   2. Box spawner subsystem
//!   3. Guy spawner subsystem
//!   4. Guy subsystem
//!   5. Thing subsystem        (player, held things, auto-collection)
//!   6. Chaos subsystem        (particles, messiness)
//!
//! RULES:
//!   - Subsystems execute in registration order, every frame.
//!   - No subsystem calls another subsystem's functions directly.
//!   - Every published event lands in every other subsystem's inbox, in
//!     publication order, and is drained on that subsystem's next update.
//!   - All randomness flows through the RngBank.
//!   - All events are recorded in the event log and published on the bus.
//!
//! The round subsystem is held by type rather than in the boxed list: the
//! request methods below call into it directly and dispatch whatever it
//! publishes through the same path as a frame update.

use std::collections::VecDeque;

use crate::{
    board::Board,
    box_spawner_subsystem::BoxSpawnerSubsystem,
    chaos_subsystem::ChaosSubsystem,
    clock::{FrameCtx, SimClock},
    command::{PlayerCommand, QueuedCommand},
    config::SimConfig,
    error::{PurchaseError, SimResult},
    event::{EventLogEntry, GamePhase, SimEvent},
    event_bus::EventBus,
    guy_spawner_subsystem::GuySpawnerSubsystem,
    guy_subsystem::GuySubsystem,
    player,
    rng::{RngBank, SubsystemRng, SubsystemSlot},
    round_subsystem::{GameState, RoundSubsystem},
    snapshot::GameSnapshot,
    subsystem::SimSubsystem,
    thing_subsystem::ThingSubsystem,
    types::{RunId, Tick, Vec2},
    upgrade::{ParamPreview, Upgrade, UpgradeCatalog},
};

struct Registered {
    slot:      SubsystemSlot,
    subsystem: Box<dyn SimSubsystem>,
    rng:       SubsystemRng,
    inbox:     Vec<SimEvent>,
}

pub struct SimEngine {
    pub run_id:   RunId,
    pub clock:    SimClock,
    pub rng_bank: RngBank,
    seed:         u64,
    config:       SimConfig,
    board:        Board,
    round:        RoundSubsystem,
    round_rng:    SubsystemRng,
    round_inbox:  Vec<SimEvent>,
    subsystems:   Vec<Registered>,
    catalog:      UpgradeCatalog,
    bus:          EventBus,
    event_log:    VecDeque<EventLogEntry>,
    commands:     Vec<QueuedCommand>,
}

impl SimEngine {
    /// A fresh random run id.
    pub fn new_run_id() -> RunId {
        format!("run-{}", uuid::Uuid::new_v4())
    }

    /// Build a fully wired engine with every subsystem registered in the
    /// documented order. Publishes `run.initialized`.
    pub fn build(run_id: RunId, seed: u64, config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let rng_bank = RngBank::new(seed);
        let mut engine = Self {
            clock:       SimClock::new(run_id.clone()),
            board:       Board::new(config.board.clone(), Some(config.initial_params.board_size)),
            round:       RoundSubsystem::new(&config)?,
            round_rng:   rng_bank.for_subsystem(SubsystemSlot::Round),
            round_inbox: Vec::new(),
            subsystems:  Vec::new(),
            catalog:     UpgradeCatalog::new(config.upgrades.clone()),
            bus:         EventBus::new(),
            event_log:   VecDeque::new(),
            commands:    Vec::new(),
            rng_bank,
            seed,
            run_id,
            config,
        };

        engine.register_all()?;

        log::info!(
            "engine: run {} seed {seed} preset {:?}, {} subsystems",
            engine.run_id,
            engine.config.preset,
            engine.subsystems.len() + 1
        );
        let init = SimEvent::RunInitialized { run_id: engine.run_id.clone(), seed };
        engine.dispatch(None, "engine", &[init])?;
        Ok(engine)
    }

    /// (Re)create every frame subsystem with a fresh stream and an empty
    /// inbox.
    fn register_all(&mut self) -> SimResult<()> {
        self.subsystems.clear();
        // EXECUTION ORDER: fixed, documented, never reordered.
        self.register(SubsystemSlot::BoxSpawner, Box::new(BoxSpawnerSubsystem::new(&self.config)?));
        self.register(SubsystemSlot::GuySpawner, Box::new(GuySpawnerSubsystem::new(&self.config)?));
        self.register(
            SubsystemSlot::Guys,
            Box::new(GuySubsystem::new(self.config.guys.clone(), self.config.chaos.burst_speed)),
        );
        self.register(SubsystemSlot::Things, Box::new(ThingSubsystem::new()));
        self.register(SubsystemSlot::Chaos, Box::new(ChaosSubsystem::new(self.config.chaos.clone())));
        Ok(())
    }

    fn register(&mut self, slot: SubsystemSlot, subsystem: Box<dyn SimSubsystem>) {
        let rng = self.rng_bank.for_subsystem(slot);
        self.subsystems.push(Registered { slot, subsystem, rng, inbox: Vec::new() });
    }

    // ── Frame loop ─────────────────────────────────────────────

    /// Advance one frame of `dt` seconds. Returns every event published
    /// this frame, in publication order.
    pub fn tick(&mut self, dt: f32) -> SimResult<Vec<SimEvent>> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let tick = self.clock.advance(dt);
        let ctx = FrameCtx { tick, dt, paused: self.clock.paused };
        let mut frame_events = Vec::new();

        let events = self.round.update(&ctx, &mut self.board, &mut self.round_inbox, &mut self.round_rng)?;
        self.dispatch(Some(SubsystemSlot::Round), "round", &events)?;
        frame_events.extend(events);

        for i in 0..self.subsystems.len() {
            let reg = &mut self.subsystems[i];
            let events = reg.subsystem.update(&ctx, &mut self.board, &mut reg.inbox, &mut reg.rng)?;
            let (slot, name) = (reg.slot, reg.subsystem.name());
            self.dispatch(Some(slot), name, &events)?;
            frame_events.extend(events);
        }
        Ok(frame_events)
    }

    /// Run `frames` frames of `dt` each.
    pub fn run_for(&mut self, frames: u64, dt: f32) -> SimResult<()> {
        for _ in 0..frames {
            self.tick(dt)?;
        }
        Ok(())
    }

    /// Log, fan out to every inbox except the source's own, then publish.
    fn dispatch(&mut self, source: Option<SubsystemSlot>, name: &str, events: &[SimEvent]) -> SimResult<()> {
        let tick = self.clock.current_tick;
        for event in events {
            self.event_log.push_back(EventLogEntry {
                run_id:     self.run_id.clone(),
                tick,
                subsystem:  name.to_string(),
                event_type: event.name().to_string(),
                payload:    serde_json::to_string(event)?,
            });
            if source != Some(SubsystemSlot::Round) {
                self.round_inbox.push(event.clone());
            }
            for reg in &mut self.subsystems {
                if source != Some(reg.slot) {
                    reg.inbox.push(event.clone());
                }
            }
            self.bus.publish(event);
        }
        let capacity = self.config.event_log_capacity;
        if self.event_log.len() > capacity {
            let excess = self.event_log.len() - capacity;
            self.event_log.drain(..excess);
        }
        Ok(())
    }

    /// Dispatch events produced by a request on the round state machine.
    fn dispatch_round(&mut self, events: Vec<SimEvent>) -> bool {
        match self.dispatch(Some(SubsystemSlot::Round), "round", &events) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("engine: could not record request events: {e}");
                false
            }
        }
    }

    // ── Requests ───────────────────────────────────────────────

    pub fn request_start_game(&mut self) -> bool {
        let mut out = Vec::new();
        self.round.start_game(&mut self.board, &mut out) && self.dispatch_round(out)
    }

    /// Pause the Active phase. False outside Active or when already paused.
    pub fn request_pause(&mut self) -> bool {
        if self.round.phase() != GamePhase::Active || self.clock.paused {
            return false;
        }
        self.clock.pause();
        log::info!("engine: paused at tick {}", self.clock.current_tick);
        self.dispatch_round(vec![SimEvent::PauseChanged { paused: true }])
    }

    pub fn request_resume(&mut self) -> bool {
        if self.round.phase() != GamePhase::Active || !self.clock.paused {
            return false;
        }
        self.clock.resume();
        log::info!("engine: resumed at tick {}", self.clock.current_tick);
        self.dispatch_round(vec![SimEvent::PauseChanged { paused: false }])
    }

    pub fn request_continue_to_parameterization(&mut self) -> bool {
        let mut out = Vec::new();
        self.round.continue_to_parameterization(&mut out) && self.dispatch_round(out)
    }

    pub fn request_start_next_round(&mut self) -> bool {
        let mut out = Vec::new();
        self.round.start_next_round(&mut self.board, &mut out) && self.dispatch_round(out)
    }

    pub fn request_endless_mode(&mut self) -> bool {
        let mut out = Vec::new();
        self.round.start_endless(&mut self.board, &mut out) && self.dispatch_round(out)
    }

    /// Buy an upgrade. Rejections are logged and reported as `false`;
    /// use [`try_purchase`](Self::try_purchase) for the reason.
    pub fn request_purchase(&mut self, upgrade_id: &str) -> bool {
        match self.try_purchase(upgrade_id) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("engine: purchase rejected: {e}");
                false
            }
        }
    }

    pub fn try_purchase(&mut self, upgrade_id: &str) -> Result<(), PurchaseError> {
        let mut out = Vec::new();
        self.round.purchase(&mut self.catalog, upgrade_id, &mut out)?;
        // The purchase itself has already landed; only its record is missing.
        if !self.dispatch_round(out) {
            log::warn!("engine: upgrade {upgrade_id} bought but its events were not recorded");
        }
        Ok(())
    }

    pub fn preview_upgrade(&self, upgrade_id: &str) -> Option<ParamPreview> {
        self.catalog.preview(upgrade_id, self.round.params(), self.round.avg_base_score())
    }

    /// Upgrades that would be accepted right now, ignoring the phase.
    pub fn available_upgrades(&self) -> Vec<&Upgrade> {
        let s = self.round.state();
        self.catalog.available(s.round_number.max(1), s.stars_available)
    }

    /// Walk the player toward `(x, y)`, clamped to the board.
    pub fn request_move_player(&mut self, x: f32, y: f32) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let target = self.board.clamp_to_board(Vec2::new(x, y), 0.0);
        self.board.player.target = Some(target);
        true
    }

    pub fn request_pick_up(&mut self) -> bool {
        if self.clock.paused {
            return false;
        }
        let mut out = Vec::new();
        player::pick_up_nearest(&mut self.board, &mut out).is_some() && self.dispatch_player(out)
    }

    pub fn request_drop(&mut self) -> bool {
        if self.clock.paused {
            return false;
        }
        let mut out = Vec::new();
        player::drop_held(&mut self.board, &mut out) && self.dispatch_player(out)
    }

    fn dispatch_player(&mut self, events: Vec<SimEvent>) -> bool {
        match self.dispatch(None, "player", &events) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("engine: could not record player events: {e}");
                false
            }
        }
    }

    /// Route a serialized command to its request method.
    pub fn apply_command(&mut self, command: PlayerCommand) -> bool {
        let received = SimEvent::PlayerCommandReceived { command_type: command.type_name().to_string() };
        self.dispatch_player(vec![received]);
        self.commands.push(QueuedCommand {
            run_id:    self.run_id.clone(),
            queued_at: self.clock.current_tick,
            command:   command.clone(),
        });
        match command {
            PlayerCommand::StartGame                  => self.request_start_game(),
            PlayerCommand::Pause                      => self.request_pause(),
            PlayerCommand::Resume                     => self.request_resume(),
            PlayerCommand::ContinueToParameterization => self.request_continue_to_parameterization(),
            PlayerCommand::StartNextRound             => self.request_start_next_round(),
            PlayerCommand::StartEndless               => self.request_endless_mode(),
            PlayerCommand::Purchase { upgrade_id }    => self.request_purchase(&upgrade_id),
            PlayerCommand::MovePlayer { x, y }        => self.request_move_player(x, y),
            PlayerCommand::PickUp                     => self.request_pick_up(),
            PlayerCommand::Drop                       => self.request_drop(),
        }
    }

    // ── Persistence ────────────────────────────────────────────

    pub fn snapshot(&self) -> GameSnapshot {
        let s = self.round.state();
        GameSnapshot {
            run_id:             self.run_id.clone(),
            round_number:       s.round_number,
            total_score:        s.total_score,
            stars_earned:       s.stars_earned,
            stars_available:    s.stars_available,
            rounds_completed:   s.rounds_completed,
            purchased_upgrades: self.catalog.purchased_ids(),
            params:             s.params.clone(),
            saved_at:           chrono::Utc::now(),
        }
    }

    /// Restore persistent progress. The board is cleared, the frame
    /// subsystems start over, and the game resumes between rounds (or on
    /// the title screen for round 0). A paused game is unpaused and says so.
    pub fn restore(&mut self, snapshot: &GameSnapshot) -> SimResult<()> {
        let cleared = self.board.clear_round_entities();
        self.board.set_size(snapshot.params.board_size);
        let was_paused = self.clock.paused;
        self.clock.resume();
        self.register_all()?;
        self.round_inbox.clear();
        self.catalog.restore_purchased(&snapshot.purchased_upgrades);
        self.round.restore(
            snapshot.round_number,
            snapshot.total_score,
            snapshot.stars_earned,
            snapshot.stars_available,
            snapshot.rounds_completed,
            snapshot.params.clone(),
        );
        log::info!(
            "engine: restored round {} with {} stars available",
            snapshot.round_number,
            snapshot.stars_available
        );
        let mut events = Vec::new();
        if was_paused {
            events.push(SimEvent::PauseChanged { paused: false });
        }
        if cleared > 0 {
            events.push(SimEvent::ChaosCleared { count: cleared });
        }
        if !events.is_empty() {
            self.dispatch(Some(SubsystemSlot::Round), "round", &events)?;
        }
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> &GameState {
        self.round.state()
    }

    pub fn phase(&self) -> GamePhase {
        self.round.phase()
    }

    pub fn catalog(&self) -> &UpgradeCatalog {
        &self.catalog
    }

    pub fn event_log(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.event_log.iter()
    }

    /// Log entries recorded on `tick`. Used by the determinism test.
    pub fn events_for_tick(&self, tick: Tick) -> Vec<&EventLogEntry> {
        self.event_log.iter().filter(|e| e.tick == tick).collect()
    }

    pub fn command_history(&self) -> &[QueuedCommand] {
        &self.commands
    }

    /// Downcast a registered subsystem. For tests and tooling only.
    pub fn subsystem<T: 'static>(&self) -> Option<&T> {
        self.subsystems
            .iter()
            .find_map(|r| r.subsystem.as_any().downcast_ref::<T>())
    }
}
