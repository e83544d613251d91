//! Guy spawner subsystem: the in-round difficulty ramp.
//!
//! Armed by RoundActiveStarted, disarmed by RoundEnded and
//! RoundSetupStarted. While armed and unpaused it accumulates time; each
//! time the interval elapses it attempts a spawn and shortens the
//! interval: `interval = max(min_interval, interval * decay)`.

use crate::{
    board::Board,
    clock::FrameCtx,
    config::{BehaviorPreset, SimConfig, SpawnConfig, SpawnPlacement},
    error::SimResult,
    event::SimEvent,
    game_box::GameBox,
    guy::Guy,
    registry::{BehaviorTag, GuyType, GuyTypeRegistry},
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    types::BoxId,
};

/// One escalation step. Never increases, never goes below `min`.
pub fn escalate_interval(interval: f32, decay: f32, min: f32) -> f32 {
    if interval <= min {
        return interval;
    }
    (interval * decay).max(min)
}

pub struct GuySpawnerSubsystem {
    guy_types:      GuyTypeRegistry,
    cfg:            SpawnConfig,
    preset:         BehaviorPreset,
    active:         bool,
    elapsed:        f32,
    interval:       f32,
    round_number:   u32,
    guy_type_count: u32,
}

impl GuySpawnerSubsystem {
    pub fn new(config: &SimConfig) -> SimResult<Self> {
        Ok(Self {
            guy_types:      GuyTypeRegistry::new("guy_types", config.guy_types.clone())?,
            cfg:            config.spawning.clone(),
            preset:         config.preset,
            active:         false,
            elapsed:        0.0,
            interval:       config.initial_params.guy_spawn_interval,
            round_number:   1,
            guy_type_count: config.initial_params.guy_type_count,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    fn handle(&mut self, event: &SimEvent) {
        match event {
            SimEvent::RoundActiveStarted { round_number, spawn_interval, guy_type_count, .. } => {
                self.active = true;
                self.elapsed = 0.0;
                self.interval = *spawn_interval;
                self.round_number = *round_number;
                self.guy_type_count = *guy_type_count;
            }
            SimEvent::RoundEnded { .. } | SimEvent::RoundSetupStarted { .. } => self.active = false,
            _ => {}
        }
    }

    /// Round-gated weighted pick, limited to the first `guy_type_count`
    /// unlocked types. Normal guys weigh more.
    fn choose_type(&self, rng: &mut SubsystemRng) -> GuyType {
        let mut candidates = self.guy_types.unlocked(self.round_number);
        candidates.truncate(self.guy_type_count.max(1) as usize);
        if candidates.is_empty() {
            return self.guy_types.default_entry().clone();
        }
        let weights: Vec<f64> = candidates
            .iter()
            .map(|g| match g.behavior {
                BehaviorTag::Normal => self.cfg.normal_weight,
                _ => self.cfg.special_weight,
            })
            .collect();
        let i = rng.weighted_index(&weights).unwrap_or(0);
        candidates[i].clone()
    }

    /// Scavengers go for the least stocked box that still has something;
    /// everyone else picks weighted by stock. Any box as a last resort.
    fn choose_target(kind: &GuyType, board: &Board, rng: &mut SubsystemRng) -> Option<BoxId> {
        let boxes: Vec<&GameBox> = board.boxes.values().collect();
        if kind.prefers_empty_boxes() {
            if let Some(b) = boxes.iter().filter(|b| !b.is_empty()).min_by_key(|b| b.count()) {
                return Some(b.id);
            }
        } else {
            let weights: Vec<f64> = boxes.iter().map(|b| f64::from(b.count())).collect();
            if let Some(i) = rng.weighted_index(&weights) {
                return Some(boxes[i].id);
            }
        }
        rng.index(boxes.len()).map(|i| boxes[i].id)
    }

    fn try_spawn(&self, board: &mut Board, rng: &mut SubsystemRng, out: &mut Vec<SimEvent>) {
        board.prune_stale();
        let live = board.guys.values().filter(|g| !g.state().is_terminal()).count();
        if live >= self.cfg.max_concurrent_guys {
            log::debug!("guy_spawner: cap of {} reached, skipping", self.cfg.max_concurrent_guys);
            return;
        }

        let kind = self.choose_type(rng);
        let Some(target) = Self::choose_target(&kind, board, rng) else {
            log::debug!("guy_spawner: no box to target, skipping");
            return;
        };
        let Some((edge, preferred)) = board.boxes.get(&target).map(|b| (b.edge, b.type_id.clone())) else {
            return;
        };

        // Guys leave the way they came: through the spawn edge, or the
        // edge nearest a central spawn point.
        let (position, exit_edge) = match self.preset.placement() {
            SpawnPlacement::OppositeEdge => (board.exit_position(Some(edge.opposite()), rng), edge.opposite()),
            SpawnPlacement::CentralZone => {
                let p = Board::random_in_rect(board.spawn_zone(), rng);
                (p, board.nearest_edge(p))
            }
        };
        let exit = board.exit_position(Some(exit_edge), rng);

        let id = board.alloc_id();
        let guy_type = kind.id.clone();
        let mut guy = Guy::new(id, kind, self.preset.movement(), position);
        guy.initialize(target, preferred, exit);
        board.register_guy(guy);

        log::debug!("guy_spawner: {guy_type} guy {id} spawned, targeting box {target}");
        out.push(SimEvent::GuySpawned { guy: id, guy_type, position, target_box: target });
    }
}

impl SimSubsystem for GuySpawnerSubsystem {
    fn name(&self) -> &'static str {
        "guy_spawner"
    }

    fn update(
        &mut self,
        ctx: &FrameCtx,
        board: &mut Board,
        inbox: &mut Vec<SimEvent>,
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        if ctx.paused {
            return Ok(vec![]);
        }
        for event in std::mem::take(inbox) {
            self.handle(&event);
        }
        if !self.active {
            return Ok(vec![]);
        }

        let mut events = Vec::new();
        self.elapsed += ctx.dt;
        if self.elapsed >= self.interval {
            self.elapsed = 0.0;
            self.try_spawn(board, rng, &mut events);
            let next = escalate_interval(self.interval, self.cfg.interval_decay, self.cfg.min_interval);
            if next != self.interval {
                self.interval = next;
                events.push(SimEvent::SpawnIntervalChanged { interval: next });
            }
        }
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
