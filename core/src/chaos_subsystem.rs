//! Chaos subsystem.
//!
//! Tantrums leave particles on the floor. They burst outward, slide to a
//! stop and stay until the next round setup clears the board. This
//! subsystem moves them and turns their count into the messiness ratio:
//!   - crossing `warning_ratio` publishes ChaosWarning (once per crossing)
//!   - reaching `failure_ratio` during Active publishes ChaosExceeded,
//!     which the round subsystem turns into a failed round

use crate::{
    board::Board,
    clock::FrameCtx,
    config::ChaosConfig,
    error::SimResult,
    event::SimEvent,
    rng::SubsystemRng,
    scoring::messiness_ratio,
    subsystem::SimSubsystem,
    types::{ParticleId, Vec2},
};
use serde::{Deserialize, Serialize};

/// Below this speed a particle is considered at rest.
const SETTLE_SPEED: f32 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChaosParticle {
    pub id:       ParticleId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub settled:  bool,
}

impl ChaosParticle {
    /// A particle flung out of `origin` in a random direction.
    pub fn burst(id: ParticleId, origin: Vec2, spread: f32, speed: f32, rng: &mut SubsystemRng) -> Self {
        let dir = rng.unit_vec();
        Self {
            id,
            position: origin + dir * rng.range_f32(0.0, spread),
            velocity: dir * speed * rng.range_f32(0.5, 1.0),
            settled: false,
        }
    }

    fn step(&mut self, dt: f32, drag: f32, min: Vec2, max: Vec2) {
        if self.settled {
            return;
        }
        self.position = (self.position + self.velocity * dt).clamp(min, max);
        self.velocity *= (-drag * dt).exp();
        if self.velocity.length() < SETTLE_SPEED {
            self.velocity = Vec2::ZERO;
            self.settled = true;
        }
    }
}

pub struct ChaosSubsystem {
    cfg:      ChaosConfig,
    active:   bool,
    ratio:    f32,
    warned:   bool,
    exceeded: bool,
}

impl ChaosSubsystem {
    pub fn new(cfg: ChaosConfig) -> Self {
        Self { cfg, active: false, ratio: 0.0, warned: false, exceeded: false }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    fn handle(&mut self, event: &SimEvent) {
        match event {
            SimEvent::RoundSetupStarted { .. } => {
                self.active = false;
                self.warned = false;
                self.exceeded = false;
            }
            SimEvent::RoundActiveStarted { .. } => self.active = true,
            SimEvent::RoundEnded { .. } => self.active = false,
            _ => {}
        }
    }
}

impl SimSubsystem for ChaosSubsystem {
    fn name(&self) -> &'static str {
        "chaos"
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
        for event in std::mem::take(inbox) {
            self.handle(&event);
        }

        let bounds = board.bounds();
        for p in board.particles.values_mut() {
            p.step(ctx.dt, self.cfg.drag, bounds.min, bounds.max);
        }

        let mut events = Vec::new();
        let ratio = messiness_ratio(
            board.particles.len() as u32,
            board.area_tiles(),
            self.cfg.coverage_per_tile,
        );
        if (ratio - self.ratio).abs() > 1e-6 {
            self.ratio = ratio;
            events.push(SimEvent::MessinessChanged { ratio });
        }

        if ratio < self.cfg.warning_ratio {
            self.warned = false;
        } else if !self.warned {
            self.warned = true;
            log::info!("chaos: messiness {ratio:.2} entered warning band");
            events.push(SimEvent::ChaosWarning { ratio });
        }

        if self.active && !self.exceeded && ratio >= self.cfg.failure_ratio {
            self.exceeded = true;
            log::warn!("chaos: messiness {ratio:.2} exceeded failure threshold");
            events.push(SimEvent::ChaosExceeded { ratio });
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
    use crate::{config::SimConfig, params::RoundParams, types::BoardSize};

    fn frame() -> FrameCtx {
        FrameCtx { tick: 1, dt: 0.1, paused: false }
    }

    fn fill(board: &mut Board, n: u32) {
        for _ in 0..n {
            let id = board.alloc_id();
            board.register_particle(ChaosParticle { id, position: Vec2::ZERO, velocity: Vec2::ZERO, settled: true });
        }
    }

    #[test]
    fn particles_slide_to_rest_inside_the_board() {
        let cfg = SimConfig::default();
        let mut board = Board::new(cfg.board.clone(), Some(BoardSize::new(8, 6)));
        board.register_particle(ChaosParticle {
            id: 1,
            position: Vec2::ZERO,
            velocity: Vec2::new(5_000.0, 0.0),
            settled: false,
        });
        let mut chaos = ChaosSubsystem::new(cfg.chaos);
        let mut rng = SubsystemRng::new(1, 5);
        for _ in 0..200 {
            chaos.update(&frame(), &mut board, &mut Vec::new(), &mut rng).unwrap();
        }
        let p = &board.particles[&1];
        assert!(p.settled);
        assert!(board.is_inside(p.position));
    }

    #[test]
    fn warning_then_exceeded_only_while_active() {
        let cfg = SimConfig::default();
        let mut board = Board::new(cfg.board.clone(), Some(BoardSize::new(16, 12)));
        let mut chaos = ChaosSubsystem::new(cfg.chaos.clone());
        let mut rng = SubsystemRng::new(1, 5);
        let capacity = (board.area_tiles() as f32 * cfg.chaos.coverage_per_tile) as u32;

        fill(&mut board, capacity);
        let out = chaos.update(&frame(), &mut board, &mut Vec::new(), &mut rng).unwrap();
        assert!(out.iter().any(|e| matches!(e, SimEvent::ChaosWarning { .. })));
        assert!(!out.iter().any(|e| matches!(e, SimEvent::ChaosExceeded { .. })), "not active yet");

        let mut inbox = vec![SimEvent::RoundActiveStarted {
            round_number: 1,
            duration: 120.0,
            spawn_interval: RoundParams::default().guy_spawn_interval,
            guy_type_count: 1,
        }];
        let out = chaos.update(&frame(), &mut board, &mut inbox, &mut rng).unwrap();
        assert!(inbox.is_empty());
        assert!(out.iter().any(|e| matches!(e, SimEvent::ChaosExceeded { ratio } if *ratio == 1.0)));
        assert!(!out.iter().any(|e| matches!(e, SimEvent::ChaosWarning { .. })), "already warned");

        let out = chaos.update(&frame(), &mut board, &mut Vec::new(), &mut rng).unwrap();
        assert!(out.is_empty(), "exceeded fires once");
    }

    #[test]
    fn paused_leaves_inbox_queued() {
        let cfg = SimConfig::default();
        let mut board = Board::new(cfg.board.clone(), None);
        let mut chaos = ChaosSubsystem::new(cfg.chaos);
        let mut inbox = vec![SimEvent::ChaosCleared { count: 0 }];
        let ctx = FrameCtx { paused: true, ..frame() };
        chaos.update(&ctx, &mut board, &mut inbox, &mut SubsystemRng::new(1, 5)).unwrap();
        assert_eq!(inbox.len(), 1);
    }
}
