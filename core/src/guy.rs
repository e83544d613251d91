//! Guys: roaming agents that steal things from boxes and scatter them.
//!
//! This file holds the agent's data and its bookkeeping rules (which
//! states accumulate patience, what entering a state resets). The decision
//! logic that needs the board lives in `guy_subsystem`.

use crate::{
    event::SimEvent,
    movement::{ArcPath, MovementModel},
    registry::GuyType,
    types::{BoxId, GuyId, ThingId, ThingTypeId, Vec2},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuyState {
    Spawning,
    SeekingBox,
    AtBox,
    Carrying,
    Dropping,
    Leaving,
    Longing,
    Tantrum,
    Despawned,
}

impl GuyState {
    /// Patience only runs while the guy still wants something.
    pub fn accumulates_patience(self) -> bool {
        matches!(self, Self::SeekingBox | Self::AtBox | Self::Longing)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Despawned
    }

    /// States in which the guy walks somewhere.
    pub fn is_moving(self) -> bool {
        matches!(self, Self::SeekingBox | Self::Carrying | Self::Leaving | Self::Longing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guy {
    pub id:             GuyId,
    pub kind:           GuyType,
    pub movement:       MovementModel,
    pub position:       Vec2,
    pub velocity:       Vec2,
    pub target_box:     Option<BoxId>,
    pub carried:        Option<ThingId>,
    pub preferred_type: Option<ThingTypeId>,
    pub exit_position:  Vec2,
    pub drop_target:    Option<Vec2>,
    /// Seconds spent wanting without getting.
    pub patience:       f32,
    /// Seconds spent in the current state.
    pub state_timer:    f32,
    pub path:           Option<ArcPath>,
    /// Seconds since `path` was computed.
    pub path_age:       f32,
    state:              GuyState,
}

impl Guy {
    pub fn new(id: GuyId, kind: GuyType, movement: MovementModel, position: Vec2) -> Self {
        Self {
            id,
            kind,
            movement,
            position,
            velocity: Vec2::ZERO,
            target_box: None,
            carried: None,
            preferred_type: None,
            exit_position: position,
            drop_target: None,
            patience: 0.0,
            state_timer: 0.0,
            path: None,
            path_age: 0.0,
            state: GuyState::Spawning,
        }
    }

    /// Hand the freshly spawned guy its goal.
    pub fn initialize(&mut self, target_box: BoxId, preferred_type: ThingTypeId, exit_position: Vec2) {
        self.target_box = Some(target_box);
        self.preferred_type = Some(preferred_type);
        self.exit_position = exit_position;
    }

    pub fn state(&self) -> GuyState {
        self.state
    }

    /// Move to `to`, resetting the state timer and any cached path.
    /// Entering `Carrying` clears patience. A no-op for the same state.
    pub fn transition(&mut self, to: GuyState, out: &mut Vec<SimEvent>) {
        if to == self.state || self.state.is_terminal() {
            return;
        }
        let from = self.state;
        self.state = to;
        self.state_timer = 0.0;
        self.path = None;
        self.path_age = 0.0;
        if to == GuyState::Carrying {
            self.patience = 0.0;
        }
        if !matches!(to, GuyState::Carrying | GuyState::Dropping | GuyState::Tantrum) {
            self.drop_target = None;
        }
        if !to.is_moving() {
            self.velocity = Vec2::ZERO;
        }
        log::debug!("guy {}: {from:?} -> {to:?}", self.id);
        out.push(SimEvent::GuyStateChanged { guy: self.id, from, to });
    }

    /// Advance timers by `dt`.
    pub fn tick_timers(&mut self, dt: f32) {
        self.state_timer += dt;
        self.path_age += dt;
        if self.state.accumulates_patience() {
            self.patience += dt;
        }
    }

    pub fn patience_exhausted(&self) -> bool {
        self.patience >= self.kind.patience
    }

    pub fn longing_expired(&self) -> bool {
        self.state == GuyState::Longing && self.state_timer >= self.kind.longing_duration
    }
}
