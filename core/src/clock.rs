//! Simulation clock: owns frame count, elapsed time, and the pause flag.

use crate::types::{RunId, Tick};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub run_id:       RunId,
    pub current_tick: Tick,
    /// Simulated seconds elapsed while not paused.
    pub elapsed:      f64,
    pub paused:       bool,
}

impl SimClock {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            current_tick: 0,
            elapsed: 0.0,
            paused: false,
        }
    }

    /// Advance one frame. Returns the new tick number.
    /// Frames still count while paused; simulated time does not.
    pub fn advance(&mut self, dt: f32) -> Tick {
        self.current_tick += 1;
        if !self.paused {
            self.elapsed += f64::from(dt);
        }
        self.current_tick
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }
}

/// Per-frame inputs handed to every subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCtx {
    pub tick:   Tick,
    pub dt:     f32,
    pub paused: bool,
}
