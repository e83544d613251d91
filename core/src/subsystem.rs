//! Subsystem trait.
//!
//! RULE: Every per-frame system implements SimSubsystem.
//! The engine calls update() on each registered subsystem
//! in registration order, every frame.
//! Execution order is fixed and documented in engine.rs.

use crate::{
    board::Board,
    clock::FrameCtx,
    error::SimResult,
    event::SimEvent,
    rng::SubsystemRng,
};
use std::any::Any;

/// The contract every subsystem must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per frame by the engine.
    ///
    /// - `ctx`:   frame number, delta time and the pause flag
    /// - `board`: the shared board; the only mutable world state
    /// - `inbox`: events published by other subsystems since this one last
    ///            drained it, in publication order. Leave it untouched while
    ///            paused so nothing is lost.
    /// - `rng`:   this subsystem's own persistent stream
    ///
    /// Returns the events this subsystem publishes this frame.
    fn update(
        &mut self,
        ctx: &FrameCtx,
        board: &mut Board,
        inbox: &mut Vec<SimEvent>,
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>>;

    /// For downcasting in tests and tooling only.
    /// Production sim code never uses this.
    fn as_any(&self) -> &dyn Any;
}
