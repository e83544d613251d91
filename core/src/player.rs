//! The player avatar and its pick-up / drop actions.
//!
//! Input polling lives outside the core: the host sets a move target and
//! calls the actions; the thing subsystem advances the avatar each frame.

use crate::{
    board::Board,
    event::SimEvent,
    types::{Actor, ThingId, Vec2},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub position: Vec2,
    pub target:   Option<Vec2>,
    pub held:     Option<ThingId>,
    /// World units per second.
    pub speed:    f32,
    /// How far away a thing can be grabbed from.
    pub reach:    f32,
}

impl Player {
    pub fn new(position: Vec2, speed: f32, reach: f32) -> Self {
        Self { position, target: None, held: None, speed, reach }
    }

    /// Walk toward the current target, stopping on arrival.
    pub fn step(&mut self, dt: f32) {
        let Some(target) = self.target else { return };
        let to = target - self.position;
        let stride = self.speed * dt;
        if to.length() <= stride {
            self.position = target;
            self.target = None;
        } else {
            self.position += to.normalize_or_zero() * stride;
        }
    }
}

/// Pick up a loose thing within reach. Refuses if the player is already
/// holding something, the thing is missing, out of reach, or held by a guy.
pub fn pick_up(board: &mut Board, thing_id: ThingId, out: &mut Vec<SimEvent>) -> bool {
    if board.player.held.is_some() {
        return false;
    }
    let (pos, reach) = (board.player.position, board.player.reach);
    let Some(thing) = board.things.get_mut(&thing_id) else {
        return false;
    };
    if !thing.collision_enabled() || thing.position.distance(pos) > reach + thing.radius {
        return false;
    }
    if !thing.pick_up_by_player(out) {
        return false;
    }
    board.player.held = Some(thing_id);
    true
}

/// Pick up the closest loose thing within reach, if any.
pub fn pick_up_nearest(board: &mut Board, out: &mut Vec<SimEvent>) -> Option<ThingId> {
    let pos = board.player.position;
    let reach = board.player.reach;
    let nearest = board
        .things_near(pos, reach + board.config().thing_radius)
        .into_iter()
        .min_by(|a, b| a.position.distance_squared(pos).total_cmp(&b.position.distance_squared(pos)))
        .map(|t| t.id)?;
    pick_up(board, nearest, out).then_some(nearest)
}

/// Put the held thing down at the player's feet. A drop that lands on a
/// matching box is collected by the thing subsystem on its next update.
pub fn drop_held(board: &mut Board, out: &mut Vec<SimEvent>) -> bool {
    let Some(id) = board.player.held.take() else {
        return false;
    };
    let pos = board.clamp_to_board(board.player.position, 0.0);
    match board.things.get_mut(&id) {
        Some(thing) if thing.is_held_by_player() => {
            thing.drop_at(pos, Actor::Player, out);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SimConfig, thing::Thing, types::BoardSize};

    fn board_with_thing(at: Vec2) -> Board {
        let mut b = Board::new(SimConfig::default().board, Some(BoardSize::new(16, 12)));
        b.register_thing(Thing::new(1, "ball".into(), at, 8.0));
        b
    }

    #[test]
    fn pick_up_requires_reach() {
        let mut out = Vec::new();
        let mut b = board_with_thing(Vec2::new(500.0, 0.0));
        assert!(!pick_up(&mut b, 1, &mut out));
        b.things.get_mut(&1).unwrap().position = Vec2::new(10.0, 0.0);
        assert!(pick_up(&mut b, 1, &mut out));
        assert_eq!(b.player.held, Some(1));
    }

    #[test]
    fn player_cannot_take_from_guy() {
        let mut out = Vec::new();
        let mut b = board_with_thing(Vec2::ZERO);
        b.things.get_mut(&1).unwrap().pick_up_by_guy(4, &mut out);
        assert!(!pick_up(&mut b, 1, &mut out));
        assert_eq!(pick_up_nearest(&mut b, &mut out), None);
    }

    #[test]
    fn drop_frees_thing_at_player() {
        let mut out = Vec::new();
        let mut b = board_with_thing(Vec2::ZERO);
        assert_eq!(pick_up_nearest(&mut b, &mut out), Some(1));
        b.player.position = Vec2::new(40.0, 20.0);
        assert!(drop_held(&mut b, &mut out));
        let t = &b.things[&1];
        assert!(t.is_free());
        assert_eq!(t.position, Vec2::new(40.0, 20.0));
        assert!(!drop_held(&mut b, &mut out));
    }

    #[test]
    fn step_arrives_and_clears_target() {
        let mut p = Player::new(Vec2::ZERO, 100.0, 20.0);
        p.target = Some(Vec2::new(50.0, 0.0));
        p.step(0.25);
        assert_eq!(p.position, Vec2::new(25.0, 0.0));
        p.step(1.0);
        assert_eq!(p.position, Vec2::new(50.0, 0.0));
        assert!(p.target.is_none());
    }
}
