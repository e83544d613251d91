//! Thing subsystem.
//!
//! Moves the player toward its target, keeps held things in their
//! holder's hands, and auto-collects: a loose thing touching a box of its
//! own type drops into that box.

use crate::{
    board::Board,
    clock::FrameCtx,
    error::SimResult,
    event::SimEvent,
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    thing::ThingState,
    types::{Actor, BoxId, ThingId},
};

#[derive(Default)]
pub struct ThingSubsystem;

impl ThingSubsystem {
    pub fn new() -> Self {
        Self
    }

    fn follow_holders(board: &mut Board, out: &mut Vec<SimEvent>) {
        let player_pos = board.player.position;
        let mut orphaned = Vec::new();
        for thing in board.things.values_mut() {
            match thing.state() {
                ThingState::HeldByPlayer => thing.position = player_pos,
                ThingState::HeldByGuy(g) => match board.guys.get(&g) {
                    Some(guy) => thing.position = guy.position,
                    None => orphaned.push(thing.id),
                },
                ThingState::Free | ThingState::InBox(_) => {}
            }
        }
        // Holder vanished without dropping: leave it where it was last seen.
        for id in orphaned {
            let Some(thing) = board.things.get(&id) else { continue };
            let at = board.clamp_to_board(thing.position, thing.radius);
            if let Some(thing) = board.things.get_mut(&id) {
                thing.drop_at(at, Actor::System, out);
            }
        }
    }

    fn collect(board: &mut Board, out: &mut Vec<SimEvent>) {
        let matches: Vec<(ThingId, BoxId)> = board
            .scattered_things()
            .into_iter()
            .filter_map(|t| {
                board
                    .boxes
                    .values()
                    .find(|b| b.accepts(t) && b.overlaps(t))
                    .map(|b| (t.id, b.id))
            })
            .collect();
        for (thing_id, box_id) in matches {
            let (Some(b), Some(thing)) = (board.boxes.get_mut(&box_id), board.things.get_mut(&thing_id)) else {
                continue;
            };
            if b.add_thing(thing, out) {
                log::debug!("things: thing {thing_id} collected into box {box_id}");
            }
        }
    }
}

impl SimSubsystem for ThingSubsystem {
    fn name(&self) -> &'static str {
        "things"
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
        inbox.clear();

        let mut events = Vec::new();
        board.player.step(ctx.dt);
        board.player.position = board.clamp_to_board(board.player.position, 0.0);
        Self::follow_holders(board, &mut events);
        Self::collect(board, &mut events);
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimConfig,
        game_box::GameBox,
        player,
        thing::Thing,
        types::{Edge, Vec2},
    };

    fn board() -> Board {
        Board::new(SimConfig::default().board, None)
    }

    fn frame(board: &mut Board) -> Vec<SimEvent> {
        let ctx = FrameCtx { tick: 1, dt: 0.1, paused: false };
        ThingSubsystem::new()
            .update(&ctx, board, &mut Vec::new(), &mut SubsystemRng::new(1, 4))
            .unwrap()
    }

    #[test]
    fn loose_thing_on_matching_box_is_collected() {
        let mut b = board();
        let at = Vec2::new(100.0, 0.0);
        b.register_box(GameBox::new(1, "ball".into(), at, 20.0, Edge::East));
        b.register_box(GameBox::new(2, "cone".into(), -at, 20.0, Edge::West));
        b.register_thing(Thing::new(10, "ball".into(), at + Vec2::new(5.0, 0.0), 8.0));
        b.register_thing(Thing::new(11, "ball".into(), -at, 8.0));

        let events = frame(&mut b);
        assert!(events.contains(&SimEvent::ThingReturned { thing: 10, box_id: 1, thing_type: "ball".into() }));
        assert_eq!(b.things[&10].container(), Some(1));
        assert!(b.things[&11].is_free(), "wrong type stays on the floor");
        assert_eq!(b.boxes[&2].count(), 0);
    }

    #[test]
    fn player_carries_and_delivers() {
        let mut b = board();
        let home = Vec2::new(150.0, 0.0);
        b.register_box(GameBox::new(1, "ball".into(), home, 20.0, Edge::East));
        b.register_thing(Thing::new(10, "ball".into(), Vec2::new(5.0, 0.0), 8.0));

        let mut out = Vec::new();
        assert_eq!(player::pick_up_nearest(&mut b, &mut out), Some(10));
        b.player.target = Some(home);
        for _ in 0..20 {
            frame(&mut b);
        }
        assert_eq!(b.things[&10].position, home);
        assert!(player::drop_held(&mut b, &mut out));
        let events = frame(&mut b);
        assert!(events.iter().any(|e| matches!(e, SimEvent::BoxRestocked { box_id: 1 })));
        assert_eq!(b.boxes[&1].count(), 1);
    }

    #[test]
    fn thing_of_a_vanished_guy_is_dropped() {
        let mut b = board();
        let mut t = Thing::new(10, "ball".into(), Vec2::ZERO, 8.0);
        t.pick_up_by_guy(99, &mut Vec::new());
        b.register_thing(t);
        let events = frame(&mut b);
        assert!(b.things[&10].is_free());
        assert!(events.iter().any(|e| matches!(e, SimEvent::ThingDropped { by: Actor::System, .. })));
    }
}
