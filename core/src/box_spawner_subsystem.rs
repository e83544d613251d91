//! Box spawner subsystem.
//!
//! Listens for RoundSetupStarted. Clears the previous round's boxes and
//! things, lays out `box_count` boxes around the edges, and stocks each
//! one with `things_per_box` things of its type.
//!
//! Layout: edges are assigned round-robin (N, E, S, W, N, ...). On its
//! edge a box prefers the evenly spaced slot for its position in that
//! edge's sequence, then the nearest slot that keeps `min_box_spacing`
//! from every placed box. If the edge has none, any unused slot on the
//! board is picked at random.

use crate::{
    board::Board,
    clock::FrameCtx,
    config::SimConfig,
    error::SimResult,
    event::SimEvent,
    game_box::GameBox,
    params::RoundParams,
    registry::ThingTypeRegistry,
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    thing::Thing,
    types::{BoxId, Edge, ThingTypeId, Vec2},
};
use std::collections::BTreeMap;

pub struct BoxSpawnerSubsystem {
    thing_types:   ThingTypeRegistry,
    spacing_tiles: f32,
}

impl BoxSpawnerSubsystem {
    pub fn new(config: &SimConfig) -> SimResult<Self> {
        Ok(Self {
            thing_types:   ThingTypeRegistry::new("thing_types", config.thing_types.clone())?,
            spacing_tiles: config.spawning.min_box_spacing_tiles,
        })
    }

    /// The thing types used this round, cycling through the unlocked list
    /// when more are asked for than exist.
    fn select_types(&self, round: u32, count: u32) -> Vec<ThingTypeId> {
        let mut unlocked = self.thing_types.unlocked(round);
        if unlocked.is_empty() {
            unlocked.push(self.thing_types.default_entry());
        }
        (0..count.max(1) as usize)
            .map(|i| unlocked[i % unlocked.len()].id.clone())
            .collect()
    }

    /// Slot positions for `count` boxes.
    pub fn layout(&self, board: &Board, count: u32, rng: &mut SubsystemRng) -> Vec<(Edge, Vec2)> {
        let min_spacing = self.spacing_tiles * board.tile();
        let mut per_edge: BTreeMap<Edge, usize> = BTreeMap::new();
        for i in 0..count as usize {
            *per_edge.entry(Edge::ALL[i % 4]).or_default() += 1;
        }

        let mut nth: BTreeMap<Edge, usize> = BTreeMap::new();
        let mut placed: Vec<(Edge, Vec2)> = Vec::new();
        for i in 0..count as usize {
            let edge = Edge::ALL[i % 4];
            let n = nth.entry(edge).or_default();
            let k = per_edge.get(&edge).copied().unwrap_or(1);
            let slots = board.slots(edge);

            let spaced = |p: Vec2| placed.iter().all(|(_, q)| q.distance(p) >= min_spacing);
            let preferred = if slots.is_empty() {
                None
            } else {
                let ideal = ((2 * *n + 1) * slots.len() / (2 * k)) as isize;
                let mut order: Vec<usize> = (0..slots.len()).collect();
                order.sort_by_key(|j| (*j as isize - ideal).abs());
                order.into_iter().map(|j| slots[j]).find(|p| spaced(*p))
            };
            *n += 1;

            let pick = preferred.map(|p| (edge, p)).or_else(|| {
                let unused: Vec<(Edge, Vec2)> = Edge::ALL
                    .iter()
                    .flat_map(|e| board.slots(*e).iter().map(move |p| (*e, *p)))
                    .filter(|(_, p)| placed.iter().all(|(_, q)| q.distance(*p) > 1e-3))
                    .collect();
                rng.index(unused.len()).map(|j| unused[j])
            });
            match pick {
                Some(slot) => placed.push(slot),
                None => {
                    log::warn!("box_spawner: board has no free slot for box {}", i + 1);
                    break;
                }
            }
        }
        placed
    }

    fn place_boxes(
        &self,
        board: &mut Board,
        round: u32,
        params: &RoundParams,
        rng: &mut SubsystemRng,
        out: &mut Vec<SimEvent>,
    ) {
        let stale_boxes: Vec<BoxId> = board.boxes.keys().copied().collect();
        for id in stale_boxes {
            board.unregister_box(id);
        }
        let stale_things: Vec<_> = board.things.keys().copied().collect();
        for id in stale_things {
            board.unregister_thing(id);
        }

        let types = self.select_types(round, params.thing_type_count);
        let box_radius = board.config().box_radius;
        let thing_radius = board.config().thing_radius;

        let mut placed = Vec::new();
        for (i, (edge, position)) in self.layout(board, params.box_count, rng).into_iter().enumerate() {
            let type_id = types[i % types.len()].clone();
            let id = board.alloc_id();
            board.register_box(GameBox::new(id, type_id.clone(), position, box_radius, edge));
            out.push(SimEvent::BoxSpawned { box_id: id, thing_type: type_id.clone(), position, edge });
            placed.push((id, type_id, position));
        }

        for (box_id, type_id, position) in &placed {
            for _ in 0..params.things_per_box {
                let mut thing = Thing::new(board.alloc_id(), type_id.clone(), *position, thing_radius);
                out.push(SimEvent::ThingSpawned {
                    thing: thing.id,
                    thing_type: type_id.clone(),
                    position: *position,
                });
                if let Some(b) = board.boxes.get_mut(box_id) {
                    b.add_thing(&mut thing, out);
                }
                board.register_thing(thing);
            }
        }

        log::debug!(
            "box_spawner: round {round}: {} boxes, {} things each, types {:?}",
            placed.len(),
            params.things_per_box,
            types
        );
        out.push(SimEvent::BoxesPlaced { count: placed.len() as u32 });
    }
}

impl SimSubsystem for BoxSpawnerSubsystem {
    fn name(&self) -> &'static str {
        "box_spawner"
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
        let mut events = Vec::new();
        for event in std::mem::take(inbox) {
            if let SimEvent::RoundSetupStarted { round_number, params } = event {
                self.place_boxes(board, round_number, &params, rng, &mut events);
            }
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
    use crate::types::BoardSize;

    fn setup(params: RoundParams, round: u32) -> (Board, Vec<SimEvent>) {
        let cfg = SimConfig::default();
        let mut board = Board::new(cfg.board.clone(), Some(params.board_size));
        let mut spawner = BoxSpawnerSubsystem::new(&cfg).unwrap();
        let mut inbox = vec![SimEvent::RoundSetupStarted { round_number: round, params }];
        let ctx = FrameCtx { tick: 1, dt: 0.1, paused: false };
        let events = spawner
            .update(&ctx, &mut board, &mut inbox, &mut SubsystemRng::new(3, 1))
            .unwrap();
        (board, events)
    }

    #[test]
    fn boxes_go_round_robin_and_are_stocked() {
        let params = RoundParams::default();
        let (board, events) = setup(params.clone(), 1);
        assert_eq!(board.boxes.len(), params.box_count as usize);

        let edges: Vec<Edge> = board.boxes.values().map(|b| b.edge).collect();
        assert_eq!(edges, Edge::ALL.to_vec());
        for b in board.boxes.values() {
            assert!(board.is_inside(b.position));
            assert_eq!(b.count(), params.things_per_box);
            for id in b.things() {
                assert_eq!(board.things[id].type_id, b.type_id);
                assert_eq!(board.things[id].container(), Some(b.id));
            }
        }
        assert_eq!(events.last(), Some(&SimEvent::BoxesPlaced { count: params.box_count }));
    }

    #[test]
    fn types_cycle_through_the_unlocked_list() {
        let params = RoundParams { thing_type_count: 5, box_count: 6, ..RoundParams::default() };
        let (board, _) = setup(params, 1);
        let types: Vec<&str> = board.boxes.values().map(|b| b.type_id.as_str()).collect();
        // Round 1 unlocks three types; the fourth and fifth wrap around.
        assert_eq!(types, vec!["ball", "block", "cone", "ball", "block", "ball"]);
    }

    #[test]
    fn spacing_is_kept_when_slots_allow() {
        let params = RoundParams { box_count: 12, ..RoundParams::default() };
        let (board, _) = setup(params, 1);
        let min = SimConfig::default().spawning.min_box_spacing_tiles * board.tile();
        let positions: Vec<Vec2> = board.boxes.values().map(|b| b.position).collect();
        assert_eq!(positions.len(), 12);
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(a.distance(*b) >= min - 1e-3, "{a} and {b} too close");
            }
        }
    }

    #[test]
    fn crowded_board_falls_back_to_free_slots() {
        let params = RoundParams {
            box_count: 30,
            board_size: BoardSize::new(8, 6),
            ..RoundParams::default()
        };
        let (board, _) = setup(params, 1);
        let positions: Vec<Vec2> = board.boxes.values().map(|b| b.position).collect();
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(a.distance(*b) > 1e-3, "two boxes share a slot");
            }
        }
        assert!(positions.len() <= 30);
    }

    #[test]
    fn setup_clears_the_previous_round() {
        let cfg = SimConfig::default();
        let params = RoundParams::default();
        let mut board = Board::new(cfg.board.clone(), None);
        let mut spawner = BoxSpawnerSubsystem::new(&cfg).unwrap();
        let ctx = FrameCtx { tick: 1, dt: 0.1, paused: false };
        let mut rng = SubsystemRng::new(3, 1);
        for round in 1..=2 {
            let mut inbox = vec![SimEvent::RoundSetupStarted { round_number: round, params: params.clone() }];
            spawner.update(&ctx, &mut board, &mut inbox, &mut rng).unwrap();
        }
        assert_eq!(board.boxes.len(), params.box_count as usize);
        assert_eq!(board.things.len(), (params.box_count * params.things_per_box) as usize);
    }
}
