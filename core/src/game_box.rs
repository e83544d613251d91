//! Boxes: containers that accept one Thing type and behave as a stack.

use crate::{
    event::SimEvent,
    thing::Thing,
    types::{Actor, BoxId, Edge, ThingId, ThingTypeId, Vec2},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameBox {
    pub id:       BoxId,
    pub type_id:  ThingTypeId,
    pub position: Vec2,
    pub radius:   f32,
    pub edge:     Edge,
    things:       Vec<ThingId>,
    was_emptied_this_round: bool,
}

impl GameBox {
    pub fn new(id: BoxId, type_id: ThingTypeId, position: Vec2, radius: f32, edge: Edge) -> Self {
        Self {
            id,
            type_id,
            position,
            radius,
            edge,
            things: Vec::new(),
            was_emptied_this_round: false,
        }
    }

    pub fn things(&self) -> &[ThingId] {
        &self.things
    }

    pub fn count(&self) -> u32 {
        self.things.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }

    pub fn was_emptied_this_round(&self) -> bool {
        self.was_emptied_this_round
    }

    pub fn contains(&self, thing: ThingId) -> bool {
        self.things.contains(&thing)
    }

    pub fn accepts(&self, thing: &Thing) -> bool {
        thing.type_id == self.type_id
    }

    /// Push `thing` onto the stack. No-op (returns false) if it is already
    /// inside or of the wrong type.
    pub fn add_thing(&mut self, thing: &mut Thing, out: &mut Vec<SimEvent>) -> bool {
        if self.contains(thing.id) || !self.accepts(thing) {
            return false;
        }
        let was_empty = self.is_empty();
        self.things.push(thing.id);
        thing.place_in_box(self.id, self.position, out);
        if was_empty {
            out.push(SimEvent::BoxRestocked { box_id: self.id });
        }
        out.push(SimEvent::BoxThingAdded {
            box_id: self.id,
            thing: thing.id,
            count: self.count(),
        });
        true
    }

    /// Id of the thing that `remove_thing` would pop next.
    pub fn top(&self) -> Option<ThingId> {
        self.things.last().copied()
    }

    /// Pop the most recently added thing and scatter it to `position`.
    /// `thing` must be the current top of the stack; pass the lookup result
    /// of [`GameBox::top`]. Returns the removed id.
    pub fn remove_thing(
        &mut self,
        thing: &mut Thing,
        by: Actor,
        position: Vec2,
        out: &mut Vec<SimEvent>,
    ) -> Option<ThingId> {
        if self.top() != Some(thing.id) {
            return None;
        }
        self.things.pop();
        thing.scatter_from_box(by, position, out);
        out.push(SimEvent::BoxThingRemoved {
            box_id: self.id,
            thing: thing.id,
            count: self.count(),
            by,
        });
        if self.is_empty() {
            self.was_emptied_this_round = true;
            out.push(SimEvent::BoxEmptied { box_id: self.id, by });
        }
        Some(thing.id)
    }

    /// Drop ids whose things no longer exist. Does not emit `box.emptied`:
    /// pruning is bookkeeping, not a guy's doing.
    pub fn prune(&mut self, exists: impl Fn(ThingId) -> bool) {
        self.things.retain(|id| exists(*id));
    }

    pub fn overlaps(&self, thing: &Thing) -> bool {
        thing.overlaps(self.position, self.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (GameBox, Vec<Thing>) {
        let b = GameBox::new(1, "ball".into(), Vec2::new(50.0, 0.0), 16.0, Edge::East);
        let things = (10..13).map(|i| Thing::new(i, "ball".into(), Vec2::ZERO, 6.0)).collect();
        (b, things)
    }

    #[test]
    fn stack_discipline_and_empty_flag() {
        let mut out = Vec::new();
        let (mut b, mut things) = setup();
        assert!(b.is_empty());
        for t in &mut things {
            assert!(b.add_thing(t, &mut out));
            assert_eq!(b.is_empty(), b.things().is_empty());
        }
        assert_eq!(b.top(), Some(12));

        for expect in [12, 11, 10] {
            let t = things.iter_mut().find(|t| t.id == expect).unwrap();
            assert_eq!(b.remove_thing(t, Actor::Guy(7), Vec2::ZERO, &mut out), Some(expect));
            assert_eq!(b.is_empty(), b.things().is_empty());
        }
        assert!(b.was_emptied_this_round());
        let emptied = out.iter().filter(|e| matches!(e, SimEvent::BoxEmptied { .. })).count();
        assert_eq!(emptied, 1);
    }

    #[test]
    fn restocked_only_from_empty() {
        let mut out = Vec::new();
        let (mut b, mut things) = setup();
        b.add_thing(&mut things[0], &mut out);
        b.add_thing(&mut things[1], &mut out);
        let restocks = out.iter().filter(|e| matches!(e, SimEvent::BoxRestocked { .. })).count();
        assert_eq!(restocks, 1);
    }

    #[test]
    fn rejects_duplicates_and_wrong_type() {
        let mut out = Vec::new();
        let (mut b, mut things) = setup();
        assert!(b.add_thing(&mut things[0], &mut out));
        assert!(!b.add_thing(&mut things[0], &mut out));
        let mut cone = Thing::new(99, "cone".into(), Vec2::ZERO, 6.0);
        assert!(!b.add_thing(&mut cone, &mut out));
        assert_eq!(b.count(), 1);
    }

    #[test]
    fn remove_requires_top_of_stack() {
        let mut out = Vec::new();
        let (mut b, mut things) = setup();
        b.add_thing(&mut things[0], &mut out);
        b.add_thing(&mut things[1], &mut out);
        assert_eq!(b.remove_thing(&mut things[0], Actor::System, Vec2::ZERO, &mut out), None);
        assert_eq!(b.count(), 2);
    }
}
