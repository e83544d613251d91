//! Things: typed collectibles that belong in a matching box.
//!
//! Ownership is a single enum, so "held by the player", "held by a guy" and
//! "in a box" are mutually exclusive by construction. Every transition
//! pushes its event into the caller's outbox.

use crate::{
    event::SimEvent,
    types::{Actor, BoxId, GuyId, ThingId, ThingTypeId, Vec2},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "by", rename_all = "snake_case")]
pub enum ThingState {
    Free,
    HeldByPlayer,
    HeldByGuy(GuyId),
    InBox(BoxId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing {
    pub id:         ThingId,
    pub type_id:    ThingTypeId,
    pub position:   Vec2,
    pub radius:     f32,
    state:          ThingState,
}

impl Thing {
    pub fn new(id: ThingId, type_id: ThingTypeId, position: Vec2, radius: f32) -> Self {
        Self { id, type_id, position, radius, state: ThingState::Free }
    }

    pub fn state(&self) -> ThingState {
        self.state
    }

    pub fn is_free(&self) -> bool {
        self.state == ThingState::Free
    }

    pub fn is_held_by_player(&self) -> bool {
        self.state == ThingState::HeldByPlayer
    }

    pub fn is_held_by_guy(&self) -> bool {
        matches!(self.state, ThingState::HeldByGuy(_))
    }

    pub fn holder_guy(&self) -> Option<GuyId> {
        match self.state {
            ThingState::HeldByGuy(g) => Some(g),
            _ => None,
        }
    }

    pub fn container(&self) -> Option<BoxId> {
        match self.state {
            ThingState::InBox(b) => Some(b),
            _ => None,
        }
    }

    /// Collision (auto-collection, player reach) only applies to loose things.
    pub fn collision_enabled(&self) -> bool {
        self.is_free()
    }

    /// Refuses if someone already holds it. A thing sitting in a box is
    /// detached; the caller is responsible for the box side.
    pub fn pick_up_by_player(&mut self, out: &mut Vec<SimEvent>) -> bool {
        self.pick_up(ThingState::HeldByPlayer, Actor::Player, out)
    }

    pub fn pick_up_by_guy(&mut self, guy: GuyId, out: &mut Vec<SimEvent>) -> bool {
        self.pick_up(ThingState::HeldByGuy(guy), Actor::Guy(guy), out)
    }

    fn pick_up(&mut self, next: ThingState, by: Actor, out: &mut Vec<SimEvent>) -> bool {
        if self.is_held_by_player() || self.is_held_by_guy() {
            return false;
        }
        self.state = next;
        out.push(SimEvent::ThingPickedUp { thing: self.id, by });
        true
    }

    pub fn drop_at(&mut self, position: Vec2, by: Actor, out: &mut Vec<SimEvent>) {
        self.position = position;
        self.state = ThingState::Free;
        out.push(SimEvent::ThingDropped { thing: self.id, position, by });
    }

    pub fn place_in_box(&mut self, box_id: BoxId, box_center: Vec2, out: &mut Vec<SimEvent>) {
        self.state = ThingState::InBox(box_id);
        self.position = box_center;
        out.push(SimEvent::ThingReturned {
            thing: self.id,
            box_id,
            thing_type: self.type_id.clone(),
        });
    }

    pub fn scatter_from_box(&mut self, by: Actor, position: Vec2, out: &mut Vec<SimEvent>) {
        let box_id = self.container().unwrap_or_default();
        self.state = ThingState::Free;
        self.position = position;
        out.push(SimEvent::ThingScattered { thing: self.id, box_id, position, by });
    }

    pub fn overlaps(&self, center: Vec2, radius: f32) -> bool {
        self.position.distance(center) <= self.radius + radius
    }
}
