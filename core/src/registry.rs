//! Static type tables for Things and Guys, with round-based unlock gating.
//!
//! Lookups never fail: an unknown id resolves to the first entry of the
//! table (the designated default) and logs a warning. `require` is the
//! strict variant used when validating configuration.

use crate::{
    error::{SimError, SimResult},
    types::{GuyTypeId, ThingTypeId},
};
use serde::{Deserialize, Serialize};

/// RGB color used by the presentation layer.
pub type Color = [u8; 3];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
    Diamond,
    Star,
    Hexagon,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThingType {
    pub id:           ThingTypeId,
    pub name:         String,
    pub color:        Color,
    pub shape:        Shape,
    pub unlock_round: u32,
    pub base_score:   u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTag {
    Normal,
    Scavenger,
    Thief,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuyType {
    pub id:                GuyTypeId,
    pub name:              String,
    pub color:             Color,
    /// World units per second.
    pub speed:             f32,
    /// Seconds of seeking/waiting before the guy starts longing.
    pub patience:          f32,
    /// Seconds spent longing before a tantrum.
    pub longing_duration:  f32,
    pub tantrum_particles: u32,
    pub behavior:          BehaviorTag,
    pub unlock_round:      u32,
}

impl GuyType {
    pub fn prefers_empty_boxes(&self) -> bool {
        self.behavior == BehaviorTag::Scavenger
    }

    pub fn steals_from_player(&self) -> bool {
        self.behavior == BehaviorTag::Thief
    }

    pub fn drops_multiple(&self) -> bool {
        self.behavior == BehaviorTag::Thief
    }
}

/// Anything that can live in a [`TypeRegistry`].
pub trait RegistryEntry {
    fn id(&self) -> &str;
    fn unlock_round(&self) -> u32;
}

impl RegistryEntry for ThingType {
    fn id(&self) -> &str { &self.id }
    fn unlock_round(&self) -> u32 { self.unlock_round }
}

impl RegistryEntry for GuyType {
    fn id(&self) -> &str { &self.id }
    fn unlock_round(&self) -> u32 { self.unlock_round }
}

/// An ordered table of entries. Order is significant: the first entry is
/// the fallback default, and unlock lists preserve table order.
#[derive(Debug, Clone)]
pub struct TypeRegistry<T> {
    name:    &'static str,
    entries: Vec<T>,
}

impl<T: RegistryEntry> TypeRegistry<T> {
    pub fn new(name: &'static str, entries: Vec<T>) -> SimResult<Self> {
        if entries.is_empty() {
            return Err(SimError::EmptyRegistry { name });
        }
        Ok(Self { name, entries })
    }

    /// Look up by id, falling back to the default entry.
    pub fn get(&self, id: &str) -> &T {
        match self.find(id) {
            Some(entry) => entry,
            None => {
                log::warn!("{}: unknown id '{id}', using default '{}'", self.name, self.default_entry().id());
                self.default_entry()
            }
        }
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn default_entry(&self) -> &T {
        &self.entries[0]
    }

    /// Entries whose unlock round has been reached, in table order.
    pub fn unlocked(&self, round: u32) -> Vec<&T> {
        self.entries.iter().filter(|e| e.unlock_round() <= round).collect()
    }

    pub fn all(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type ThingTypeRegistry = TypeRegistry<ThingType>;
pub type GuyTypeRegistry = TypeRegistry<GuyType>;

impl ThingTypeRegistry {
    pub fn require(&self, id: &str) -> SimResult<&ThingType> {
        self.find(id).ok_or_else(|| SimError::UnknownThingType { id: id.to_string() })
    }
}

impl GuyTypeRegistry {
    pub fn require(&self, id: &str) -> SimResult<&GuyType> {
        self.find(id).ok_or_else(|| SimError::UnknownGuyType { id: id.to_string() })
    }
}

pub fn default_thing_types() -> Vec<ThingType> {
    let t = |id: &str, name: &str, color: Color, shape: Shape, unlock_round: u32, base_score: u32| ThingType {
        id: id.into(),
        name: name.into(),
        color,
        shape,
        unlock_round,
        base_score,
    };
    vec![
        t("ball",   "Ball",   [231, 76, 60],  Shape::Circle,   1, 10),
        t("block",  "Block",  [52, 152, 219], Shape::Square,   1, 10),
        t("cone",   "Cone",   [241, 196, 15], Shape::Triangle, 1, 12),
        t("gem",    "Gem",    [155, 89, 182], Shape::Diamond,  2, 15),
        t("star",   "Star",   [230, 126, 34], Shape::Star,     3, 18),
        t("nut",    "Nut",    [46, 204, 113], Shape::Hexagon,  4, 20),
        t("marble", "Marble", [26, 188, 156], Shape::Circle,   5, 25),
        t("brick",  "Brick",  [192, 57, 43],  Shape::Square,   6, 30),
    ]
}

pub fn default_guy_types() -> Vec<GuyType> {
    vec![
        GuyType {
            id: "normal".into(),
            name: "Grabby".into(),
            color: [236, 112, 99],
            speed: 70.0,
            patience: 9.0,
            longing_duration: 5.0,
            tantrum_particles: 6,
            behavior: BehaviorTag::Normal,
            unlock_round: 1,
        },
        GuyType {
            id: "scavenger".into(),
            name: "Scrounger".into(),
            color: [133, 193, 233],
            speed: 85.0,
            patience: 7.0,
            longing_duration: 4.0,
            tantrum_particles: 8,
            behavior: BehaviorTag::Scavenger,
            unlock_round: 2,
        },
        GuyType {
            id: "thief".into(),
            name: "Sneak".into(),
            color: [88, 214, 141],
            speed: 95.0,
            patience: 6.0,
            longing_duration: 3.5,
            tantrum_particles: 10,
            behavior: BehaviorTag::Thief,
            unlock_round: 4,
        },
    ]
}
