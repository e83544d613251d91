//! The board: spatial bounds, edge slot geometry, and the directory of
//! every entity alive in the current round.
//!
//! The origin is the board centre; `bounds.min` is the north-west corner
//! (north = negative y). Every spatial query is a linear scan; a round
//! never holds more than a few dozen entities.

use std::collections::BTreeMap;

use crate::{
    chaos_subsystem::ChaosParticle,
    config::BoardConfig,
    game_box::GameBox,
    guy::Guy,
    player::Player,
    rng::SubsystemRng,
    thing::Thing,
    types::{BoardSize, BoxId, Edge, GuyId, ParticleId, Rect, ThingId, Vec2},
};

#[derive(Debug, Clone)]
pub struct Board {
    config:        BoardConfig,
    size:          BoardSize,
    bounds:        Rect,
    slots:         BTreeMap<Edge, Vec<Vec2>>,
    pub boxes:     BTreeMap<BoxId, GameBox>,
    pub things:    BTreeMap<ThingId, Thing>,
    pub guys:      BTreeMap<GuyId, Guy>,
    pub particles: BTreeMap<ParticleId, ChaosParticle>,
    pub player:    Player,
    next_id:       u64,
}

impl Board {
    /// A board of `size` tiles, or the configured fallback size.
    pub fn new(config: BoardConfig, size: Option<BoardSize>) -> Self {
        let player = Player::new(Vec2::ZERO, config.player_speed, config.player_reach);
        let mut board = Self {
            size: config.fallback_size,
            bounds: Rect::centered(Vec2::ZERO),
            slots: BTreeMap::new(),
            boxes: BTreeMap::new(),
            things: BTreeMap::new(),
            guys: BTreeMap::new(),
            particles: BTreeMap::new(),
            player,
            next_id: 0,
            config,
        };
        board.set_size(size.unwrap_or(board.config.fallback_size));
        board
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn size(&self) -> BoardSize {
        self.size
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn tile(&self) -> f32 {
        self.config.tile_size
    }

    pub fn area_tiles(&self) -> u32 {
        self.size.area()
    }

    pub fn slots(&self, edge: Edge) -> &[Vec2] {
        self.slots.get(&edge).map_or(&[], Vec::as_slice)
    }

    // ── Geometry ───────────────────────────────────────────────

    /// Clamp to the configured tile range, then rebuild bounds and slots.
    pub fn set_size(&mut self, size: BoardSize) {
        let min = self.config.min_size;
        let max = self.config.max_size;
        self.size = BoardSize::new(
            size.width.clamp(min.width, max.width),
            size.height.clamp(min.height, max.height),
        );
        let tile = self.config.tile_size;
        let half = Vec2::new(self.size.width as f32, self.size.height as f32) * tile * 0.5;
        self.bounds = Rect::centered(half);
        self.rebuild_slots();
        log::debug!("board: size {}x{} tiles, bounds {:?}", self.size.width, self.size.height, self.bounds);
    }

    fn rebuild_slots(&mut self) {
        let tile = self.config.tile_size;
        let b = self.bounds;
        // Slots sit one tile inside the edge; corners are skipped by the
        // inset of the perpendicular edge plus the padding margin.
        let margin = tile * (1.0 + self.config.corner_padding_tiles as f32);
        let along = |from: f32, to: f32| -> Vec<f32> {
            let mut out = Vec::new();
            let mut v = from + margin;
            while v <= to - margin + f32::EPSILON {
                out.push(v);
                v += tile;
            }
            out
        };
        self.slots.clear();
        let xs = along(b.min.x, b.max.x);
        let ys = along(b.min.y, b.max.y);
        self.slots.insert(Edge::North, xs.iter().map(|x| Vec2::new(*x, b.min.y + tile)).collect());
        self.slots.insert(Edge::South, xs.iter().map(|x| Vec2::new(*x, b.max.y - tile)).collect());
        self.slots.insert(Edge::West, ys.iter().map(|y| Vec2::new(b.min.x + tile, *y)).collect());
        self.slots.insert(Edge::East, ys.iter().map(|y| Vec2::new(b.max.x - tile, *y)).collect());
    }

    pub fn is_inside(&self, p: Vec2) -> bool {
        self.bounds.contains(p)
    }

    pub fn clamp_to_board(&self, p: Vec2, margin: f32) -> Vec2 {
        let r = self.bounds.inset(margin);
        p.clamp(r.min, r.max)
    }

    fn pick_edge(edge: Option<Edge>, rng: &mut SubsystemRng) -> Edge {
        edge.unwrap_or_else(|| Edge::ALL[rng.next_u64_below(4) as usize])
    }

    /// Uniform point inside the play area, one tile away from the walls.
    pub fn random_position(&self, rng: &mut SubsystemRng) -> Vec2 {
        let r = self.bounds.inset(self.config.tile_size);
        Vec2::new(rng.range_f32(r.min.x, r.max.x), rng.range_f32(r.min.y, r.max.y))
    }

    /// Point on the slot line of `edge` (random edge if `None`).
    pub fn random_edge_position(&self, edge: Option<Edge>, rng: &mut SubsystemRng) -> Vec2 {
        let edge = Self::pick_edge(edge, rng);
        let inner = self.bounds.inset(self.config.tile_size);
        match edge {
            Edge::North => Vec2::new(rng.range_f32(inner.min.x, inner.max.x), inner.min.y),
            Edge::South => Vec2::new(rng.range_f32(inner.min.x, inner.max.x), inner.max.y),
            Edge::West  => Vec2::new(inner.min.x, rng.range_f32(inner.min.y, inner.max.y)),
            Edge::East  => Vec2::new(inner.max.x, rng.range_f32(inner.min.y, inner.max.y)),
        }
    }

    /// Point just outside `edge` (random edge if `None`).
    pub fn exit_position(&self, edge: Option<Edge>, rng: &mut SubsystemRng) -> Vec2 {
        let edge = Self::pick_edge(edge, rng);
        let out = self.bounds.inset(-self.config.exit_margin_tiles * self.config.tile_size);
        let b = self.bounds;
        match edge {
            Edge::North => Vec2::new(rng.range_f32(b.min.x, b.max.x), out.min.y),
            Edge::South => Vec2::new(rng.range_f32(b.min.x, b.max.x), out.max.y),
            Edge::West  => Vec2::new(out.min.x, rng.range_f32(b.min.y, b.max.y)),
            Edge::East  => Vec2::new(out.max.x, rng.range_f32(b.min.y, b.max.y)),
        }
    }

    pub fn nearest_edge(&self, p: Vec2) -> Edge {
        let b = self.bounds;
        let dists = [
            (Edge::North, (p.y - b.min.y).abs()),
            (Edge::East,  (b.max.x - p.x).abs()),
            (Edge::South, (b.max.y - p.y).abs()),
            (Edge::West,  (p.x - b.min.x).abs()),
        ];
        dists
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(Edge::North, |(e, _)| *e)
    }

    /// Central rectangle guys appear in under the central-zone preset.
    pub fn spawn_zone(&self) -> Rect {
        let half = self.bounds.size() * 0.5 * self.config.spawn_zone_fraction;
        Rect::centered(half)
    }

    pub fn random_in_rect(rect: Rect, rng: &mut SubsystemRng) -> Vec2 {
        Vec2::new(rng.range_f32(rect.min.x, rect.max.x), rng.range_f32(rect.min.y, rect.max.y))
    }

    // ── Spatial queries ────────────────────────────────────────

    pub fn nearest_box(&self, p: Vec2, type_filter: Option<&str>) -> Option<&GameBox> {
        self.boxes
            .values()
            .filter(|b| type_filter.map_or(true, |t| b.type_id == t))
            .min_by(|a, b| a.position.distance_squared(p).total_cmp(&b.position.distance_squared(p)))
    }

    pub fn boxes_of_type(&self, type_id: &str) -> Vec<&GameBox> {
        self.boxes.values().filter(|b| b.type_id == type_id).collect()
    }

    /// Loose things whose centre lies within `radius` of `p`.
    pub fn things_near(&self, p: Vec2, radius: f32) -> Vec<&Thing> {
        self.things
            .values()
            .filter(|t| t.collision_enabled() && t.position.distance(p) <= radius)
            .collect()
    }

    /// Every thing lying loose on the floor.
    pub fn scattered_things(&self) -> Vec<&Thing> {
        self.things.values().filter(|t| t.is_free()).collect()
    }

    /// (stocked boxes, total boxes).
    pub fn stock_summary(&self) -> (u32, u32) {
        let stocked = self.boxes.values().filter(|b| !b.is_empty()).count() as u32;
        (stocked, self.boxes.len() as u32)
    }

    // ── Registry ───────────────────────────────────────────────

    pub fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn register_box(&mut self, b: GameBox) -> bool {
        insert_once(&mut self.boxes, b.id, b)
    }

    pub fn unregister_box(&mut self, id: BoxId) -> Option<GameBox> {
        self.boxes.remove(&id)
    }

    pub fn register_thing(&mut self, t: Thing) -> bool {
        insert_once(&mut self.things, t.id, t)
    }

    pub fn unregister_thing(&mut self, id: ThingId) -> Option<Thing> {
        if self.player.held == Some(id) {
            self.player.held = None;
        }
        self.things.remove(&id)
    }

    pub fn register_guy(&mut self, g: Guy) -> bool {
        insert_once(&mut self.guys, g.id, g)
    }

    pub fn unregister_guy(&mut self, id: GuyId) -> Option<Guy> {
        self.guys.remove(&id)
    }

    pub fn register_particle(&mut self, p: ChaosParticle) -> bool {
        insert_once(&mut self.particles, p.id, p)
    }

    pub fn unregister_particle(&mut self, id: ParticleId) -> Option<ChaosParticle> {
        self.particles.remove(&id)
    }

    /// Drop dangling ids: box contents without a thing, guys carrying or
    /// targeting something that is gone, a player holding nothing real.
    pub fn prune_stale(&mut self) {
        let Board { boxes, things, guys, player, .. } = self;
        for b in boxes.values_mut() {
            b.prune(|id| things.contains_key(&id));
        }
        for g in guys.values_mut() {
            if g.carried.is_some_and(|id| !things.contains_key(&id)) {
                g.carried = None;
            }
            if g.target_box.is_some_and(|id| !boxes.contains_key(&id)) {
                g.target_box = None;
            }
        }
        if player.held.is_some_and(|id| !things.contains_key(&id)) {
            player.held = None;
        }
    }

    /// Remove every round-scoped entity. Returns the number of chaos
    /// particles that were on the board.
    pub fn clear_round_entities(&mut self) -> u32 {
        let particles = self.particles.len() as u32;
        self.boxes.clear();
        self.things.clear();
        self.guys.clear();
        self.particles.clear();
        self.player.held = None;
        self.player.position = Vec2::ZERO;
        self.player.target = None;
        particles
    }
}

fn insert_once<V>(map: &mut BTreeMap<u64, V>, id: u64, value: V) -> bool {
    if map.contains_key(&id) {
        return false;
    }
    map.insert(id, value);
    true
}
