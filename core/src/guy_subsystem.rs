//! Guy subsystem: runs every guy's state machine and moves it.
//!
//! Each frame every live guy is taken off the board, advanced, and put
//! back unless it reached Despawned. Taking it off means the rest of the
//! board (boxes, things, other guys, the player) can be borrowed freely
//! while the guy decides.
//!
//! Transitions:
//!   Spawning   -> SeekingBox   spawn timer elapsed
//!   SeekingBox -> Longing      patience exhausted
//!   SeekingBox -> AtBox        within arrival radius of the target box
//!   AtBox      -> Longing      patience exhausted, or box empty after the action delay
//!   AtBox      -> Carrying     box stocked after the action delay
//!   Carrying   -> Dropping     at the drop target
//!   Dropping   -> SeekingBox   re-seek roll passed and a stocked box of the preferred type exists
//!   Dropping   -> Leaving      otherwise
//!   Longing    -> Carrying     reached the target box and it is stocked again
//!   Longing    -> Tantrum      longing timer reached the type's longing duration
//!   Tantrum    -> Despawned    tantrum timer elapsed; particles burst out
//!   Leaving    -> Despawned    reached the exit
//! Any guy whose target box disappeared leaves. On round end everyone
//! drops what they hold and leaves, except a guy mid-tantrum, which still
//! bursts and despawns.

use crate::{
    board::Board,
    chaos_subsystem::ChaosParticle,
    clock::FrameCtx,
    config::GuyConfig,
    error::SimResult,
    event::SimEvent,
    guy::{Guy, GuyState},
    movement::{seek, separation, ArcPath, MovementModel},
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    types::{Actor, BoxId, Edge, GuyId, Vec2},
};

pub struct GuySubsystem {
    cfg:         GuyConfig,
    burst_speed: f32,
}

impl GuySubsystem {
    pub fn new(cfg: GuyConfig, burst_speed: f32) -> Self {
        Self { cfg, burst_speed }
    }

    fn arrived(&self, guy: &Guy, dest: Vec2) -> bool {
        guy.position.distance(dest) <= self.cfg.arrival_radius
    }

    fn start_longing(guy: &mut Guy, out: &mut Vec<SimEvent>) {
        guy.transition(GuyState::Longing, out);
        out.push(SimEvent::GuyLonging { guy: guy.id });
    }

    /// Path-following velocity plus separation from other guys and the
    /// player. Arrival is always tested on position, never on velocity.
    fn move_toward(&self, guy: &mut Guy, dest: Vec2, board: &Board, dt: f32, rng: &mut SubsystemRng) {
        let speed = guy.kind.speed;
        let base = match guy.movement {
            MovementModel::StraightSeek => seek(guy.position, dest, speed, dt),
            MovementModel::Arc => {
                let replan = match &guy.path {
                    None => true,
                    Some(p) => {
                        guy.path_age >= self.cfg.path_recompute_interval
                            && p.end.distance(dest) > self.cfg.path_recompute_distance
                    }
                };
                if replan {
                    guy.path = Some(ArcPath::randomized(
                        guy.position,
                        dest,
                        self.cfg.min_bend,
                        self.cfg.max_bend,
                        rng,
                    ));
                    guy.path_age = 0.0;
                }
                match guy.path.as_mut() {
                    Some(p) if !p.finished() => p.advance(guy.position, speed * dt, dt),
                    _ => seek(guy.position, dest, speed, dt),
                }
            }
        };
        let neighbours = board
            .guys
            .values()
            .filter(|g| g.id != guy.id)
            .map(|g| g.position)
            .chain(std::iter::once(board.player.position));
        let push = separation(guy.position, neighbours, self.cfg.separation_radius, self.cfg.separation_strength);
        guy.velocity = base.clamp_length_max(speed * 2.0) + push;
        guy.position += guy.velocity * dt;
    }

    /// Where a knocked-out thing lands: a random offset that never points
    /// out through the box's own edge.
    fn scatter_point(&self, board: &Board, origin: Vec2, edge: Edge, rng: &mut SubsystemRng) -> Vec2 {
        let inward = edge.inward();
        let mut dir = rng.unit_vec();
        let d = dir.dot(inward);
        if d < 0.0 {
            dir -= inward * (2.0 * d);
        }
        let dist = rng.range_f32(self.cfg.scatter_min_tiles, self.cfg.scatter_max_tiles) * board.tile();
        board.clamp_to_board(origin + dir * dist, board.config().thing_radius)
    }

    fn choose_drop_target(&self, board: &Board, away_from: Vec2, rng: &mut SubsystemRng) -> Vec2 {
        let min = self.cfg.drop_distance_tiles * board.tile();
        for _ in 0..8 {
            let p = board.random_position(rng);
            if p.distance(away_from) >= min {
                return p;
            }
        }
        board.bounds().center()
    }

    /// Pop the top thing of the target box into the guy's hands. Thieves
    /// knock a second one out onto the floor.
    fn take_from_box(&self, guy: &mut Guy, board: &mut Board, rng: &mut SubsystemRng, out: &mut Vec<SimEvent>) -> bool {
        let Some(box_id) = guy.target_box else { return false };
        let Some((origin, edge, top)) = board
            .boxes
            .get(&box_id)
            .and_then(|b| b.top().map(|top| (b.position, b.edge, top)))
        else {
            return false;
        };
        let knock_to = self.scatter_point(board, origin, edge, rng);
        let by = Actor::Guy(guy.id);

        let (Some(b), Some(thing)) = (board.boxes.get_mut(&box_id), board.things.get_mut(&top)) else {
            return false;
        };
        if b.remove_thing(thing, by, guy.position, out).is_none() || !thing.pick_up_by_guy(guy.id, out) {
            return false;
        }
        if guy.kind.drops_multiple() {
            if let Some(second) = b.top() {
                if let Some(t) = board.things.get_mut(&second) {
                    b.remove_thing(t, by, knock_to, out);
                }
            }
        }

        guy.carried = Some(top);
        guy.transition(GuyState::Carrying, out);
        guy.drop_target = Some(self.choose_drop_target(board, origin, rng));
        log::debug!("guy {}: took thing {top} from box {box_id}", guy.id);
        true
    }

    /// A thief near a player holding something snatches it.
    fn try_steal(&self, guy: &mut Guy, board: &mut Board, rng: &mut SubsystemRng, out: &mut Vec<SimEvent>) -> bool {
        if !guy.kind.steals_from_player() || guy.carried.is_some() {
            return false;
        }
        let Some(held) = board.player.held else { return false };
        let at = board.player.position;
        if guy.position.distance(at) > self.cfg.steal_reach {
            return false;
        }
        let Some(thing) = board.things.get_mut(&held) else { return false };
        if !thing.is_held_by_player() {
            return false;
        }
        board.player.held = None;
        thing.drop_at(at, Actor::Player, out);
        thing.pick_up_by_guy(guy.id, out);
        out.push(SimEvent::GuyStoleFromPlayer { guy: guy.id, thing: held });

        guy.carried = Some(held);
        guy.transition(GuyState::Carrying, out);
        guy.drop_target = Some(self.choose_drop_target(board, at, rng));
        log::debug!("guy {}: stole thing {held} from the player", guy.id);
        true
    }

    fn drop_carried(guy: &mut Guy, board: &mut Board, out: &mut Vec<SimEvent>) {
        let Some(id) = guy.carried.take() else { return };
        let at = board.clamp_to_board(guy.position, board.config().thing_radius);
        if let Some(thing) = board.things.get_mut(&id) {
            if thing.holder_guy() == Some(guy.id) {
                thing.drop_at(at, Actor::Guy(guy.id), out);
            }
        }
    }

    /// Nearest stocked box holding the guy's preferred type. The box it
    /// just robbed only counts when nothing else qualifies.
    fn restock_target(guy: &Guy, board: &Board) -> Option<BoxId> {
        let nearest = |skip: Option<BoxId>| {
            board
                .boxes
                .values()
                .filter(|b| !b.is_empty() && Some(b.id) != skip)
                .filter(|b| guy.preferred_type.as_ref().map_or(true, |t| &b.type_id == t))
                .min_by(|a, b| {
                    a.position
                        .distance_squared(guy.position)
                        .total_cmp(&b.position.distance_squared(guy.position))
                })
                .map(|b| b.id)
        };
        nearest(guy.target_box).or_else(|| nearest(None))
    }

    fn burst(&self, guy: &Guy, board: &mut Board, rng: &mut SubsystemRng, out: &mut Vec<SimEvent>) {
        let origin = board.clamp_to_board(guy.position, 0.0);
        for _ in 0..guy.kind.tantrum_particles {
            let id = board.alloc_id();
            let particle = ChaosParticle::burst(id, origin, self.cfg.tantrum_spread, self.burst_speed, rng);
            let position = particle.position;
            board.register_particle(particle);
            out.push(SimEvent::ChaosParticleSpawned {
                particle: id,
                position,
                total: board.particles.len() as u32,
            });
        }
    }

    fn step(&self, guy: &mut Guy, board: &mut Board, dt: f32, rng: &mut SubsystemRng, out: &mut Vec<SimEvent>) {
        guy.tick_timers(dt);

        let target = guy
            .target_box
            .and_then(|id| board.boxes.get(&id))
            .map(|b| (b.id, b.position, !b.is_empty()));
        if target.is_none() && matches!(guy.state(), GuyState::SeekingBox | GuyState::AtBox | GuyState::Longing) {
            log::debug!("guy {}: target box gone, leaving", guy.id);
            guy.transition(GuyState::Leaving, out);
            return;
        }

        match guy.state() {
            GuyState::Spawning => {
                if guy.state_timer < self.cfg.spawn_duration {
                    return;
                }
                match target {
                    Some((_, dest, _)) => {
                        guy.transition(GuyState::SeekingBox, out);
                        if guy.movement == MovementModel::Arc {
                            guy.path = Some(ArcPath::randomized(
                                guy.position,
                                dest,
                                self.cfg.min_bend,
                                self.cfg.max_bend,
                                rng,
                            ));
                        }
                    }
                    None => guy.transition(GuyState::Leaving, out),
                }
            }
            GuyState::SeekingBox => {
                let Some((box_id, dest, _)) = target else { return };
                if self.try_steal(guy, board, rng, out) {
                    return;
                }
                if guy.patience_exhausted() {
                    Self::start_longing(guy, out);
                } else if self.arrived(guy, dest) {
                    guy.transition(GuyState::AtBox, out);
                    out.push(SimEvent::GuyReachedBox { guy: guy.id, box_id });
                } else {
                    self.move_toward(guy, dest, board, dt, rng);
                }
            }
            GuyState::AtBox => {
                let Some((_, _, stocked)) = target else { return };
                if guy.patience_exhausted() {
                    Self::start_longing(guy, out);
                } else if guy.state_timer >= self.cfg.action_delay
                    && !(stocked && self.take_from_box(guy, board, rng, out))
                {
                    Self::start_longing(guy, out);
                }
            }
            GuyState::Carrying => {
                if guy.carried.is_none() {
                    guy.transition(GuyState::Leaving, out);
                    return;
                }
                let dest = match guy.drop_target {
                    Some(d) => d,
                    None => {
                        let d = self.choose_drop_target(board, guy.position, rng);
                        guy.drop_target = Some(d);
                        d
                    }
                };
                if self.arrived(guy, dest) {
                    guy.transition(GuyState::Dropping, out);
                } else {
                    self.move_toward(guy, dest, board, dt, rng);
                }
            }
            GuyState::Dropping => {
                if guy.state_timer < self.cfg.action_delay {
                    return;
                }
                Self::drop_carried(guy, board, out);
                let next = if rng.chance(self.cfg.reseek_probability) {
                    Self::restock_target(guy, board)
                } else {
                    None
                };
                match next {
                    Some(id) => {
                        guy.target_box = Some(id);
                        guy.transition(GuyState::SeekingBox, out);
                    }
                    None => guy.transition(GuyState::Leaving, out),
                }
            }
            GuyState::Longing => {
                let Some((_, dest, stocked)) = target else { return };
                if guy.longing_expired() {
                    guy.transition(GuyState::Tantrum, out);
                    out.push(SimEvent::GuyTantrum { guy: guy.id, position: guy.position });
                    out.push(SimEvent::ScreenShakeRequested {
                        intensity: self.cfg.shake_intensity,
                        duration: self.cfg.shake_duration,
                    });
                    log::debug!("guy {}: tantrum", guy.id);
                } else if !self.try_steal(guy, board, rng, out) {
                    if !self.arrived(guy, dest) {
                        self.move_toward(guy, dest, board, dt, rng);
                    } else if stocked {
                        self.take_from_box(guy, board, rng, out);
                    } else {
                        guy.velocity = Vec2::ZERO;
                    }
                }
            }
            GuyState::Tantrum => {
                if guy.state_timer >= self.cfg.tantrum_duration {
                    Self::drop_carried(guy, board, out);
                    self.burst(guy, board, rng, out);
                    guy.transition(GuyState::Despawned, out);
                }
            }
            GuyState::Leaving => {
                let exit = guy.exit_position;
                if self.arrived(guy, exit) {
                    out.push(SimEvent::GuyLeftBoard { guy: guy.id });
                    guy.transition(GuyState::Despawned, out);
                } else {
                    self.move_toward(guy, exit, board, dt, rng);
                }
            }
            GuyState::Despawned => {}
        }
    }

    /// Round over: everyone drops what they hold and walks off. A guy
    /// mid-tantrum finishes it first; one already leaving keeps its path.
    fn send_everyone_home(board: &mut Board, out: &mut Vec<SimEvent>) {
        let ids: Vec<GuyId> = board
            .guys
            .values()
            .filter(|g| !matches!(g.state(), GuyState::Tantrum | GuyState::Leaving) && !g.state().is_terminal())
            .map(|g| g.id)
            .collect();
        for id in ids {
            let Some(mut guy) = board.unregister_guy(id) else { continue };
            Self::drop_carried(&mut guy, board, out);
            guy.transition(GuyState::Leaving, out);
            board.register_guy(guy);
        }
    }
}

impl SimSubsystem for GuySubsystem {
    fn name(&self) -> &'static str {
        "guys"
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
            if let SimEvent::RoundEnded { .. } = event {
                Self::send_everyone_home(board, &mut events);
            }
        }

        board.prune_stale();
        let ids: Vec<GuyId> = board.guys.keys().copied().collect();
        for id in ids {
            let Some(mut guy) = board.unregister_guy(id) else { continue };
            self.step(&mut guy, board, ctx.dt, rng, &mut events);
            if guy.state().is_terminal() {
                events.push(SimEvent::GuyDespawned { guy: id });
            } else {
                board.register_guy(guy);
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
    use crate::{
        config::SimConfig,
        event::RoundResult,
        game_box::GameBox,
        registry::{default_guy_types, GuyType},
        thing::Thing,
        types::BoardSize,
    };

    struct Rig {
        board: Board,
        guys:  GuySubsystem,
        rng:   SubsystemRng,
    }

    impl Rig {
        fn new() -> Self {
            let cfg = SimConfig::default();
            Self {
                board: Board::new(cfg.board.clone(), Some(BoardSize::new(16, 12))),
                guys:  GuySubsystem::new(cfg.guys.clone(), cfg.chaos.burst_speed),
                rng:   SubsystemRng::new(9, 3),
            }
        }

        fn add_box(&mut self, stock: u32) -> (BoxId, Vec2) {
            let pos = self.board.slots(Edge::North)[3];
            let id = self.board.alloc_id();
            let mut b = GameBox::new(id, "ball".into(), pos, 20.0, Edge::North);
            let mut out = Vec::new();
            for _ in 0..stock {
                let mut t = Thing::new(self.board.alloc_id(), "ball".into(), pos, 8.0);
                b.add_thing(&mut t, &mut out);
                self.board.register_thing(t);
            }
            self.board.register_box(b);
            (id, pos)
        }

        fn add_guy(&mut self, kind: GuyType, at: Vec2, target: BoxId) -> GuyId {
            let id = self.board.alloc_id();
            let mut g = Guy::new(id, kind, MovementModel::StraightSeek, at);
            g.initialize(target, "ball".into(), Vec2::new(0.0, 1_000.0));
            g.transition(GuyState::SeekingBox, &mut Vec::new());
            self.board.register_guy(g);
            id
        }

        fn frame(&mut self, inbox: &mut Vec<SimEvent>) -> Vec<SimEvent> {
            let ctx = FrameCtx { tick: 0, dt: 0.1, paused: false };
            self.guys.update(&ctx, &mut self.board, inbox, &mut self.rng).unwrap()
        }

        fn run(&mut self, frames: usize) -> Vec<SimEvent> {
            (0..frames).flat_map(|_| self.frame(&mut Vec::new())).collect()
        }
    }

    fn kind(id: &str) -> GuyType {
        default_guy_types().into_iter().find(|g| g.id == id).unwrap()
    }

    fn states(events: &[SimEvent]) -> Vec<GuyState> {
        events
            .iter()
            .filter_map(|e| match e {
                SimEvent::GuyStateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_box_leads_to_longing_then_tantrum() {
        let mut rig = Rig::new();
        let (box_id, pos) = rig.add_box(0);
        let normal = kind("normal");
        let particles = normal.tantrum_particles as usize;
        let guy = rig.add_guy(normal, pos, box_id);

        let events = rig.run(200);
        assert_eq!(
            states(&events),
            vec![GuyState::AtBox, GuyState::Longing, GuyState::Tantrum, GuyState::Despawned]
        );
        let spawned = events.iter().filter(|e| matches!(e, SimEvent::ChaosParticleSpawned { .. })).count();
        assert_eq!(spawned, particles);
        assert_eq!(rig.board.particles.len(), particles);
        assert!(events.contains(&SimEvent::GuyTantrum { guy, position: pos }));
        assert!(events.contains(&SimEvent::GuyDespawned { guy }));
        assert!(rig.board.guys.is_empty());
    }

    #[test]
    fn stocked_box_is_robbed() {
        let mut rig = Rig::new();
        let (box_id, pos) = rig.add_box(2);
        let guy = rig.add_guy(kind("normal"), pos, box_id);

        let events = rig.run(10);
        assert_eq!(states(&events), vec![GuyState::AtBox, GuyState::Carrying]);
        let g = &rig.board.guys[&guy];
        assert_eq!(g.patience, 0.0);
        let carried = g.carried.unwrap();
        assert_eq!(rig.board.things[&carried].holder_guy(), Some(guy));
        assert_eq!(rig.board.boxes[&box_id].count(), 1);
        assert!(!events.iter().any(|e| matches!(e, SimEvent::BoxEmptied { .. })));
    }

    #[test]
    fn thief_knocks_out_a_second_thing() {
        let mut rig = Rig::new();
        let (box_id, pos) = rig.add_box(2);
        rig.add_guy(kind("thief"), pos, box_id);

        let events = rig.run(10);
        assert!(rig.board.boxes[&box_id].is_empty());
        let scattered = events.iter().filter(|e| matches!(e, SimEvent::ThingScattered { .. })).count();
        assert_eq!(scattered, 2);
        assert!(events.iter().any(|e| matches!(e, SimEvent::BoxEmptied { box_id: b, .. } if *b == box_id)));
        assert_eq!(rig.board.scattered_things().len(), 1);
    }

    #[test]
    fn thief_snatches_from_the_player() {
        let mut rig = Rig::new();
        let (box_id, _) = rig.add_box(1);
        let mut out = Vec::new();
        let mut t = Thing::new(rig.board.alloc_id(), "ball".into(), Vec2::ZERO, 8.0);
        t.pick_up_by_player(&mut out);
        let thing = t.id;
        rig.board.register_thing(t);
        rig.board.player.held = Some(thing);

        let guy = rig.add_guy(kind("thief"), Vec2::new(10.0, 0.0), box_id);
        let events = rig.frame(&mut Vec::new());
        assert!(events.contains(&SimEvent::GuyStoleFromPlayer { guy, thing }));
        assert_eq!(rig.board.player.held, None);
        assert_eq!(rig.board.things[&thing].holder_guy(), Some(guy));
        assert_eq!(rig.board.guys[&guy].state(), GuyState::Carrying);
    }

    #[test]
    fn round_end_sends_everyone_home() {
        let mut rig = Rig::new();
        let (box_id, pos) = rig.add_box(2);
        let guy = rig.add_guy(kind("normal"), pos, box_id);
        rig.run(10);
        let carried = rig.board.guys[&guy].carried.unwrap();

        let mut inbox = vec![SimEvent::RoundEnded { round_number: 1, result: RoundResult::Victory }];
        rig.frame(&mut inbox);
        assert!(inbox.is_empty());
        assert_eq!(rig.board.guys[&guy].state(), GuyState::Leaving);
        assert!(rig.board.things[&carried].is_free());

        rig.run(400);
        assert!(rig.board.guys.is_empty(), "guy should have walked off");
    }

    #[test]
    fn round_end_lets_a_tantrum_finish() {
        let mut rig = Rig::new();
        let (box_id, pos) = rig.add_box(0);
        let normal = kind("normal");
        let particles = normal.tantrum_particles as usize;
        let guy = rig.add_guy(normal, pos, box_id);
        for _ in 0..200 {
            if rig.board.guys[&guy].state() == GuyState::Tantrum {
                break;
            }
            rig.frame(&mut Vec::new());
        }
        assert_eq!(rig.board.guys[&guy].state(), GuyState::Tantrum);

        let mut inbox = vec![SimEvent::RoundEnded { round_number: 1, result: RoundResult::Victory }];
        let mut events = rig.frame(&mut inbox);
        events.extend(rig.run(200));

        assert!(!states(&events).contains(&GuyState::Leaving));
        assert_eq!(states(&events), vec![GuyState::Despawned]);
        let spawned = events.iter().filter(|e| matches!(e, SimEvent::ChaosParticleSpawned { .. })).count();
        assert_eq!(spawned, particles);
        assert!(rig.board.guys.is_empty());
    }

    #[test]
    fn round_end_leaves_a_leaving_guy_alone() {
        let mut rig = Rig::new();
        let (box_id, pos) = rig.add_box(0);
        let guy = rig.add_guy(kind("normal"), pos + Vec2::new(0.0, 100.0), box_id);
        rig.board.unregister_box(box_id);
        rig.frame(&mut Vec::new());
        rig.run(5);
        let before = rig.board.guys[&guy].state_timer;
        assert_eq!(rig.board.guys[&guy].state(), GuyState::Leaving);

        let mut inbox = vec![SimEvent::RoundEnded { round_number: 1, result: RoundResult::Failure }];
        let events = rig.frame(&mut inbox);
        assert!(states(&events).is_empty(), "no Leaving -> Leaving transition");
        assert!(rig.board.guys[&guy].state_timer > before);
    }

    #[test]
    fn reseek_prefers_a_different_box() {
        let mut rig = Rig::new();
        let (robbed, pos) = rig.add_box(2);
        let other_pos = rig.board.slots(Edge::North)[6];
        let other = rig.board.alloc_id();
        let mut b = GameBox::new(other, "ball".into(), other_pos, 20.0, Edge::North);
        let mut t = Thing::new(rig.board.alloc_id(), "ball".into(), other_pos, 8.0);
        b.add_thing(&mut t, &mut Vec::new());
        rig.board.register_thing(t);
        rig.board.register_box(b);

        let guy = rig.add_guy(kind("normal"), pos, robbed);
        let g = &rig.board.guys[&guy];
        assert_eq!(GuySubsystem::restock_target(g, &rig.board), Some(other));

        rig.board.unregister_box(other);
        let g = &rig.board.guys[&guy];
        assert_eq!(GuySubsystem::restock_target(g, &rig.board), Some(robbed), "falls back to the same box");
    }

    #[test]
    fn missing_target_box_means_leaving() {
        let mut rig = Rig::new();
        let (box_id, pos) = rig.add_box(0);
        let guy = rig.add_guy(kind("normal"), pos + Vec2::new(0.0, 100.0), box_id);
        rig.board.unregister_box(box_id);
        rig.frame(&mut Vec::new());
        assert_eq!(rig.board.guys[&guy].state(), GuyState::Leaving);
    }
}
