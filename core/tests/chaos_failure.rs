use std::{cell::RefCell, rc::Rc};

use tantrum_core::{
    config::SimConfig,
    engine::SimEngine,
    event::{GamePhase, RoundResult, SimEvent},
    event_bus::ListenerOwner,
    guy::GuyState,
    registry::{default_guy_types, GuyType},
    types::{BoardSize, GuyId},
};

const DT: f32 = 0.05;

/// Empty boxes and short-fused guys on the smallest board.
fn tantrum_config(patience: f32, particles: u32) -> SimConfig {
    let mut config = SimConfig::default();
    config.initial_params.things_per_box = 0;
    config.initial_params.board_size = BoardSize::new(8, 6);
    config.initial_params.guy_spawn_interval = 1.0;
    config.guy_types = vec![GuyType {
        patience,
        longing_duration: 1.0,
        tantrum_particles: particles,
        ..default_guy_types()[0].clone()
    }];
    config
}

fn record(engine: &SimEngine, owner: &ListenerOwner) -> Rc<RefCell<Vec<SimEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    engine.bus().subscribe_all(owner, move |e| s.borrow_mut().push(e.clone()));
    seen
}

#[test]
fn particles_past_the_failure_threshold_fail_the_round() {
    let mut engine = SimEngine::build("chaos".into(), 11, tantrum_config(0.3, 30)).expect("engine");
    let owner = ListenerOwner::new();
    let seen = record(&engine, &owner);

    engine.request_start_game();
    let mut secs = 0.0;
    while engine.phase() != GamePhase::Resolution {
        assert!(secs < 60.0, "round never failed");
        engine.tick(DT).expect("tick");
        secs += DT;
    }

    let state = engine.state();
    assert!(state.round_timer > 0.0, "ended before the timer ran out");
    assert_eq!(state.last_breakdown.as_ref().map(|b| b.result), Some(RoundResult::Failure));
    assert!(!state.last_breakdown.as_ref().is_some_and(|b| b.stars.survived));

    let seen = seen.borrow();
    let exceeded = seen.iter().position(|e| matches!(e, SimEvent::ChaosExceeded { .. })).expect("exceeded");
    let warned = seen.iter().position(|e| matches!(e, SimEvent::ChaosWarning { .. })).expect("warning");
    let ended = seen
        .iter()
        .position(|e| matches!(e, SimEvent::RoundEnded { result: RoundResult::Failure, .. }))
        .expect("round ended");
    assert!(warned <= exceeded && exceeded < ended);
    assert_eq!(seen.iter().filter(|e| matches!(e, SimEvent::ChaosExceeded { .. })).count(), 1);
    assert!(seen.iter().any(|e| matches!(e, SimEvent::MultiplierChanged { multiplier, .. } if *multiplier < 1.5)));
}

#[test]
fn guy_at_an_empty_box_longs_then_bursts_exactly_its_particles() {
    const PARTICLES: u32 = 7;
    let mut engine = SimEngine::build("longing".into(), 12, tantrum_config(30.0, PARTICLES)).expect("engine");
    let owner = ListenerOwner::new();
    let seen = record(&engine, &owner);

    engine.request_start_game();
    let mut first: Option<GuyId> = None;
    let mut secs = 0.0;
    loop {
        assert!(secs < 60.0, "no guy finished its tantrum");
        engine.tick(DT).expect("tick");
        secs += DT;
        if first.is_none() {
            first = seen.borrow().iter().find_map(|e| match e {
                SimEvent::GuySpawned { guy, .. } => Some(*guy),
                _ => None,
            });
        }
        let done = first.is_some_and(|g| {
            seen.borrow().iter().any(|e| matches!(e, SimEvent::GuyDespawned { guy } if *guy == g))
        });
        if done {
            break;
        }
    }
    let guy = first.expect("spawned");
    let seen = seen.borrow();

    let states: Vec<GuyState> = seen
        .iter()
        .filter_map(|e| match e {
            SimEvent::GuyStateChanged { guy: g, to, .. } if *g == guy => Some(*to),
            _ => None,
        })
        .collect();
    assert!(!states.contains(&GuyState::Carrying), "nothing to carry: {states:?}");
    assert!(states.contains(&GuyState::Longing));
    assert_eq!(states.last(), Some(&GuyState::Despawned));
    assert_eq!(states[states.len() - 2], GuyState::Tantrum);

    // Particles burst as a tantrum ends; other guys may still be mid-tantrum.
    let finished = seen
        .iter()
        .filter(|e| matches!(e, SimEvent::GuyStateChanged { from: GuyState::Tantrum, to: GuyState::Despawned, .. }))
        .count() as u32;
    let particles = seen.iter().filter(|e| matches!(e, SimEvent::ChaosParticleSpawned { .. })).count() as u32;
    assert!(finished >= 1);
    assert_eq!(particles, finished * PARTICLES);
}
