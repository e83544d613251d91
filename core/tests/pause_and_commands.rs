use tantrum_core::{
    command::PlayerCommand,
    config::SimConfig,
    engine::SimEngine,
    event::GamePhase,
};

fn active_engine(seed: u64) -> SimEngine {
    let mut engine = SimEngine::build(format!("pause-{seed}"), seed, SimConfig::default()).expect("engine");
    engine.request_start_game();
    while engine.phase() != GamePhase::Active {
        engine.tick(0.1).expect("tick");
    }
    engine
}

#[test]
fn pause_freezes_every_timer_and_resume_picks_up() {
    let mut engine = active_engine(21);
    engine.run_for(50, 0.1).expect("run");
    assert!(engine.request_pause());
    assert!(!engine.request_pause(), "already paused");

    let timer = engine.state().round_timer;
    let guys = engine.board().guys.clone();
    let elapsed = engine.clock.elapsed;
    engine.run_for(100, 0.1).expect("run paused");

    assert_eq!(engine.state().round_timer, timer);
    assert_eq!(engine.clock.elapsed, elapsed);
    assert_eq!(engine.board().guys.len(), guys.len());
    for (id, g) in &guys {
        assert_eq!(engine.board().guys[id].position, g.position, "guy {id} moved while paused");
    }

    assert!(engine.request_resume());
    assert!(!engine.request_resume());
    engine.run_for(10, 0.1).expect("run");
    assert!(engine.state().round_timer < timer);
}

#[test]
fn pause_outside_active_is_a_no_op() {
    let mut engine = SimEngine::build("p".into(), 1, SimConfig::default()).expect("engine");
    engine.request_start_game();
    assert_eq!(engine.phase(), GamePhase::Setup);
    assert!(!engine.request_pause());
    assert!(!engine.clock.paused);
}

#[test]
fn commands_route_to_requests() {
    let mut engine = SimEngine::build("cmd".into(), 3, SimConfig::default()).expect("engine");
    assert!(engine.apply_command(PlayerCommand::StartGame));
    assert!(!engine.apply_command(PlayerCommand::Pause), "still in setup");
    assert!(engine.apply_command(PlayerCommand::MovePlayer { x: 10_000.0, y: 0.0 }));

    let target = engine.board().player.target.expect("target");
    assert!(engine.board().is_inside(target), "move target is clamped to the board");
    assert!(!engine.apply_command(PlayerCommand::Drop), "nothing held");
    assert!(!engine.apply_command(PlayerCommand::Purchase { upgrade_id: "extra_box".into() }));

    let received = engine
        .event_log()
        .filter(|e| e.event_type == "player.command_received")
        .count();
    assert_eq!(received, 5);
    assert_eq!(engine.command_history().len(), 5);
}
