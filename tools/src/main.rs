//! sim-runner: headless runner for the tantrum simulation.
//!
//! Usage:
//!   sim-runner --seed 12345 --rounds 5
//!   sim-runner --seed 12345 --data-dir ./data --preset central
//!   sim-runner --seed 12345 --ipc-mode
//!
//! Without `--ipc-mode` an autopilot plays: it carries scattered things
//! home, buys the cheapest upgrade between rounds, and prints a summary.
//! With it, JSON lines on stdin drive the engine and every line gets a
//! state line back.

use anyhow::Result;
use std::cell::Cell;
use std::env;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use tantrum_core::{
    chaos_subsystem::ChaosSubsystem,
    command::PlayerCommand,
    config::{BehaviorPreset, SimConfig},
    engine::SimEngine,
    event::{GamePhase, SimEvent},
    event_bus::ListenerOwner,
    snapshot::GameSnapshot,
    types::Tick,
};

const FRAME_DT: f32 = 1.0 / 30.0;
/// Safety stop for the autopilot: a little over an hour of game time.
const MAX_FRAMES: u64 = 30 * 60 * 70;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick {
        count: u64,
        #[serde(default)]
        dt:    Option<f32>,
    },
    Command {
        command: PlayerCommand,
    },
    Snapshot,
    Restore {
        snapshot: GameSnapshot,
    },
    Quit,
}

#[derive(serde::Serialize)]
struct UiState {
    tick:            Tick,
    paused:          bool,
    phase:           GamePhase,
    round_number:    u32,
    round_timer:     f32,
    round_score:     u64,
    multiplier:      f32,
    messiness:       f32,
    total_score:     u64,
    stars_available: u32,
    boxes:           usize,
    stocked_boxes:   u32,
    loose_things:    usize,
    guys:            usize,
    particles:       usize,
    player:          [f32; 2],
    held:            Option<u64>,
}

#[derive(Default)]
struct Tally {
    returned:  Cell<u32>,
    tantrums:  Cell<u32>,
    purchases: Cell<u32>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let rounds = parse_arg(&args, "--rounds", 3u32);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = str_arg(&args, "--data-dir");
    let preset = str_arg(&args, "--preset");

    let mut config = match data_dir {
        Some(dir) => SimConfig::load(dir)?,
        None => SimConfig::default(),
    };
    if let Some(name) = preset {
        match BehaviorPreset::parse(name) {
            Some(p) => config = config.with_preset(p),
            None => log::warn!("Unknown preset '{name}', keeping {:?}", config.preset),
        }
    }

    let run_id = SimEngine::new_run_id();
    if !ipc_mode {
        println!("Tantrum - sim-runner");
        println!("  seed:      {seed}");
        println!("  rounds:    {rounds}");
        println!("  preset:    {:?}", config.preset);
        println!("  data_dir:  {}", data_dir.unwrap_or("(built-in defaults)"));
        println!();
    }

    let mut engine = SimEngine::build(run_id, seed, config)?;

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        run_autopilot(&mut engine, rounds)?;
    }
    Ok(())
}

fn run_autopilot(engine: &mut SimEngine, rounds: u32) -> Result<()> {
    let owner = ListenerOwner::new();
    let tally = Rc::new(Tally::default());
    let t = Rc::clone(&tally);
    engine.bus().subscribe("thing.returned", &owner, move |_| t.returned.set(t.returned.get() + 1));
    let t = Rc::clone(&tally);
    engine.bus().subscribe("guy.tantrum", &owner, move |_| t.tantrums.set(t.tantrums.get() + 1));
    let t = Rc::clone(&tally);
    engine.bus().subscribe("upgrade.purchased", &owner, move |_| t.purchases.set(t.purchases.get() + 1));
    engine.bus().subscribe("score.round.tallied", &owner, |e| {
        if let SimEvent::ScoreRoundTallied { round_number, round_score, stars_earned, breakdown } = e {
            println!(
                "  round {round_number:>2} {:?}: score {round_score:>5}, stars {stars_earned}, returned {}, tantrums {}",
                breakdown.result, breakdown.things_returned, breakdown.tantrums
            );
        }
    });

    engine.request_start_game();
    let mut frames = 0;
    while frames < MAX_FRAMES {
        match engine.phase() {
            GamePhase::Setup | GamePhase::Active => steer(engine),
            GamePhase::Resolution => {
                engine.request_continue_to_parameterization();
            }
            GamePhase::Parameterization => {
                if engine.state().rounds_completed >= rounds {
                    break;
                }
                shop(engine);
                engine.request_start_next_round();
            }
            GamePhase::GameOver => break,
            GamePhase::Title | GamePhase::Endless => {}
        }
        engine.tick(FRAME_DT)?;
        frames += 1;
    }

    print_summary(engine, &tally, frames);
    Ok(())
}

/// One frame of autopilot input: carry the held thing to its box, or
/// walk to the closest loose thing and grab it.
fn steer(engine: &mut SimEngine) {
    let board = engine.board();
    let pos = board.player.position;
    let goal = match board.player.held.and_then(|id| board.things.get(&id)) {
        Some(held) => board.nearest_box(pos, Some(held.type_id.as_str())).map(|b| (b.position, b.radius, true)),
        None => board
            .scattered_things()
            .into_iter()
            .min_by(|a, b| a.position.distance_squared(pos).total_cmp(&b.position.distance_squared(pos)))
            .map(|t| (t.position, board.player.reach, false)),
    };
    let Some((target, within, holding)) = goal else {
        return;
    };
    if pos.distance(target) <= within {
        if holding {
            engine.request_drop();
        } else {
            engine.request_pick_up();
        }
    } else {
        engine.request_move_player(target.x, target.y);
    }
}

fn shop(engine: &mut SimEngine) {
    let cheapest = engine
        .available_upgrades()
        .into_iter()
        .min_by_key(|u| u.config.cost)
        .map(|u| u.config.id.clone());
    if let Some(id) = cheapest {
        engine.request_purchase(&id);
    }
}

fn run_ipc_loop(engine: &mut SimEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Tick { count, dt } => {
                engine.run_for(count, dt.unwrap_or(FRAME_DT))?;
                writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(engine))?)?;
            }
            IpcCommand::GetState => {
                writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(engine))?)?;
            }
            IpcCommand::Command { command } => {
                let accepted = engine.apply_command(command);
                let reply = serde_json::json!({ "accepted": accepted, "state": build_ui_state(engine) });
                writeln!(stdout, "{}", reply)?;
            }
            IpcCommand::Snapshot => {
                writeln!(stdout, "{}", serde_json::to_string(&engine.snapshot())?)?;
            }
            IpcCommand::Restore { snapshot } => {
                engine.restore(&snapshot)?;
                writeln!(stdout, "{}", serde_json::to_string(&build_ui_state(engine))?)?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(engine: &SimEngine) -> UiState {
    let board = engine.board();
    let state = engine.state();
    let (stocked_boxes, _) = board.stock_summary();
    UiState {
        tick: engine.clock.current_tick,
        paused: engine.clock.paused,
        phase: state.phase,
        round_number: state.round_number,
        round_timer: state.round_timer,
        round_score: state.tally.round_score,
        multiplier: state.tally.multiplier,
        messiness: engine.subsystem::<ChaosSubsystem>().map_or(0.0, ChaosSubsystem::ratio),
        total_score: state.total_score,
        stars_available: state.stars_available,
        boxes: board.boxes.len(),
        stocked_boxes,
        loose_things: board.scattered_things().len(),
        guys: board.guys.len(),
        particles: board.particles.len(),
        player: board.player.position.to_array(),
        held: board.player.held,
    }
}

fn print_summary(engine: &SimEngine, tally: &Tally, frames: u64) {
    let state = engine.state();
    println!();
    println!("=== RUN SUMMARY ===");
    println!("  run_id:           {}", engine.run_id);
    println!("  frames run:       {frames}");
    println!("  game time:        {:.1}s", engine.clock.elapsed);
    println!("  final phase:      {:?}", state.phase);
    println!("  rounds completed: {}", state.rounds_completed);
    println!("  total score:      {}", state.total_score);
    println!("  stars earned:     {}", state.stars_earned);
    println!("  stars unspent:    {}", state.stars_available);
    println!("  things returned:  {}", tally.returned.get());
    println!("  tantrums:         {}", tally.tantrums.get());
    println!("  upgrades bought:  {}", tally.purchases.get());
    println!("  purchased:        {:?}", engine.catalog().purchased_ids());
    println!("  events logged:    {}", engine.event_log().count());
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
