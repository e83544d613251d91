//! tantrum-core: the headless simulation of a round-based chaos
//! management game. Things live in boxes, guys steal and scatter them,
//! and the player puts them back before the board drowns in tantrums.

pub mod types;
pub mod error;
pub mod rng;
pub mod clock;
pub mod registry;
pub mod params;
pub mod event;
pub mod event_bus;
pub mod config;

pub mod thing;
pub mod game_box;
pub mod guy;
pub mod player;
pub mod movement;
pub mod board;

pub mod scoring;
pub mod upgrade;

pub mod subsystem;
pub mod round_subsystem;
pub mod box_spawner_subsystem;
pub mod guy_spawner_subsystem;
pub mod guy_subsystem;
pub mod thing_subsystem;
pub mod chaos_subsystem;

pub mod command;
pub mod snapshot;
pub mod engine;
