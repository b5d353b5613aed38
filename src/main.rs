use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use rail_sim::simulation::{load_network_from_file, save_network_to_file, SimWorld};

#[derive(Parser)]
#[command(name = "rail_sim")]
#[command(about = "Headless rail network simulation")]
struct Cli {
    /// Network to load (JSON). Runs the built-in demo layout when omitted.
    #[arg(long)]
    network: Option<PathBuf>,

    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u32,

    /// Time delta per tick in milliseconds
    #[arg(long, default_value = "100")]
    delta: f64,

    /// Seed for passenger generation and random junction choices
    #[arg(long)]
    seed: Option<u64>,

    /// Train cruising speed in units per second
    #[arg(long)]
    speed: Option<f64>,

    /// Passengers spawned per station per second
    #[arg(long)]
    spawn_rate: Option<f64>,

    /// Write the network to this file (JSON) before exiting
    #[arg(long)]
    export: Option<PathBuf>,

    /// Draw an ASCII map along with each summary
    #[arg(long)]
    map: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut world = match &cli.network {
        Some(path) => {
            let network = load_network_from_file(path)?;
            let mut world = SimWorld::from_network(network, Default::default());
            world.config.seed = cli.seed;
            world
        }
        None => SimWorld::create_demo_world(cli.seed)?,
    };
    if let Some(speed) = cli.speed {
        world.config.train.speed = speed;
    }
    if let Some(rate) = cli.spawn_rate {
        world.config.passenger_spawn_rate = rate;
    }

    world.start_simulation()?;
    run_headless(&mut world, cli.ticks, cli.delta, cli.map);

    if let Some(path) = &cli.export {
        save_network_to_file(world.network(), path)?;
    }
    Ok(())
}

/// Run the simulation without graphics, reporting every ten simulated seconds
fn run_headless(world: &mut SimWorld, ticks: u32, delta: f64, map: bool) {
    info!("Running rail simulation: {} ticks of {}ms", ticks, delta);

    let ticks_per_report = ((10_000.0 / delta).ceil() as u32).max(1);

    println!("Initial state:");
    world.print_summary();
    if map {
        world.draw_map();
    }

    let mut tick = 0;
    while tick < ticks {
        let ticks_to_run = ticks_per_report.min(ticks - tick);
        for _ in 0..ticks_to_run {
            tick += 1;
            world.tick(delta);
        }

        println!(
            "--- After tick {} ({:.1}s simulated time) ---",
            tick,
            tick as f64 * delta / 1000.0
        );
        world.print_summary();
        if map {
            world.draw_map();
        }
    }

    info!("=== SIMULATION COMPLETE ===");
    if let Some(state) = &world.game_state {
        info!("Simulated time: {:.1}s", state.time_ms / 1000.0);
        info!("Trains: {}", state.trains.len());
        info!("Stations: {}", world.network().station_count());
        info!("Passengers delivered: {}", state.delivered_passengers);
        info!("Passengers lost: {}", state.lost_passengers);
        info!("Passengers waiting: {}", state.total_waiting());
        info!("Passengers riding: {}", state.passengers_on_trains());
    }
}
