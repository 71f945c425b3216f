//! # Delver Main Entry Point
//!
//! Generates a simulated dungeon, spawns a party of agents and lets them
//! explore it until the tick budget runs out or Ctrl-C is pressed.

use clap::Parser;
use delver::{
    AgentRunner, DelverConfig, DelverResult, JsonMapStorage, MapStorage, MemoryMapStorage,
    NavigationCoordinator, SimulatedDungeon,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Command line arguments for Delver.
#[derive(Parser, Debug)]
#[command(name = "delver")]
#[command(about = "Autonomous agents exploring a partially observed dungeon")]
#[command(version)]
struct Args {
    /// Random seed for dungeon generation
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of agents in the party
    #[arg(short, long, default_value_t = 2)]
    agents: usize,

    /// Stop every agent after this many ticks (runs until Ctrl-C otherwise)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Delay between agent ticks in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Persist maps as JSON files in this directory
    #[arg(long)]
    map_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engage visible monsters
    #[arg(long)]
    hunt: bool,

    /// Tour the known rooms once the level is explored
    #[arg(long)]
    walk_rooms: bool,

    /// Agents after the first trail the first one
    #[arg(long)]
    follow: bool,

    /// Withdraw from fights below half hit points
    #[arg(long)]
    retreat: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the explored map when done
    #[arg(long)]
    dump_map: bool,
}

#[tokio::main]
async fn main() -> DelverResult<()> {
    let args = Args::parse();

    initialize_logging(&args.log_level);
    info!("Starting Delver v{}", delver::VERSION);

    let config = load_config(&args)?;
    run(&args, config).await
}

/// Initializes `env_logger`; `RUST_LOG` takes precedence over `--log-level`.
fn initialize_logging(log_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();
}

/// Reads the configuration file, if any, and applies command line overrides.
fn load_config(args: &Args) -> DelverResult<DelverConfig> {
    let mut config = match &args.config {
        Some(path) => DelverConfig::load(path)?,
        None => DelverConfig::default(),
    };

    if let Some(seed) = args.seed {
        config.generation.seed = seed;
    }
    if let Some(interval) = args.interval_ms {
        config.agent_loop.tick_interval_ms = interval;
    }
    if args.ticks.is_some() {
        config.agent_loop.max_ticks = args.ticks;
    }
    if args.hunt {
        config.agent_loop.hunt = true;
    }
    if args.walk_rooms {
        config.agent_loop.walk_rooms = true;
    }
    if args.retreat {
        config.agent_loop.retreat = true;
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: &Args, config: DelverConfig) -> DelverResult<()> {
    let storage: Box<dyn MapStorage> = match &args.map_dir {
        Some(dir) => Box::new(JsonMapStorage::new(dir)?),
        None => Box::new(MemoryMapStorage::new()),
    };
    let mut coordinator = NavigationCoordinator::new(storage)?;
    if let Some(seed) = config.rng_seed {
        coordinator = coordinator.with_rng_seed(seed);
    }
    let coordinator = Arc::new(coordinator);

    let map_name = format!("level-{}", config.generation.seed);
    info!("Generating dungeon {}", map_name);
    let simulation = Arc::new(SimulatedDungeon::generate(
        map_name.clone(),
        &config.generation,
    )?);

    let mut runners = Vec::with_capacity(args.agents);
    let mut leader: Option<String> = None;
    for index in 0..args.agents {
        let agent = simulation.spawn_agent(&format!("delver-{}", index + 1))?;
        let agent_id = agent.id.clone();
        coordinator.add_agent(agent);
        if config.agent_loop.hunt {
            coordinator.toggle_attack_mode(&agent_id);
        }

        let mut agent_loop = config.agent_loop.clone();
        if args.follow {
            match &leader {
                Some(leader_id) => agent_loop.follow = Some(leader_id.clone()),
                None => leader = Some(agent_id.clone()),
            }
        }
        runners.push(AgentRunner::spawn(
            coordinator.clone(),
            simulation.clone(),
            agent_id,
            agent_loop,
        ));
    }

    if config.agent_loop.max_ticks.is_none() {
        tokio::signal::ctrl_c().await?;
        info!("Interrupted, stopping agents");
        for runner in &runners {
            runner.stop();
        }
    }

    for runner in runners {
        let summary = runner.join().await?;
        info!(
            "{}: {} ticks, {} moves, {} rejected, {} client errors, {} dropped goals",
            summary.agent_id,
            summary.ticks,
            summary.moves,
            summary.rejected_moves,
            summary.client_errors,
            summary.dropped_goals
        );
    }

    report(args, &coordinator, &simulation, &map_name);
    Ok(())
}

fn report(
    args: &Args,
    coordinator: &NavigationCoordinator,
    simulation: &SimulatedDungeon,
    map_name: &str,
) {
    let Some(map) = coordinator.map_snapshot(map_name) else {
        warn!("No map was recorded for {}", map_name);
        return;
    };

    let truth = simulation.ground_truth();
    info!(
        "Known {} of {} tiles on {} ({}), {} monsters left",
        map.known_positions().count(),
        truth.len(),
        map_name,
        if coordinator.is_fully_explored(map_name) {
            "fully explored"
        } else {
            "partially explored"
        },
        simulation.monster_count()
    );

    for message in coordinator.messages().iter().take(10) {
        info!("> {}", message);
    }

    if args.dump_map {
        println!("{}", map.to_ascii());
    }
}
