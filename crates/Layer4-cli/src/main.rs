//! Shopkeepers CLI - Main entry point

mod simulate;

use clap::{Parser, Subcommand};
use shopkeepers_foundation::{ShopkeeperStore, ShopkeepersConfig, SHOPKEEPERS_FILE};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shopkeepers - shopkeeper registry and lifecycle driver
#[derive(Parser, Debug)]
#[command(name = "shopkeepers")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (.json or .toml); defaults to global + project config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding shopkeepers.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a seeded world-streaming simulation against the registry
    Simulate {
        /// Number of shopkeepers to create
        #[arg(long, default_value = "64")]
        shops: usize,

        /// Number of ticks to simulate
        #[arg(long, default_value = "1200")]
        ticks: u64,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Ticks a destroyed object waits before respawning itself
        #[arg(long, default_value = "40")]
        respawn_cooldown: u64,

        /// Pace ticks with the configured tick length
        #[arg(long)]
        realtime: bool,

        /// Spread region-load spawns over ticks (overrides spawnsPerTick)
        #[arg(long)]
        spawns_per_tick: Option<usize>,
    },
    /// List stored shopkeepers
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = load_config(&args)?;

    match args.command {
        Command::Simulate {
            shops,
            ticks,
            seed,
            respawn_cooldown,
            realtime,
            spawns_per_tick,
        } => {
            if let Some(budget) = spawns_per_tick {
                config = config.spawns_per_tick(budget);
            }
            let options = simulate::SimulationOptions {
                shops,
                ticks,
                seed,
                respawn_cooldown,
                realtime,
            };
            simulate::run(config, options).await
        }
        Command::List => list_shopkeepers_cmd(&config),
    }
}

fn load_config(args: &Args) -> anyhow::Result<ShopkeepersConfig> {
    let mut config = match &args.config {
        Some(path) => ShopkeepersConfig::load_from_path(path)?,
        None => ShopkeepersConfig::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}", e);
            ShopkeepersConfig::default()
        }),
    };

    if let Some(dir) = &args.data_dir {
        config = config.data_dir(dir.clone());
    }
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}

/// List stored shopkeepers
fn list_shopkeepers_cmd(config: &ShopkeepersConfig) -> anyhow::Result<()> {
    let json_store = config.data_store()?;
    let path = json_store.file_path(SHOPKEEPERS_FILE);
    let stored = ShopkeeperStore::new(json_store).load()?;

    if stored.is_empty() {
        println!("No shopkeepers stored in {}", path.display());
        return Ok(());
    }

    println!("\nStored Shopkeepers ({})\n", path.display());
    println!(
        "{:<10} {:<8} {:<12} {:>8} {:>5} {:>8}  {:<16}",
        "ID", "Type", "World", "X", "Y", "Z", "Region"
    );
    println!("{}", "-".repeat(74));

    for data in &stored.shopkeepers {
        let id = data.unique_id.to_string();
        let region = data.position.region(config.region_shift);
        println!(
            "{:<10} {:<8} {:<12} {:>8} {:>5} {:>8}  {:<16}",
            &id[..8],
            data.object_type,
            data.position.world,
            data.position.x,
            data.position.y,
            data.position.z,
            region.to_string()
        );
    }

    println!("\n{} shopkeeper(s)", stored.len());
    Ok(())
}
