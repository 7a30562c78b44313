//! Binary entrypoint for the clanforge CLI.
//!
//! Commands:
//! - `start` - run the engine event loop against the configured data dir
//! - `init` - create a starter `config.toml`
//! - `status` - print an engine snapshot as JSON
//!
//! See the library crate docs for module-level details: `clanforge::`.
use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};

use clanforge::config::Config;
use clanforge::engine::{Engine, EngineNotice};
use clanforge::storage::FactionStore;

#[derive(Parser)]
#[command(name = "clanforge")]
#[command(about = "A faction and territory engine for chunk-based multiplayer worlds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the engine loop
    Start,
    /// Initialize a new configuration file
    Init,
    /// Print engine state and statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes
    // the default file later).
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            info!("Starting clanforge v{}", env!("CARGO_PKG_VERSION"));

            let store = FactionStore::open(&config.storage.data_dir)?;
            let mut engine = Engine::new(config, store);
            engine.load(Utc::now());

            run_engine_loop(engine).await
        }
        Commands::Init => {
            if tokio::fs::metadata(&cli.config).await.is_ok() {
                eprintln!("Config file {} already exists; not overwriting.", cli.config);
                std::process::exit(1);
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote default configuration to {}", cli.config);
            println!("Edit it, then run: clanforge start");
            Ok(())
        }
        Commands::Status => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            let store = FactionStore::open(&config.storage.data_dir)?;
            let mut engine = Engine::new(config, store);
            let now = Utc::now();
            engine.load(now);

            let snapshot = engine.snapshot(now);
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

/// Drive the engine's periodic sweeps once per second until interrupted.
/// The host game server would normally own this loop; the standalone binary
/// provides it for headless operation.
async fn run_engine_loop(mut engine: Engine) -> Result<()> {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for notice in engine.tick(Utc::now()) {
                    match notice {
                        EngineNotice::FreezeStarted { faction, until } => {
                            info!("faction {} is under raid protection until {}", faction, until);
                        }
                        EngineNotice::FreezeEnded { faction } => {
                            info!("raid protection ended for faction {}", faction);
                        }
                        EngineNotice::InviteExpired { invite } => {
                            info!("invite for {} from {} expired", invite.player, invite.faction);
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested; saving all data");
                engine.save_all();
                break;
            }
        }
    }

    Ok(())
}

/// Initialize env_logger from config plus CLI verbosity. TTY detection
/// keeps color codes out of redirected logs.
fn init_logging(config: &Option<Config>, verbose: u8) {
    let level = match verbose {
        0 => config
            .as_ref()
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()));
    if !atty::is(atty::Stream::Stdout) {
        builder.write_style(env_logger::WriteStyle::Never);
    }
    if builder.try_init().is_err() {
        warn!("logger already initialized");
    }
}
