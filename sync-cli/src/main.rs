//! # mirror-sync
//!
//! CLI tool for exercising mirror-sync sessions against an in-memory store.
//!
//! ## Commands
//!
//! - `replay`: Run a TOML script of subject changes and mutations
//! - `demo`: Run a built-in walkthrough
//!
//! Output is one JSON object per line: relay notifications as they happen,
//! and the session view for every `show` step. Logs go to stderr.
//!
//! ## Example
//!
//! ```bash
//! # Walk through a chat history session
//! mirror-sync demo
//!
//! # Same walkthrough on the uploads collection, with debug logs
//! RUST_LOG=mirror_sync_client=debug mirror-sync --preset uploads demo
//!
//! # Replay a script
//! mirror-sync --config mirror-sync.toml replay session.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use mirror_sync_types::CollectionSpec;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{demo, replay};
use config::{CollectionConfig, Config, LoggingConfig};

/// CLI tool for exercising mirror-sync sessions.
#[derive(Parser, Debug)]
#[command(name = "mirror-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: mirror-sync.toml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Mirror a built-in collection instead of the configured one
    #[arg(long, global = true, value_enum)]
    preset: Option<Preset>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a script of session and gateway operations
    Replay {
        /// Script file (TOML, `[[step]]` tables)
        script: PathBuf,
    },

    /// Run the built-in walkthrough
    Demo,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// `messages`, oldest first
    ChatHistory,
    /// `plans`, newest first
    Uploads,
}

impl From<Preset> for CollectionSpec {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::ChatHistory => CollectionSpec::chat_history(),
            Preset::Uploads => CollectionSpec::uploads(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(preset) = cli.preset {
        config.collection = CollectionConfig::from(CollectionSpec::from(preset));
    }
    init_logging(&config.logging);

    match cli.command {
        Commands::Replay { script } => {
            replay::run(&config, &script).await?;
        }
        Commands::Demo => {
            demo::run(&config).await?;
        }
    }

    Ok(())
}

/// Install the stderr subscriber. `RUST_LOG` wins over the config filter.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
