//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `chat`   : Interactive conversation
//! - `ask`    : Single message, single answer
//! - `tools`  : List the tools offered to the model
//! - `config` : Show, locate, or validate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parley_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: a vendor-neutral LLM agent loop with tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.parley/config.toml
    #[arg(short, long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Log every run event
    #[arg(long, global = true)]
    events: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent interactively
    Chat,

    /// Send a single message and print the answer
    Ask {
        /// The message to send
        #[arg(short, long)]
        message: String,
    },

    /// Print the enabled tool definitions as JSON
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML (default)
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = AppConfig::load_with(cli.config.as_deref());

    // Initialize tracing
    let filter = if cli.verbose {
        "debug"
    } else {
        config.as_ref().map_or("info", |c| c.log_level.as_str())
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config {
            action: Some(ConfigAction::Path),
        } => commands::config_cmd::path(cli.config.as_deref()),
        Commands::Config {
            action: Some(ConfigAction::Validate),
        } => commands::config_cmd::validate(config),
        command => {
            let config = config.map_err(|e| format!("Failed to load config: {e}"))?;
            if cli.events {
                commands::events::log_events(&parley_core::EventBus::global());
            }

            match command {
                Commands::Chat => commands::chat::run(&config).await,
                Commands::Ask { message } => commands::ask::run(&config, &message).await,
                Commands::Tools => commands::tools::run(&config),
                Commands::Config { .. } => commands::config_cmd::show(&config),
            }
        }
    }
}
