//! Discovery AI CLI, the main entry point.
//!
//! Commands:
//! - `serve`:  Start the HTTP gateway
//! - `config`: Print the effective configuration (secrets omitted)
//! - `check`:  Validate configuration and the system template

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "discovery",
    about = "Discovery AI: chat facade with dataset email follow-up policy",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.discovery-ai/config.toml)
    #[arg(short, long, global = true, env = "DISCOVERY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Check configuration and system template
    Check,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config.unwrap_or_else(commands::default_config_path);

    match cli.command {
        Commands::Serve { port } => commands::serve::run(&config_path, port).await?,
        Commands::Config => commands::config_cmd::show(&config_path)?,
        Commands::Check => commands::check::run(&config_path)?,
    }

    Ok(())
}
