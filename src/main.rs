mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flightdeck::config::load_config;
use flightdeck::log_format::TargetFirstFormat;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "flightdeck", version, about = "Live flight state store", long_about = None)]
struct Cli {
    /// Path to the config file (defaults to FLIGHTDECK_CONFIG or ./flightdeck.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API with periodic staleness maintenance
    Serve {
        /// Address to bind, overrides the config file
        #[arg(long)]
        bind: Option<String>,
    },
    /// Ingest newline-delimited JSON position reports from a file and print the result
    Replay {
        file: PathBuf,
        /// Also print the active flights after the replay
        #[arg(long)]
        show_active: bool,
    },
    /// Reconstruct a renderable path from a JSON path request file
    Path { file: PathBuf },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .event_format(TargetFirstFormat),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => commands::handle_serve(config, bind).await,
        Commands::Replay { file, show_active } => {
            commands::handle_replay(config, &file, show_active).await
        }
        Commands::Path { file } => commands::handle_path(&file).await,
    }
}
