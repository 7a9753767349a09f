//! Weather forecast pipeline CLI
//!
//! Runs pipeline stages by hand and inspects the published forecast.
//! Scheduled runs use the stage binaries instead.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{forecast, stages};
use std::path::PathBuf;
use weather_lib::{init_tracing, PipelineConfig};

/// Weather forecast pipeline CLI
#[derive(Parser)]
#[command(name = "wxp")]
#[command(author, version, about = "CLI for the Weather Forecast Pipeline", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./weather-pipeline.toml when present)
    #[arg(long, short, env = "WEATHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Emit structured stage logs
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the remote log into the raw table
    Ingest,

    /// Label the raw table with next-step targets
    Label,

    /// Fit and save the temperature and rain models
    Train,

    /// Forecast from the latest reading and publish it
    Predict {
        /// Print the forecast without publishing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Run ingest, label, train and predict in order
    Run {
        /// Skip publishing the final forecast
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the currently published forecast
    Forecast,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        output::print_error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load_from(cli.config.as_deref())
        .context("Failed to load pipeline configuration")?;
    if cli.verbose {
        init_tracing(config.log_format);
    }

    match cli.command {
        Commands::Ingest => stages::run_ingest(&config, cli.format).await,
        Commands::Label => stages::run_label(&config, cli.format),
        Commands::Train => stages::run_train(&config, cli.format),
        Commands::Predict { dry_run } => stages::run_predict(&config, dry_run, cli.format).await,
        Commands::Run { dry_run } => stages::run_all(&config, dry_run, cli.format).await,
        Commands::Forecast => forecast::show_forecast(&config, cli.format).await,
    }
}
