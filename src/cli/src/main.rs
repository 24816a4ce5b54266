//! Mindcraft CLI - browse and feed live experiment data.
//!
//! Provides commands for server health, the experiment list, detail pages,
//! live watching, and submitting or simulating events.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{experiments, health, save, show, simulate, watch};
use output::OutputFormat;

/// Mindcraft - live experiment statistics
#[derive(Parser)]
#[command(
    name = "mindcraft",
    version,
    about = "Mindcraft - live experiment statistics",
    long_about = "CLI tool for browsing experiment data, watching it live, and submitting events.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(
        long,
        global = true,
        env = "MINDCRAFT_API_URL",
        default_value = "http://localhost:8080"
    )]
    api_url: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health(health::HealthArgs),

    /// List experiments with participant counts
    Experiments,

    /// Show an experiment's statistics and one instance
    Show(show::ShowArgs),

    /// Follow an experiment live
    Watch(watch::WatchArgs),

    /// Submit one event
    Save(save::SaveArgs),

    /// Simulate ProbMatch participants
    Simulate(simulate::SimulateArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let client = client::ApiClient::new(&cli.api_url)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Experiments => experiments::execute(&client, format).await,
        Commands::Show(args) => show::execute(args, &client, format).await,
        Commands::Watch(args) => watch::execute(args, &client, format).await,
        Commands::Save(args) => save::execute(args, &client, format).await,
        Commands::Simulate(args) => simulate::execute(args, &client, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
