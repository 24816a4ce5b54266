//! Health check command.
//!
//! Queries the `/health` endpoint and displays server status.

use anyhow::Result;
use clap::Args;
use mindcraft_core::api::HealthResponse;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Include loaded processors and live viewers
    #[arg(short, long)]
    detailed: bool,
}

pub async fn execute(args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            output::print_header("Server Health");
            output::print_detail("Status", &health.status);
            output::print_detail("API URL", client.base_url());
            output::print_detail("Version", &health.version);
            output::print_detail("Timestamp", &health.timestamp);
            output::print_detail("Event store", &health.store);
            output::print_detail("Experiments loaded", &health.experiments_loaded.to_string());

            if args.detailed {
                let processors = if health.processors.is_empty() {
                    "none".to_string()
                } else {
                    health.processors.join(", ")
                };
                output::print_detail("Processors", &processors);
                output::print_detail("Live viewers", &health.sync_subscribers.to_string());
            }

            println!();
            if health.status == "healthy" {
                output::print_success("Server operational");
            } else {
                output::print_error(&format!("Server status: {}", health.status));
            }
        }
        _ => output::print_item(&health, format)?,
    }

    Ok(())
}
