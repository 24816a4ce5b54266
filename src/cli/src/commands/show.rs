//! Experiment detail command.
//!
//! Loads the catalog and history, then renders one experiment's detail page
//! the way a live viewer shows it.

use anyhow::{anyhow, Result};
use clap::Args;
use mindcraft_core::view::detail_page;

use super::{bootstrap, focus};
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ShowArgs {
    /// Experiment name
    experiment: String,

    /// Focus one subject instead of the first instance
    #[arg(short, long)]
    subject: Option<String>,
}

pub async fn execute(args: ShowArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let engine = bootstrap(client).await?;
    focus(engine.store(), &args.experiment, args.subject.as_deref())?;

    let page = detail_page(&engine, &engine.store().snapshot())
        .ok_or_else(|| anyhow!("Experiment '{}' is not loaded", args.experiment))?;
    output::print_detail_page(&page, format)
}
