//! Event submission command.

use anyhow::{Context, Result};
use clap::Args;
use mindcraft_core::events::NewEvent;
use serde_json::Value;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct SaveArgs {
    /// Experiment name
    #[arg(short, long)]
    experiment: String,

    /// Subject identifier; integers are sent as numbers
    #[arg(short, long)]
    subject: String,

    /// Event kind, e.g. Start, ButtonPress, End
    #[arg(long)]
    event: String,

    /// Event arguments as a JSON object
    #[arg(short, long)]
    args: Option<String>,

    /// Timestamp in milliseconds; the server stamps it when omitted
    #[arg(short, long)]
    time: Option<i64>,
}

/// Integers become JSON numbers so that `1` and `"1"` stay the same subject.
fn subject_value(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}

fn build_event(args: &SaveArgs) -> Result<NewEvent> {
    let mut event = NewEvent::new(&args.experiment, subject_value(&args.subject), &args.event);
    if let Some(raw) = &args.args {
        let parsed: Value = serde_json::from_str(raw).context("--args must be valid JSON")?;
        event = event.with_args(parsed);
    }
    if let Some(time) = args.time {
        event = event.with_time(time);
    }
    Ok(event)
}

pub async fn execute(args: SaveArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let saved = client.save(&build_event(&args)?).await?;

    match format {
        OutputFormat::Table => {
            output::print_success(&format!(
                "Saved {} for subject {} in {} at {}",
                saved.event, saved.subject, saved.experiment, saved.time
            ));
            Ok(())
        }
        _ => output::print_item(&saved, format),
    }
}
