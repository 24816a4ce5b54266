//! Live experiment view.
//!
//! Fetches history, then follows the server's push channel: every `newData`
//! message is merged into a local live store and the detail page is redrawn
//! on each change notification.

use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use mindcraft_core::engine::AggregationEngine;
use mindcraft_core::state::{LiveStateStore, MergeOutcome};
use mindcraft_core::sync::{apply_message, SyncMessage};
use mindcraft_core::view::detail_page;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{bootstrap, focus};
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

#[derive(Args)]
pub struct WatchArgs {
    /// Experiment name
    experiment: String,

    /// Focus one subject instead of the first instance
    #[arg(short, long)]
    subject: Option<String>,
}

fn render(engine: &AggregationEngine, format: OutputFormat) -> Result<()> {
    let Some(page) = detail_page(engine, &engine.store().snapshot()) else {
        return Ok(());
    };

    match format {
        OutputFormat::Table => {
            print!("{}", CLEAR_SCREEN);
            print!("{}", output::render_detail(&page));
            println!();
            output::print_info("Watching for new data (Ctrl+C to stop)");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&page)?),
        OutputFormat::Yaml => {
            println!("---");
            print!("{}", serde_yaml::to_string(&page)?);
        }
    }
    Ok(())
}

/// What one push-channel frame did to the local store.
#[derive(Debug, PartialEq)]
enum Frame {
    Applied(MergeOutcome),
    Ignored,
    Closed,
}

fn apply_frame(store: &LiveStateStore, frame: Message) -> Frame {
    match frame {
        Message::Text(text) => match SyncMessage::from_json(&text) {
            Ok(message) => Frame::Applied(apply_message(store, message)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed push");
                Frame::Ignored
            }
        },
        Message::Close(_) => Frame::Closed,
        _ => Frame::Ignored,
    }
}

pub async fn execute(args: WatchArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let engine = bootstrap(client).await?;
    focus(engine.store(), &args.experiment, args.subject.as_deref())?;

    let url = client.ws_url();
    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    tracing::debug!(url = %url, "Push channel connected");
    let (_write, mut read) = socket.split();

    let (redraw_tx, mut redraw_rx) = mpsc::unbounded_channel::<()>();
    let listener = engine.store().subscribe(move |_| {
        let _ = redraw_tx.send(());
    });

    render(&engine, format)?;

    let result = loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                Some(Ok(frame)) => match apply_frame(engine.store(), frame) {
                    Frame::Applied(outcome) => tracing::debug!(?outcome, "Push applied"),
                    Frame::Ignored => {}
                    Frame::Closed => {
                        output::print_info("Server closed the connection");
                        break Ok(());
                    }
                },
                None => {
                    output::print_info("Server closed the connection");
                    break Ok(());
                }
                Some(Err(e)) => break Err(anyhow::Error::new(e).context("Push channel failed")),
            },
            Some(()) = redraw_rx.recv() => {
                while redraw_rx.try_recv().is_ok() {}
                render(&engine, format)?;
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    engine.store().unsubscribe(listener);
    result
}
