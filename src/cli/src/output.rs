//! Output formatting utilities for the Mindcraft CLI.
//!
//! Supports table, JSON, and YAML output formats.

use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use mindcraft_core::processors::StatPair;
use mindcraft_core::view::{DetailPage, InstancePanel, NO_DATA};
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Render as a formatted table
    #[default]
    Table,
    /// Render as JSON
    Json,
    /// Render as YAML
    Yaml,
}

/// Print a success message to stdout.
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// Print an error message to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg);
}

/// Print an informational message to stdout.
pub fn print_info(msg: &str) {
    println!("{} {}", "[INFO]".blue().bold(), msg);
}

/// Print a list of items in the requested format.
///
/// For table output, items must implement `Tabled`. For JSON/YAML, items must
/// implement `Serialize`.
pub fn print_list<T: Tabled + Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No results found.".dimmed());
                return Ok(());
            }
            println!("{}", table(items));
        }
        _ => print_item(&items, format)?,
    }
    Ok(())
}

/// Print a single item as JSON or YAML. Table output falls back to JSON.
pub fn print_item<T: Serialize + ?Sized>(item: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(item)?);
        }
    }
    Ok(())
}

/// Print key-value details to the terminal (non-JSON/YAML output).
pub fn print_detail(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print a section header.
pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().underline());
    println!();
}

fn table<T: Tabled>(items: &[T]) -> String {
    Table::new(items)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::left()))
        .to_string()
}

// ── Detail page ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Statistic")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Arguments")]
    args: String,
}

fn stat_rows(stats: &[StatPair]) -> Vec<StatRow> {
    stats
        .iter()
        .map(|s| StatRow {
            name: s.name.clone(),
            value: s.value.to_string(),
        })
        .collect()
}

fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Render a detail page as terminal text.
pub fn render_detail(page: &DetailPage) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n", page.long_name.bold().underline()));
    if !page.description.is_empty() {
        out.push_str(&format!("{}\n", page.description.dimmed()));
    }
    out.push('\n');

    let mut global = vec![StatRow {
        name: "Participants".into(),
        value: page.participants.to_string(),
    }];
    match &page.global_stats {
        Some(stats) => global.extend(stat_rows(stats)),
        None => global.push(StatRow {
            name: "Statistics".into(),
            value: "no processor".into(),
        }),
    }
    out.push_str(&format!("{}\n{}\n\n", "Global".bold(), table(&global)));

    if !page.subjects.is_empty() {
        let picker: Vec<String> = page
            .subjects
            .iter()
            .map(|s| {
                if s.selected {
                    format!("[{}]", s.subject).green().bold().to_string()
                } else {
                    s.subject.to_string()
                }
            })
            .collect();
        out.push_str(&format!("{} {}\n\n", "Subjects:".cyan(), picker.join(" ")));
    }

    match &page.instance {
        Some(panel) => out.push_str(&render_instance(panel)),
        None => out.push_str(&format!("{}\n", NO_DATA.dimmed())),
    }

    out
}

fn render_instance(panel: &InstancePanel) -> String {
    let mut out = String::new();
    let title = format!(
        "Subject {} ({} of {})",
        panel.subject,
        panel.index + 1,
        panel.total
    );
    out.push_str(&format!("{}\n", title.bold()));

    let mut rows = vec![StatRow {
        name: "Complete".into(),
        value: if panel.complete { "True" } else { "False" }.into(),
    }];
    if let Some(stats) = &panel.stats {
        rows.extend(stat_rows(stats));
    }
    out.push_str(&format!("{}\n", table(&rows)));

    let log: Vec<LogRow> = panel
        .events
        .iter()
        .map(|e| LogRow {
            time: format_time(e.time),
            event: e.event.clone(),
            args: e.args.clone(),
        })
        .collect();
    if !log.is_empty() {
        out.push_str(&format!("{}\n", table(&log)));
    }

    let mut nav = Vec::new();
    if panel.has_previous {
        nav.push("<- previous");
    }
    if panel.has_next {
        nav.push("next ->");
    }
    if !nav.is_empty() {
        out.push_str(&format!("{}\n", nav.join("   ").dimmed()));
    }

    out
}

/// Print a detail page in the requested format.
pub fn print_detail_page(page: &DetailPage, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            print!("{}", render_detail(page));
            Ok(())
        }
        _ => print_item(page, format),
    }
}
