//! Experiment listing command.

use anyhow::Result;
use mindcraft_core::view::ExperimentListing;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
struct ExperimentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Title")]
    long_name: String,
    #[tabled(rename = "Participants")]
    participants: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<ExperimentListing> for ExperimentRow {
    fn from(listing: ExperimentListing) -> Self {
        Self {
            participants: listing.participants_label(),
            name: listing.name,
            long_name: listing.long_name,
            description: listing.description,
        }
    }
}

pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let listings: Vec<ExperimentListing> = client.get("/experiments").await?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<ExperimentRow> = listings.into_iter().map(ExperimentRow::from).collect();
            output::print_list(&rows, format)
        }
        _ => output::print_item(&listings, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_uses_participant_label() {
        let row = ExperimentRow::from(ExperimentListing {
            name: "ProbMatch".into(),
            long_name: "Probability Matching".into(),
            description: String::new(),
            participants: Some(1),
        });
        assert_eq!(row.participants, "1 participant");
    }
}
