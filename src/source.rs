#![cfg(feature = "web")]
//! Reads category tabs back from the spreadsheet for the dashboard.

use crate::config::{Config, DestinationMap};
use crate::error::IngestError;
use crate::fields::SourceRow;
use crate::gviz::parse_gviz_text;
use crate::records::{NormalizedRecord, SensorCategory, normalize_rows};
use futures::future::join_all;
use reqwest::Client;
use thiserror::Error;

/// Why a tab could not be read
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("query endpoint answered {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Parse(#[from] IngestError),
}

/// Fetches tabs through the visualization query endpoint
#[derive(Clone)]
pub struct SheetSource {
    client: Client,
    gviz_base: String,
    spreadsheet_id: String,
    destinations: DestinationMap,
}

impl SheetSource {
    pub fn new(config: &Config) -> Self {
        SheetSource {
            client: Client::new(),
            gviz_base: config.gviz_base.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            destinations: config.destinations.clone(),
        }
    }

    pub fn query_url(&self, tab: &str) -> String {
        format!(
            "{}/spreadsheets/d/{}/gviz/tq?tqx=out:json&sheet={}",
            self.gviz_base,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(tab)
        )
    }

    /// Raw rows of one tab, keyed by lowercased column label
    pub async fn fetch_rows(&self, tab: &str) -> Result<Vec<SourceRow>, FetchError> {
        let response = self
            .client
            .get(self.query_url(tab))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let text = response.text().await?;
        Ok(parse_gviz_text(&text)?)
    }

    /// Normalized records of one category
    ///
    /// A tab that cannot be fetched or parsed is logged and read as empty,
    /// so one broken tab never hides the others.
    pub async fn fetch_category(&self, category: SensorCategory) -> Vec<NormalizedRecord> {
        let Some(tab) = self.destinations.tab_for(category) else {
            log::warn!("No tab configured for {}", category);
            return Vec::new();
        };
        match self.fetch_rows(tab).await {
            Ok(rows) => {
                log::debug!("Fetched {} rows from {}", rows.len(), tab);
                normalize_rows(category, &rows)
            }
            Err(e) => {
                log::warn!("Could not read sheet {}: {}", tab, e);
                Vec::new()
            }
        }
    }

    /// Every category's records, fetched concurrently, in category order
    pub async fn fetch_all(&self) -> Vec<NormalizedRecord> {
        let fetches = SensorCategory::ALL.map(|category| self.fetch_category(category));
        join_all(fetches).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SheetSource {
        let config = Config::from_lookup(|key| match key {
            "SHEET_ID" => Some("sheet-1".to_string()),
            "GVIZ_BASE" => Some("http://127.0.0.1:9/".to_string()),
            _ => None,
        })
        .unwrap();
        SheetSource::new(&config)
    }

    #[test]
    fn query_url_encodes_tab() {
        assert_eq!(
            source().query_url("Thermal Data"),
            "http://127.0.0.1:9/spreadsheets/d/sheet-1/gviz/tq?tqx=out:json&sheet=Thermal%20Data"
        );
    }

    #[tokio::test]
    async fn unreachable_tabs_read_as_empty() {
        assert!(source().fetch_all().await.is_empty());
    }
}
