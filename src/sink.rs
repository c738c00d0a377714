#![cfg(feature = "web")]
//! Appending ingested rows to the spreadsheet.
//!
//! [`SpreadsheetSink`] owns the destination map and decides what gets
//! written; the actual call goes through a [`ValuesApi`] so the HTTP client
//! can be swapped for an in-memory one.

use crate::config::{Config, DestinationMap};
use crate::error::SinkError;
use crate::table::{HeaderedTable, RawRow};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Widest row the destination range accepts (`A:Z`)
pub const MAX_COLUMNS: usize = 26;

/// What an append reported back
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    pub rows_written: usize,
    pub cells_written: usize,
}

impl AppendOutcome {
    pub fn counted(rows: &[RawRow]) -> Self {
        AppendOutcome {
            rows_written: rows.len(),
            cells_written: rows.iter().map(Vec::len).sum(),
        }
    }
}

/// The spreadsheet's bulk append call
pub trait ValuesApi: Send + Sync {
    /// Append `rows` below the last filled row of `range`, in one request
    fn append<'a>(
        &'a self,
        range: &'a str,
        rows: &'a [RawRow],
    ) -> BoxFuture<'a, Result<AppendOutcome, SinkError>>;
}

/// A1 range covering every row of a tab, columns A to Z
///
/// Tab names are always quoted so names with spaces or punctuation work.
pub fn append_range(tab: &str) -> String {
    format!("'{}'!A:Z", tab.replace('\'', "''"))
}

/// Writes data rows of ingested tables to their category's tab
#[derive(Clone)]
pub struct SpreadsheetSink {
    destinations: DestinationMap,
    api: Arc<dyn ValuesApi>,
}

impl SpreadsheetSink {
    pub fn new(destinations: DestinationMap, api: Arc<dyn ValuesApi>) -> Self {
        SpreadsheetSink { destinations, api }
    }

    pub fn destinations(&self) -> &DestinationMap {
        &self.destinations
    }

    /// Append a table's data rows to the named destination
    ///
    /// The header row is never written; the tab is expected to have one
    /// already. A table without data rows succeeds with zero counts and makes
    /// no remote call.
    ///
    /// # Arguments
    /// * `destination` - Category name, e.g. `THERMAL`
    /// * `table` - The sanitized table
    ///
    /// # Returns
    /// * `Result<AppendOutcome, SinkError>` - Rows and cells written, or why the write failed
    pub async fn append(
        &self,
        destination: &str,
        table: &HeaderedTable,
    ) -> Result<AppendOutcome, SinkError> {
        let (_, tab) = self
            .destinations
            .resolve(destination)
            .ok_or_else(|| SinkError::InvalidDestination(destination.to_string()))?;

        let rows = &table.rows;
        log::debug!("Attempting to append {} rows to sheet: {}", rows.len(), tab);

        if rows.is_empty() {
            log::warn!(
                "No data rows found after sanitization for {}. Returning 0 rows written.",
                tab
            );
            return Ok(AppendOutcome::default());
        }

        let rows = clip_columns(rows, tab);
        let range = append_range(tab);
        self.api.append(&range, &rows).await
    }
}

fn clip_columns<'a>(rows: &'a [RawRow], tab: &str) -> Cow<'a, [RawRow]> {
    if rows.iter().all(|row| row.len() <= MAX_COLUMNS) {
        return Cow::Borrowed(rows);
    }
    log::warn!(
        "Rows for {} are wider than {} columns; extra cells are dropped",
        tab,
        MAX_COLUMNS
    );
    Cow::Owned(
        rows.iter()
            .map(|row| row.iter().take(MAX_COLUMNS).cloned().collect())
            .collect(),
    )
}

/// Client for the spreadsheet's `values:append` REST endpoint
pub struct SheetsClient {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    access_token: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendRequest<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [RawRow],
}

#[derive(Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<UpdateSummary>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSummary {
    #[serde(default)]
    updated_rows: Option<usize>,
    #[serde(default)]
    updated_cells: Option<usize>,
}

impl SheetsClient {
    pub fn new(config: &Config) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.append_timeout)
            .build()
            .map_err(|e| SinkError::SinkUnavailable(e.to_string()))?;

        Ok(SheetsClient {
            client,
            api_base: config.sheets_api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            access_token: config.access_token.clone(),
            timeout: config.append_timeout,
        })
    }

    pub fn append_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
            self.api_base,
            urlencoding::encode(&self.spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn send_append(&self, range: &str, rows: &[RawRow]) -> Result<AppendOutcome, SinkError> {
        let body = AppendRequest {
            range,
            major_dimension: "ROWS",
            values: rows,
        };
        let mut request = self.client.post(self.append_url(range)).json(&body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, range, &detail));
        }

        let counted = AppendOutcome::counted(rows);
        let summary = response
            .json::<AppendResponse>()
            .await
            .ok()
            .and_then(|r| r.updates);

        Ok(match summary {
            Some(s) => AppendOutcome {
                rows_written: s.updated_rows.unwrap_or(counted.rows_written),
                cells_written: s.updated_cells.unwrap_or(counted.cells_written),
            },
            None => counted,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> SinkError {
        if err.is_timeout() {
            SinkError::SinkUnavailable(format!(
                "append timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            SinkError::SinkUnavailable(err.to_string())
        }
    }
}

impl ValuesApi for SheetsClient {
    fn append<'a>(
        &'a self,
        range: &'a str,
        rows: &'a [RawRow],
    ) -> BoxFuture<'a, Result<AppendOutcome, SinkError>> {
        Box::pin(self.send_append(range, rows))
    }
}

fn classify_status(status: reqwest::StatusCode, range: &str, detail: &str) -> SinkError {
    let detail = detail.trim();
    match status.as_u16() {
        400 | 404 => SinkError::InvalidDestination(format!(
            "{} rejected ({}): {}",
            range, status, detail
        )),
        401 | 403 => {
            SinkError::SinkUnavailable(format!("permission denied ({}): {}", status, detail))
        }
        _ => SinkError::SinkUnavailable(format!("{}: {}", status, detail)),
    }
}

/// Keeps appended rows in memory instead of sending them anywhere
#[derive(Default)]
pub struct MemoryValues {
    appends: Mutex<Vec<(String, Vec<RawRow>)>>,
    failure: Option<SinkError>,
}

impl MemoryValues {
    pub fn new() -> Self {
        MemoryValues::default()
    }

    /// A store whose every append fails with `error`
    pub fn failing(error: SinkError) -> Self {
        MemoryValues {
            appends: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    /// Every append made so far, as `(range, rows)`
    pub fn appends(&self) -> Vec<(String, Vec<RawRow>)> {
        self.appends
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ValuesApi for MemoryValues {
    fn append<'a>(
        &'a self,
        range: &'a str,
        rows: &'a [RawRow],
    ) -> BoxFuture<'a, Result<AppendOutcome, SinkError>> {
        Box::pin(async move {
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            self.appends
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push((range.to_string(), rows.to_vec()));
            Ok(AppendOutcome::counted(rows))
        })
    }
}
