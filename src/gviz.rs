//! Reader for the spreadsheet's visualization query responses.
//!
//! The query endpoint answers with JavaScript rather than bare JSON:
//!
//! ```text
//! /*O_o*/
//! google.visualization.Query.setResponse({"version":"0.6","status":"ok","table":{...}});
//! ```
//!
//! The JSON body is everything from the first `{` to the last `}`.

use crate::error::IngestError;
use crate::fields::SourceRow;
use serde::Deserialize;
use serde_json::Value;

const FORMAT: &str = "query response";

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
    #[serde(default)]
    table: Option<Table>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    detailed_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Table {
    #[serde(default)]
    cols: Vec<Column>,
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Column {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    c: Vec<Option<CellEntry>>,
}

#[derive(Debug, Deserialize)]
struct CellEntry {
    #[serde(default)]
    v: Value,
}

impl Column {
    /// Label when present and non-empty, otherwise the id, lowercased
    fn key(&self) -> String {
        self.label
            .as_deref()
            .filter(|l| !l.is_empty())
            .or(self.id.as_deref())
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// Parse a visualization query response into rows keyed by lowercased
/// column identifiers
///
/// Missing cells become `null`. A response that reports `status: "error"`
/// is returned as `MalformedInput` carrying the first reason given.
///
/// # Examples
/// ```
/// use faultsheet::gviz::parse_gviz_text;
/// use serde_json::json;
///
/// let text = r#"/*O_o*/
/// google.visualization.Query.setResponse({"status":"ok","table":{
///   "cols":[{"id":"A","label":"Timestamp"},{"id":"B","label":""}],
///   "rows":[{"c":[{"v":"Date(2024,0,1)"},{"v":21.5}]}]}});"#;
/// let rows = parse_gviz_text(text).unwrap();
/// assert_eq!(rows[0]["timestamp"], json!("Date(2024,0,1)"));
/// assert_eq!(rows[0]["b"], json!(21.5));
/// ```
pub fn parse_gviz_text(text: &str) -> Result<Vec<SourceRow>, IngestError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(IngestError::malformed(FORMAT, "no JSON body found")),
    };

    let payload: Payload =
        serde_json::from_str(body).map_err(|e| IngestError::malformed(FORMAT, e))?;

    if payload.status.as_deref() == Some("error") {
        let reason = payload
            .errors
            .first()
            .map(|e| e.detailed_message.clone().unwrap_or_else(|| e.reason.clone()))
            .unwrap_or_else(|| "query failed".to_string());
        return Err(IngestError::malformed(FORMAT, reason));
    }

    let table = payload.table.unwrap_or_default();
    let keys: Vec<String> = table.cols.iter().map(Column::key).collect();

    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            let mut out = SourceRow::new();
            for (idx, cell) in row.c.into_iter().enumerate() {
                let Some(key) = keys.get(idx) else {
                    break;
                };
                let value = cell.map(|c| c.v).unwrap_or(Value::Null);
                out.insert(key.clone(), value);
            }
            out
        })
        .collect();

    Ok(rows)
}
