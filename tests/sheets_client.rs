#![cfg(feature = "web")]

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use faultsheet::cell::CellValue;
use faultsheet::config::Config;
use faultsheet::error::SinkError;
use faultsheet::records::SensorCategory;
use faultsheet::sink::{SheetsClient, SpreadsheetSink};
use faultsheet::source::SheetSource;
use faultsheet::table::HeaderedTable;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct SeenAppend {
    spreadsheet: String,
    range: String,
    query: String,
    authorization: Option<String>,
    body: Value,
}

type Seen = Arc<Mutex<Vec<SeenAppend>>>;

async fn append(
    State(seen): State<Seen>,
    Path((spreadsheet, range)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    match spreadsheet.as_str() {
        "missing" => return (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))),
        "locked" => return (StatusCode::FORBIDDEN, Json(json!({"error": "denied"}))),
        "slow" => tokio::time::sleep(Duration::from_secs(3)).await,
        _ => {}
    }
    let rows = body["values"].as_array().map(Vec::len).unwrap_or(0);
    seen.lock().unwrap().push(SeenAppend {
        spreadsheet,
        range,
        query: query.unwrap_or_default(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    (
        StatusCode::OK,
        Json(json!({"updates": {"updatedRows": rows, "updatedCells": rows * 2}})),
    )
}

async fn gviz(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    match params.get("sheet").map(String::as_str) {
        Some("Thermal Data") => (
            StatusCode::OK,
            r#"/*O_o*/
google.visualization.Query.setResponse({"status":"ok","table":{"cols":[{"id":"A","label":"Timestamp"},{"id":"B","label":"Temp_C"},{"id":"C","label":"Fault_Type"}],"rows":[{"c":[{"v":"Date(2024,0,1,8,0,0)"},{"v":88.0},{"v":"Overheating"}]},{"c":[{"v":"Date(2024,0,1,9,0,0)"},{"v":21.0},{"v":"Normal"}]}]}});"#,
        ),
        Some("Vibration Data") => (
            StatusCode::OK,
            r#"setResponse({"status":"ok","table":{"cols":[{"id":"A","label":"timestamp"},{"id":"B","label":"x"},{"id":"C","label":"fault"}],"rows":[{"c":[{"v":"Date(2024,0,1,8,0,0)"},{"v":0.4},{"v":"Bearing fault"}]}]}});"#,
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "boom"),
    }
}

async fn start_mock() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v4/spreadsheets/:id/values/:range", post(append))
        .route("/spreadsheets/d/:id/gviz/tq", get(gviz))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

fn config(addr: SocketAddr, sheet_id: &str) -> Config {
    let base = format!("http://{}", addr);
    let sheet_id = sheet_id.to_string();
    Config::from_lookup(move |key: &str| match key {
        "SHEET_ID" => Some(sheet_id.clone()),
        "SHEETS_API_BASE" | "GVIZ_BASE" => Some(base.clone()),
        "SHEETS_ACCESS_TOKEN" => Some("token-123".to_string()),
        "APPEND_TIMEOUT_SECS" => Some("1".to_string()),
        _ => None,
    })
    .unwrap()
}

fn sink(config: &Config) -> SpreadsheetSink {
    let client = SheetsClient::new(config).unwrap();
    SpreadsheetSink::new(config.destinations.clone(), Arc::new(client))
}

fn thermal_table() -> HeaderedTable {
    let mut table = HeaderedTable::new(vec!["timestamp".into(), "temperature".into()]);
    table.push_row(vec![CellValue::text("2024-01-01 08:00:00"), CellValue::Number(22.0)]);
    table.push_row(vec![CellValue::text("2024-01-01 09:00:00"), CellValue::Empty]);
    table
}

#[tokio::test]
async fn append_posts_rows_in_one_request() {
    let (addr, seen) = start_mock().await;
    let config = config(addr, "sheet-1");

    let outcome = sink(&config).append("THERMAL", &thermal_table()).await.unwrap();
    assert_eq!(outcome.rows_written, 2);
    assert_eq!(outcome.cells_written, 4);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let call = &seen[0];
    assert_eq!(call.spreadsheet, "sheet-1");
    assert_eq!(call.range, "'Thermal Data'!A:Z:append");
    assert_eq!(call.query, "valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS");
    assert_eq!(call.authorization.as_deref(), Some("Bearer token-123"));
    assert_eq!(
        call.body["values"],
        json!([["2024-01-01 08:00:00", 22], ["2024-01-01 09:00:00", ""]])
    );
}

#[tokio::test]
async fn rejected_range_is_an_invalid_destination() {
    let (addr, _) = start_mock().await;
    let err = sink(&config(addr, "missing"))
        .append("THERMAL", &thermal_table())
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::InvalidDestination(_)));
}

#[tokio::test]
async fn refused_permission_is_unavailable() {
    let (addr, _) = start_mock().await;
    let err = sink(&config(addr, "locked"))
        .append("THERMAL", &thermal_table())
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::SinkUnavailable(_)));
}

#[tokio::test]
async fn slow_store_times_out() {
    let (addr, seen) = start_mock().await;
    let err = sink(&config(addr, "slow"))
        .append("THERMAL", &thermal_table())
        .await
        .unwrap_err();
    assert_eq!(err, SinkError::SinkUnavailable("append timed out after 1s".to_string()));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn source_reads_tabs_and_skips_failures() {
    let (addr, _) = start_mock().await;
    let source = SheetSource::new(&config(addr, "sheet-1"));

    let thermal = source.fetch_category(SensorCategory::Thermal).await;
    assert_eq!(thermal.len(), 2);
    assert_eq!(thermal[0].id, "Thermal Data#0");
    assert_eq!(thermal[0].timestamp, "2024-01-01 / 8:00:00");
    assert_eq!(thermal[0].values["temperature"], json!(88.0));

    // the acoustic tab answers 500 and contributes nothing
    assert!(source.fetch_category(SensorCategory::Acoustic).await.is_empty());

    let all = source.fetch_all().await;
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].category, SensorCategory::Vibration);
    assert_eq!(all[2].values["vibration_x"], json!(0.4));
    assert_eq!(all[2].fault_type, "Bearing fault");
}
