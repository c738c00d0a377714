#![cfg(feature = "web")]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use faultsheet::app::{AppState, router};
use faultsheet::config::Config;
use faultsheet::error::SinkError;
use faultsheet::sink::{MemoryValues, SpreadsheetSink};
use faultsheet::source::SheetSource;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "faultsheet-boundary";

fn config(extra: &[(&str, &str)]) -> Config {
    let mut pairs: Vec<(String, String)> = vec![
        ("SHEET_ID".into(), "sheet-1".into()),
        // nothing listens on the discard port
        ("GVIZ_BASE".into(), "http://127.0.0.1:9".into()),
    ];
    pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Config::from_lookup(move |key: &str| {
        pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
    .unwrap()
}

fn app_with(config: &Config, store: Arc<MemoryValues>) -> axum::Router {
    let state = AppState {
        sink: SpreadsheetSink::new(config.destinations.clone(), store),
        source: SheetSource::new(config),
    };
    router(config, state)
}

fn multipart(file: Option<(&str, &[u8])>, data_type: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(data_type) = data_type {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"dataType\"\r\n\r\n{data_type}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload-data")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn csv_upload_appends_non_blank_rows() {
    let config = config(&[]);
    let store = Arc::new(MemoryValues::new());
    let csv = b"timestamp,temperature,fault_type\n2024-01-01 08:00:00,22.5,Normal\n,,\n";

    let (status, body) = send(
        app_with(&config, store.clone()),
        upload_request(multipart(Some(("thermal.csv", csv)), Some("THERMAL"))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Data successfully uploaded");
    assert_eq!(body["rows_written"], 1);

    let appends = store.appends();
    assert_eq!(appends.len(), 1);
    assert_eq!(appends[0].0, "'Thermal Data'!A:Z");
    assert_eq!(appends[0].1.len(), 1);
}

#[tokio::test]
async fn all_blank_upload_writes_nothing() {
    let config = config(&[]);
    let store = Arc::new(MemoryValues::new());
    let csv = b"timestamp,level\n,\n  ,  \n";

    let (status, body) = send(
        app_with(&config, store.clone()),
        upload_request(multipart(Some(("acoustic.csv", csv)), Some("acoustic"))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows_written"], 0);
    assert!(store.appends().is_empty());
}

#[tokio::test]
async fn configured_tab_names_are_used() {
    let config = config(&[("VIBRATION_SHEET_NAME", "Shaker 2")]);
    let store = Arc::new(MemoryValues::new());
    let json = br#"[{"timestamp": 45292, "vib_x": 0.1}]"#;

    let (status, _) = send(
        app_with(&config, store.clone()),
        upload_request(multipart(Some(("vib.json", json)), Some("Vibration"))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.appends()[0].0, "'Shaker 2'!A:Z");
}

#[tokio::test]
async fn missing_file_is_a_bad_request() {
    let config = config(&[]);
    let (status, body) = send(
        app_with(&config, Arc::new(MemoryValues::new())),
        upload_request(multipart(None, Some("THERMAL"))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file uploaded.");
}

#[tokio::test]
async fn unknown_category_is_a_bad_request() {
    let config = config(&[]);
    let (status, body) = send(
        app_with(&config, Arc::new(MemoryValues::new())),
        upload_request(multipart(Some(("a.csv", b"a\n1\n")), Some("PRESSURE"))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid data type specified: PRESSURE");
}

#[tokio::test]
async fn unsupported_and_empty_files_never_reach_the_sink() {
    let config = config(&[]);
    let store = Arc::new(MemoryValues::new());

    let (status, body) = send(
        app_with(&config, store.clone()),
        upload_request(multipart(Some(("report.pdf", b"%PDF-1.4")), Some("THERMAL"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unsupported file type: pdf");

    let (status, body) = send(
        app_with(&config, store.clone()),
        upload_request(multipart(Some(("empty.json", b"[]")), Some("THERMAL"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "JSON file is empty or could not be parsed.");

    assert!(store.appends().is_empty());
}

#[tokio::test]
async fn sink_failure_is_a_server_error() {
    let config = config(&[]);
    let store = Arc::new(MemoryValues::failing(SinkError::SinkUnavailable(
        "permission denied".to_string(),
    )));

    let (status, body) = send(
        app_with(&config, store),
        upload_request(multipart(Some(("t.csv", b"timestamp\n2024-01-01\n")), Some("THERMAL"))),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Upload failed. Check server logs for details."));
    assert!(message.contains("permission denied"));
}

#[tokio::test]
async fn oversized_uploads_are_refused() {
    let config = config(&[("MAX_UPLOAD_BYTES", "64")]);
    let store = Arc::new(MemoryValues::new());
    let csv = vec![b'x'; 1024];

    let response = app_with(&config, store.clone())
        .oneshot(upload_request(multipart(Some(("big.csv", &csv)), Some("THERMAL"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.appends().is_empty());
}

#[tokio::test]
async fn health_and_record_routes_answer() {
    let config = config(&[]);

    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app_with(&config, Arc::new(MemoryValues::new())), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let request = Request::get("/api/records?category=pressure").body(Body::empty()).unwrap();
    let (status, _) = send(app_with(&config, Arc::new(MemoryValues::new())), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unreachable tabs read as empty
    let request = Request::get("/api/faults").body(Body::empty()).unwrap();
    let (status, body) = send(app_with(&config, Arc::new(MemoryValues::new())), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["THERMAL"]["Overheating"], 0);
    assert_eq!(body["VIBRATION"]["Bearing Fault"], 0);
}
