#![cfg(feature = "web")]
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{IngestError, SinkError};
use crate::loader::{self, Upload};
use crate::records::{SensorCategory, fault_counts, merge_by_timestamp};
use crate::sink::{SheetsClient, SpreadsheetSink};
use crate::source::SheetSource;

/// Shared by every request handler
pub struct AppState {
    pub sink: SpreadsheetSink,
    pub source: SheetSource,
}

/// Everything that can go wrong while handling an upload
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file uploaded.")]
    MissingFile,

    #[error("Invalid data type specified: {0}")]
    UnknownCategory(String),

    #[error("Could not read upload form: {0}")]
    Form(#[from] MultipartError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Upload failed. Check server logs for details. Error: {0}")]
    Sink(#[from] SinkError),

    #[error("Upload failed: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingFile | UploadError::UnknownCategory(_) | UploadError::Ingest(_) => {
                StatusCode::BAD_REQUEST
            }
            UploadError::Form(e) => e.status(),
            UploadError::Sink(_) | UploadError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let body = MessageResponse {
            message: self.to_string(),
            rows_written: None,
        };
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows_written: Option<usize>,
}

#[derive(Deserialize)]
struct RecordsQuery {
    category: Option<String>,
}

/// Build the router with CORS, tracing and the upload size limit applied
///
/// # Arguments
/// * `config` - Supplies the allowed front-end origin and the body limit
/// * `state` - Sink and source the handlers use
///
/// # Returns
/// * `Router` - Ready to be served
pub fn router(config: &Config, state: AppState) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    match config.frontend_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => log::warn!(
            "Ignoring unusable front-end origin {:?}; cross-origin requests will be refused",
            config.frontend_origin
        ),
    }

    Router::new()
        .route("/api/upload-data", post(upload_data))
        .route("/api/records", get(get_records))
        .route("/api/merged", get(get_merged))
        .route("/api/faults", get(get_faults))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Bind the configured address and serve until the process is stopped
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = SheetsClient::new(&config)?;
    let state = AppState {
        sink: SpreadsheetSink::new(config.destinations.clone(), Arc::new(client)),
        source: SheetSource::new(&config),
    };
    serve(config, state).await
}

/// Serve a prepared state, e.g. one whose sink writes to memory
pub async fn serve(config: Config, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(&config, state);

    let listener = TcpListener::bind(config.bind).await?;
    log::info!("Server running on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn upload_data(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, UploadError> {
    let mut upload: Option<Upload> = None;
    let mut data_type = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                let mut file = Upload::new(filename, bytes.to_vec());
                if let Some(content_type) = content_type {
                    file = file.with_content_type(content_type);
                }
                upload = Some(file);
            }
            "dataType" => data_type = field.text().await?,
            _ => {}
        }
    }

    let upload = upload.ok_or(UploadError::MissingFile)?;
    let (category, tab) = state
        .sink
        .destinations()
        .resolve(&data_type)
        .ok_or_else(|| UploadError::UnknownCategory(data_type.clone()))?;
    let tab = tab.to_string();
    let filename = upload.filename.clone();
    log::info!("Received {} ({} bytes) for {}", filename, upload.bytes.len(), category);

    let mut table = tokio::task::spawn_blocking(move || loader::normalize(&upload))
        .await
        .map_err(|e| UploadError::Internal(e.to_string()))?
        .inspect_err(|e| log::warn!("Rejected {}: {}", filename, e))?;

    let parsed = table.data_len();
    let dropped = table.sanitize();
    log::info!("Parsed {} rows from {}, dropped {} blank", parsed, filename, dropped);

    let outcome = state
        .sink
        .append(category.code(), &table)
        .await
        .inspect_err(|e| log::error!("Processing or spreadsheet error for {}: {}", filename, e))?;
    log::info!("Data uploaded and {} rows written to sheet: {}", outcome.rows_written, tab);

    Ok(Json(MessageResponse {
        message: "Data successfully uploaded".to_string(),
        rows_written: Some(outcome.rows_written),
    }))
}

async fn get_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecordsQuery>,
) -> Response {
    match params.category.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(name) => match SensorCategory::parse(name) {
            Some(category) => Json(state.source.fetch_category(category).await).into_response(),
            None => UploadError::UnknownCategory(name.to_string()).into_response(),
        },
        None => Json(state.source.fetch_all().await).into_response(),
    }
}

async fn get_merged(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let records = state.source.fetch_all().await;
    Json(merge_by_timestamp(&records))
}

async fn get_faults(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let records = state.source.fetch_all().await;
    Json(fault_counts(&records))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
