//! Changefeed HTTP sink.
//!
//! The changefeed's cloud-storage sink writes each batch as a file named
//! `<date>/<prefix>-<db>.<schema>.<table>-<seq>.ndjson`; pointed at this
//! server it issues one `PUT` per file.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `PUT`  | `/{date}/{file}` | Ingest one changefeed batch |
//! | `GET`  | `/status` | Liveness probe, answers `OK` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "malformed_record", "message": "..." } }
//! ```
//!
//! Error codes: `malformed_address` (400), `malformed_record` (400),
//! `invalid_key` (400). Per-event store failures do not fail the request;
//! they show up in the `failed` count of the success body.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::IngestError;
use crate::ingest::IngestService;
use crate::models::IngestSummary;
use crate::store::ElasticStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    ingest: Arc<IngestService>,
}

/// Starts the ingestion server against the configured Elasticsearch store.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    if config.store.password.is_none() {
        warn!(
            env = %config.store.password_env,
            "store password not set; requests will be sent without one"
        );
    }
    let store = Arc::new(ElasticStore::new(&config.store)?);
    let service = Arc::new(IngestService::new(store, config.ingest.clone()));
    let app = router(service, config.server.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "changefeed sink listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the route table around an ingestion service.
pub fn router(service: Arc<IngestService>, max_body_bytes: usize) -> Router {
    let state = AppState { ingest: service };

    Router::new()
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .route("/{date}/{file}", put(handle_ingest))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let code = match err {
            IngestError::MalformedAddress { .. } => "malformed_address",
            IngestError::MalformedRecord { .. } => "malformed_record",
            IngestError::InvalidKey => "invalid_key",
        };
        AppError {
            status: StatusCode::BAD_REQUEST,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /status, GET /health ============

async fn handle_status() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ PUT /{date}/{file} ============

/// Handler for `PUT /{date}/{file}`.
///
/// Answers `200` with the batch summary once every event has been tried,
/// `400` if the file name or any record is malformed.
async fn handle_ingest(
    State(state): State<AppState>,
    Path((date, file)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<IngestSummary>, AppError> {
    debug!(%date, %file, bytes = body.len(), "batch received");
    let summary = state.ingest.ingest(&file, &body).await.map_err(|e| {
        warn!(%file, error = %e, "batch rejected");
        AppError::from(e)
    })?;
    Ok(Json(summary))
}
