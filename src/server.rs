//! HTTP server for the web front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/extract` | Propose CRM changes for a meeting |
//! | `POST` | `/apply` | Merge proposals (or a table payload) into the store |
//! | `GET`  | `/crm-state` | All four collections |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "meeting_text must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `extraction_failed` (500),
//! `persistence_failed` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the front end can be
//! served from anywhere, including `file://`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use crm_filler_core::models::{CrmSnapshot, ExtractionResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::error::CrmError;
use crate::import::read_apply_payload;
use crate::service::{ApplyOutcome, CrmService};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    service: Arc<CrmService>,
}

/// Starts the HTTP server with the configured store and generator.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = CrmService::from_config(config)?;
    run_server_with_service(&config.server.bind, Arc::new(service)).await
}

/// Starts the HTTP server around an existing [`CrmService`].
///
/// Used by tests and embedders that supply their own generator.
pub async fn run_server_with_service(
    bind_addr: &str,
    service: Arc<CrmService>,
) -> anyhow::Result<()> {
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "server started");
    println!("CRM server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// The route table, without binding a socket.
pub fn router(service: Arc<CrmService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/extract", post(handle_extract))
        .route("/apply", post(handle_apply))
        .route("/crm-state", get(handle_state))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn server_error(code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: code.to_string(),
        message: message.into(),
    }
}

/// Client errors keep their message; everything else is logged in full and
/// reported under `code` with a generic message.
fn classify(err: CrmError, code: &str, public_message: &str) -> AppError {
    if err.is_client_error() {
        return bad_request(err.to_string());
    }
    error!(error = %err, code, "request failed");
    server_error(code, public_message)
}

// ============ POST /extract ============

#[derive(Deserialize)]
struct ExtractRequest {
    meeting_text: String,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    contact_name: Option<String>,
}

#[derive(Serialize)]
struct ExtractResponse {
    extracted: ExtractionResult,
}

async fn handle_extract(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    let extracted = state
        .service
        .run_extraction(
            &req.meeting_text,
            req.company_name.as_deref(),
            req.contact_name.as_deref(),
        )
        .await
        .map_err(|e| classify(e, "extraction_failed", "LLM extraction failed"))?;

    Ok(Json(ExtractResponse { extracted }))
}

// ============ POST /apply ============

#[derive(Deserialize)]
struct ApplyRequest {
    gpt_json: serde_json::Value,
}

async fn handle_apply(
    State(state): State<AppState>,
    Json(req): Json<ApplyRequest>,
) -> Result<Json<ApplyOutcome>, AppError> {
    let extraction = read_apply_payload(req.gpt_json).map_err(|e| bad_request(e.to_string()))?;

    let outcome = state
        .service
        .run_apply(&extraction)
        .await
        .map_err(|e| classify(e, "persistence_failed", "CRM update failed"))?;

    Ok(Json(outcome))
}

// ============ GET /crm-state ============

async fn handle_state(State(state): State<AppState>) -> Result<Json<CrmSnapshot>, AppError> {
    let snapshot = state
        .service
        .state()
        .await
        .map_err(|e| classify(e, "internal", "could not read CRM state"))?;
    Ok(Json(snapshot))
}

// ============ GET /health ============

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
