//! HTTP interface for the guardrail.
//!
//! Routes:
//! - `POST /v1/evaluate`: evaluate a prompt end to end
//! - `POST /v1/decide`: decide on an already-fused signal
//! - `GET /v1/policies`: the loaded policy table
//! - `GET /health` and `GET /metrics`

use crate::api::{Decision, Guardrail, GuardrailOutcome};
use crate::policy::Policy;
use crate::signal::Signal;
use crate::Result;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use validator::Validate;

/// Shared handler state.
#[derive(Clone)]
struct AppState {
    guardrail: Arc<Guardrail>,
}

/// Body of `POST /v1/evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EvaluateRequest {
    /// The natural-language request to check
    #[validate(length(min = 1, message = "prompt cannot be empty"))]
    pub prompt: String,
}

/// Body of `GET /v1/policies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyListing {
    /// Blake3 fingerprint of the loaded table
    pub fingerprint: String,
    /// Fields assumed requested by full-scope requests
    pub sensitive_fields: BTreeSet<String>,
    /// Policies in evaluation order
    pub policies: Vec<Policy>,
}

/// Error body returned by every failing route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error message
    pub error: String,
    /// Error category
    pub category: String,
    /// Present as `deny` when the request must be treated as denied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// A crate error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(crate::Error);

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = if err.fails_closed() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            match err {
                crate::Error::Validation { .. }
                | crate::Error::Parse { .. }
                | crate::Error::Serialization(_)
                | crate::Error::Yaml(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "Request failed");
        }

        let body = ErrorBody {
            error: err.to_string(),
            category: err.category().to_string(),
            action: err.fails_closed().then(|| "deny".to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router.
pub fn router(guardrail: Arc<Guardrail>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/evaluate", post(evaluate))
        .route("/v1/decide", post(decide))
        .route("/v1/policies", get(policies))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { guardrail })
}

/// Serve the router until Ctrl-C.
pub async fn serve(guardrail: Arc<Guardrail>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Guardrail listening");

    axum::serve(listener, router(guardrail))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Guardrail stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": crate::VERSION,
        "policies": state.guardrail.table().len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<AppState>) -> std::result::Result<Response, ApiError> {
    let text = match state.guardrail.telemetry() {
        Some(telemetry) => telemetry.render()?,
        None => String::new(),
    };
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

async fn evaluate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EvaluateRequest>, JsonRejection>,
) -> std::result::Result<Json<GuardrailOutcome>, ApiError> {
    let Json(request) = payload.map_err(|e| crate::Error::parse(e.body_text()))?;
    request
        .validate()
        .map_err(|e| crate::Error::validation_field(e.to_string(), "prompt"))?;

    let outcome = state.guardrail.evaluate(&request.prompt).await?;
    Ok(Json(outcome))
}

async fn decide(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Signal>, JsonRejection>,
) -> std::result::Result<Json<Decision>, ApiError> {
    let Json(signal) = payload.map_err(|e| crate::Error::parse(e.body_text()))?;
    Ok(Json(state.guardrail.decide(&signal.normalized())))
}

async fn policies(State(state): State<AppState>) -> Json<PolicyListing> {
    let table = state.guardrail.table();
    Json(PolicyListing {
        fingerprint: table.fingerprint().to_string(),
        sensitive_fields: table.sensitive_fields().clone(),
        policies: table.policies().to_vec(),
    })
}
