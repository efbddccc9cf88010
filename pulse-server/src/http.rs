//! Culture Pulse HTTP REST API
//!
//! Axum-based HTTP server exposing feedback intake, the manager dashboard and
//! action plan generation over a local feedback store.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health           — health check with store status
//! - GET  /version          — server version info
//! - POST /feedback         — submit anonymous feedback
//! - GET  /feedback/recent  — most recent feedback, newest first
//! - GET  /dashboard        — aggregate stats, current view and plan
//! - POST /plan             — generate a 3-point action plan
//! - POST /reset            — clear all feedback (requires confirmation)
//! - GET  /view, PUT /view  — current view mode

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pulse_core::{
    aggregate, intake, ActionPlanGenerator, FeedbackStore, GenerateError, PulseConfig, Session,
    ViewMode,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub store: FeedbackStore,
    /// `None` when no Gemini API key is configured.
    pub generator: Option<Arc<ActionPlanGenerator>>,
    pub session: Mutex<Session>,
    pub config: PulseConfig,
}

impl HttpState {
    pub fn new(
        store: FeedbackStore,
        generator: Option<Arc<ActionPlanGenerator>>,
        config: PulseConfig,
    ) -> Self {
        Self {
            store,
            generator,
            session: Mutex::new(Session::new()),
            config,
        }
    }

    /// Session state survives a panicked holder; it carries no invariants a
    /// half-finished update could break.
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/feedback", post(feedback_handler))
        .route("/feedback/recent", get(recent_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/plan", post(plan_handler))
        .route("/reset", post(reset_handler))
        .route("/view", get(view_handler).put(set_view_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Culture Pulse HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct SubmitRequest {
    /// Absent until the employee picks a mood. Kept wide so out-of-range
    /// numbers reach intake validation instead of failing extraction.
    pub mood: Option<i64>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub mode: ViewMode,
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": msg.into(),
        "status": "error",
    })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — reports store status.
pub fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "records": state.store.load().len(),
            "generator": state
                .generator
                .as_ref()
                .map(|g| g.backend_name().to_string())
                .unwrap_or_else(|| "disabled".to_string()),
            "data_dir": state.config.storage.data_dir,
            "confirmation_secs": state.config.intake.confirmation_secs,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "pulse/1",
    })
}

/// Inner submit — validates the intake and appends to the store.
pub fn feedback_inner(state: &HttpState, req: SubmitRequest) -> (StatusCode, serde_json::Value) {
    let record = match intake::submit(req.mood, &req.comment) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, error_body(e.to_string())),
    };

    match state.store.append(record.clone()) {
        Ok(all) => {
            tracing::info!(mood = record.mood.value(), total = all.len(), "Feedback received");
            (
                StatusCode::CREATED,
                serde_json::json!({
                    "record": record,
                    "total": all.len(),
                    "message": "Feedback shared! Thank you for contributing anonymously.",
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to persist feedback");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to save feedback"))
        }
    }
}

/// Inner recent — newest records first, capped at `limit` (default from config).
pub fn recent_inner(state: &HttpState, query: RecentQuery) -> (StatusCode, serde_json::Value) {
    let limit = query.limit.unwrap_or(state.config.dashboard.recent_limit);
    let records = aggregate::recent(&state.store.load(), limit);
    (
        StatusCode::OK,
        serde_json::json!({
            "count": records.len(),
            "records": records,
        }),
    )
}

/// Inner dashboard — summary recomputed from the store on every call.
pub fn dashboard_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let records = state.store.load();
    let summary = aggregate::summarize(&records, state.config.dashboard.recent_limit);
    let session = state.session();
    (
        StatusCode::OK,
        serde_json::json!({
            "summary": summary,
            "view": session.view(),
            "plan": session.plan(),
            "plan_error": session.plan_error(),
            "generating": state.generator.as_ref().map(|g| g.is_busy()).unwrap_or(false),
        }),
    )
}

/// Inner plan — runs one generation against the current records.
pub async fn plan_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let generator = match &state.generator {
        Some(g) => g.clone(),
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                error_body("Plan generation is not configured (missing API key)"),
            );
        }
    };

    // A reset or view change from here on invalidates this generation.
    let epoch = state.session().epoch();
    let store = state.store.clone();
    let records = match tokio::task::spawn_blocking(move || store.load()).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(error = %e, "Store task join error");
            return (StatusCode::INTERNAL_SERVER_ERROR, error_body("Internal error"));
        }
    };
    if records.is_empty() {
        return (StatusCode::BAD_REQUEST, error_body("No feedback to analyze yet"));
    }

    let outcome = generator.generate(&records).await;

    let (status, body, settled) = match outcome {
        Ok(plan) => {
            let body = serde_json::json!({ "plan": plan });
            let kept = state.session().settle(epoch, Ok(plan));
            (StatusCode::OK, body, kept)
        }
        Err(GenerateError::Busy) => {
            return (
                StatusCode::CONFLICT,
                error_body(GenerateError::Busy.to_string()),
            );
        }
        Err(e @ GenerateError::Failed) => {
            let kept = state.session().settle(epoch, Err(e.to_string()));
            (StatusCode::BAD_GATEWAY, error_body(e.to_string()), kept)
        }
    };

    if !settled {
        tracing::info!("Plan state changed during generation, result not kept");
    }
    (status, body)
}

/// Inner reset — destroys all feedback once confirmed.
pub fn reset_inner(state: &HttpState, req: ResetRequest) -> (StatusCode, serde_json::Value) {
    if !req.confirm {
        return (
            StatusCode::BAD_REQUEST,
            error_body("Clearing all feedback cannot be undone; resend with confirm=true"),
        );
    }

    match state.store.clear() {
        Ok(()) => {
            state.session().discard_plan();
            (StatusCode::OK, serde_json::json!({ "cleared": true }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to clear feedback store");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Failed to clear feedback"))
        }
    }
}

pub fn view_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    (StatusCode::OK, serde_json::json!({ "mode": state.session().view() }))
}

pub fn set_view_inner(state: &HttpState, req: ViewRequest) -> (StatusCode, serde_json::Value) {
    let mut session = state.session();
    session.set_view(req.mode);
    (StatusCode::OK, serde_json::json!({ "mode": session.view() }))
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

/// Run a store-backed inner function on the blocking pool; the store does
/// synchronous file I/O under a std mutex.
async fn run_blocking<F>(state: Arc<HttpState>, f: F) -> (StatusCode, serde_json::Value)
where
    F: FnOnce(&HttpState) -> (StatusCode, serde_json::Value) + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&state)).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Store task join error");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body("Internal error"))
        }
    }
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = run_blocking(state, health_inner).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn feedback_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<SubmitRequest>,
) -> impl IntoResponse {
    let (status, body) = run_blocking(state, move |s| feedback_inner(s, req)).await;
    (status, Json(body))
}

pub async fn recent_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let (status, body) = run_blocking(state, move |s| recent_inner(s, query)).await;
    (status, Json(body))
}

pub async fn dashboard_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = run_blocking(state, dashboard_inner).await;
    (status, Json(body))
}

pub async fn plan_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = plan_inner(&state).await;
    (status, Json(body))
}

pub async fn reset_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ResetRequest>,
) -> impl IntoResponse {
    let (status, body) = run_blocking(state, move |s| reset_inner(s, req)).await;
    (status, Json(body))
}

pub async fn view_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = view_inner(&state);
    (status, Json(body))
}

pub async fn set_view_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ViewRequest>,
) -> impl IntoResponse {
    let (status, body) = set_view_inner(&state, req);
    (status, Json(body))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
