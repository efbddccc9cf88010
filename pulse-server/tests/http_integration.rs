//! HTTP integration tests for the Culture Pulse REST API
//!
//! Full handler dispatch through the Axum router with `oneshot`, over an
//! in-memory store. Plan generation runs against either a stub backend or a
//! wiremock stand-in for the Gemini API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pulse_core::planner::{PlanError, ResponseSchema};
use pulse_core::{
    seed, ActionPlanGenerator, CompletionBackend, FeedbackStore, GeminiCompletionClient,
    PulseConfig,
};
use pulse_server::http::{build_router, HttpState};
use serde_json::json;
use tokio::sync::Notify;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Backend that replies with a fixed text, or fails.
struct StubBackend {
    reply: Option<String>,
}

#[async_trait]
impl CompletionBackend for StubBackend {
    async fn complete(&self, _prompt: &str, _schema: &ResponseSchema) -> Result<String, PlanError> {
        self.reply.clone().ok_or(PlanError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Backend that signals when a completion starts and holds it until released.
struct GatedBackend {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl CompletionBackend for GatedBackend {
    async fn complete(&self, _prompt: &str, _schema: &ResponseSchema) -> Result<String, PlanError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(plan_json().to_string())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

fn gated_state() -> (Arc<HttpState>, Arc<GatedBackend>) {
    let gate = Arc::new(GatedBackend {
        started: Notify::new(),
        release: Notify::new(),
    });
    let store = FeedbackStore::in_memory();
    seed::bootstrap(&store, true).unwrap();
    let backend: Arc<dyn CompletionBackend> = gate.clone();
    let state = Arc::new(HttpState::new(
        store,
        Some(Arc::new(ActionPlanGenerator::new(backend))),
        PulseConfig::default(),
    ));
    (state, gate)
}

fn plan_json() -> serde_json::Value {
    json!({
        "point1": "Introduce no-meeting focus blocks",
        "point2": "Re-plan the current deadline with the team",
        "point3": "Celebrate collaboration wins publicly",
        "summary": "Sentiment is mixed with clear burnout signals."
    })
}

fn state_with(reply: Option<String>, seeded: bool) -> Arc<HttpState> {
    let store = FeedbackStore::in_memory();
    if seeded {
        seed::bootstrap(&store, true).unwrap();
    }
    let generator = ActionPlanGenerator::new(Arc::new(StubBackend { reply }));
    Arc::new(HttpState::new(
        store,
        Some(Arc::new(generator)),
        PulseConfig::default(),
    ))
}

async fn send(
    state: Arc<HttpState>,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let app = build_router(state);

    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ===========================================================================
// Version / health
// ===========================================================================
#[tokio::test]
async fn test_version_endpoint() {
    let (status, body) = send(state_with(None, false), "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "pulse/1");
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, body) = send(state_with(None, true), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"], 5);
    assert_eq!(body["generator"], "stub");
}

// ===========================================================================
// Intake → dashboard
// ===========================================================================
#[tokio::test]
async fn test_submit_then_dashboard() {
    let state = state_with(None, false);

    for (mood, comment) in [(4, "Love the flexible hours"), (2, ""), (5, "Great sprint")] {
        let (status, body) = send(
            state.clone(),
            "POST",
            "/feedback",
            Some(json!({ "mood": mood, "comment": comment })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "submit failed: {:?}", body);
    }

    let (status, body) = send(state.clone(), "GET", "/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total"], 3);
    assert_eq!(body["summary"]["average_mood"], 3.7);

    let counts: Vec<u64> = body["summary"]["histogram"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["count"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![0, 1, 0, 1, 1]);

    let recent = body["summary"]["recent"].as_array().unwrap();
    assert_eq!(recent[0]["comment"], "Great sprint");
    assert_eq!(recent[2]["comment"], "Love the flexible hours");
}

#[tokio::test]
async fn test_submit_without_mood_is_rejected() {
    let state = state_with(None, false);
    let (status, body) = send(
        state.clone(),
        "POST",
        "/feedback",
        Some(json!({ "comment": "no mood picked" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(state.store.load().is_empty());
}

#[tokio::test]
async fn test_submit_out_of_range_mood_is_json_error() {
    let state = state_with(None, false);
    for mood in [300, -1, 0] {
        let (status, body) = send(
            state.clone(),
            "POST",
            "/feedback",
            Some(json!({ "mood": mood, "comment": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "mood {}", mood);
        assert_eq!(body["status"], "error");
        assert!(
            body["error"].as_str().unwrap().contains(&format!("Invalid mood {}", mood)),
            "unexpected body: {:?}",
            body
        );
    }
    assert!(state.store.load().is_empty());
}

#[tokio::test]
async fn test_recent_endpoint_limit() {
    let state = state_with(None, true);
    let (status, body) = send(state, "GET", "/feedback/recent?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["records"][0]["mood"], 1);
    assert_eq!(body["records"][1]["mood"], 3);
}

// ===========================================================================
// Plan generation
// ===========================================================================
#[tokio::test]
async fn test_plan_success_is_kept_in_session() {
    let state = state_with(Some(plan_json().to_string()), true);

    let (status, body) = send(state.clone(), "POST", "/plan", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["point1"], "Introduce no-meeting focus blocks");

    let (_, dash) = send(state.clone(), "GET", "/dashboard", None).await;
    assert_eq!(dash["plan"]["summary"], "Sentiment is mixed with clear burnout signals.");
    assert!(dash["plan_error"].is_null());
}

#[tokio::test]
async fn test_plan_with_prose_reply_fails_generically() {
    let state = state_with(Some("Just be kinder, honestly.".to_string()), true);

    let (status, body) = send(state.clone(), "POST", "/plan", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "AI summary failed. Please try again later.");

    let (_, dash) = send(state, "GET", "/dashboard", None).await;
    assert!(dash["plan"].is_null());
    assert_eq!(dash["plan_error"], "AI summary failed. Please try again later.");
}

#[tokio::test]
async fn test_plan_backend_error_is_bad_gateway() {
    let state = state_with(None, true);

    let (status, body) = send(state.clone(), "POST", "/plan", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "AI summary failed. Please try again later.");

    let (_, dash) = send(state, "GET", "/dashboard", None).await;
    assert_eq!(dash["plan_error"], "AI summary failed. Please try again later.");
}

#[tokio::test]
async fn test_overlapping_plan_requests_conflict() {
    let (state, gate) = gated_state();

    let first = tokio::spawn(send(state.clone(), "POST", "/plan", None));
    gate.started.notified().await;

    let (status, body) = send(state.clone(), "POST", "/plan", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    let (_, dash) = send(state.clone(), "GET", "/dashboard", None).await;
    assert_eq!(dash["generating"], true);

    gate.release.notify_one();
    let (status, body) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["point1"], "Introduce no-meeting focus blocks");

    let (_, dash) = send(state, "GET", "/dashboard", None).await;
    assert_eq!(dash["generating"], false);
    assert_eq!(dash["plan"]["point1"], "Introduce no-meeting focus blocks");
}

#[tokio::test]
async fn test_plan_finishing_after_reset_is_not_kept() {
    let (state, gate) = gated_state();
    send(state.clone(), "PUT", "/view", Some(json!({ "mode": "management" }))).await;

    let pending = tokio::spawn(send(state.clone(), "POST", "/plan", None));
    gate.started.notified().await;

    let (status, _) = send(state.clone(), "POST", "/reset", Some(json!({ "confirm": true }))).await;
    assert_eq!(status, StatusCode::OK);

    gate.release.notify_one();
    let (status, _) = pending.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (_, dash) = send(state, "GET", "/dashboard", None).await;
    assert_eq!(dash["summary"]["total"], 0);
    assert_eq!(dash["view"], "management");
    assert!(dash["plan"].is_null());
    assert!(dash["plan_error"].is_null());
}

#[tokio::test]
async fn test_plan_finishing_after_view_change_is_not_kept() {
    let (state, gate) = gated_state();
    send(state.clone(), "PUT", "/view", Some(json!({ "mode": "management" }))).await;

    let pending = tokio::spawn(send(state.clone(), "POST", "/plan", None));
    gate.started.notified().await;

    send(state.clone(), "PUT", "/view", Some(json!({ "mode": "employee" }))).await;
    send(state.clone(), "PUT", "/view", Some(json!({ "mode": "management" }))).await;

    gate.release.notify_one();
    let (status, _) = pending.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (_, dash) = send(state, "GET", "/dashboard", None).await;
    assert_eq!(dash["view"], "management");
    assert!(dash["plan"].is_null());
}

#[tokio::test]
async fn test_plan_requires_feedback() {
    let state = state_with(Some(plan_json().to_string()), false);
    let (status, _) = send(state, "POST", "/plan", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_view_change_discards_plan() {
    let state = state_with(Some(plan_json().to_string()), true);

    send(state.clone(), "PUT", "/view", Some(json!({ "mode": "management" }))).await;
    let (status, _) = send(state.clone(), "POST", "/plan", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(state.clone(), "PUT", "/view", Some(json!({ "mode": "employee" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "employee");

    let (_, dash) = send(state, "GET", "/dashboard", None).await;
    assert!(dash["plan"].is_null());
}

#[tokio::test]
async fn test_plan_against_mock_gemini() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-3-flash-preview:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": plan_json().to_string() }] }
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GeminiCompletionClient::with_base_url(
        "test-api-key".to_string(),
        "gemini-3-flash-preview".to_string(),
        mock_server.uri(),
        Duration::from_secs(5),
    )
    .unwrap();

    let store = FeedbackStore::in_memory();
    seed::bootstrap(&store, true).unwrap();
    let state = Arc::new(HttpState::new(
        store,
        Some(Arc::new(ActionPlanGenerator::new(Arc::new(client)))),
        PulseConfig::default(),
    ));

    let (status, body) = send(state, "POST", "/plan", None).await;
    assert_eq!(status, StatusCode::OK);
    for field in ["point1", "point2", "point3", "summary"] {
        assert!(
            body["plan"][field].as_str().map(|s| !s.is_empty()).unwrap_or(false),
            "{} should be a non-empty string",
            field
        );
    }
}

#[tokio::test]
async fn test_plan_with_gemini_error_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-3-flash-preview:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "Internal error encountered." }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GeminiCompletionClient::with_base_url(
        "test-api-key".to_string(),
        "gemini-3-flash-preview".to_string(),
        mock_server.uri(),
        Duration::from_secs(5),
    )
    .unwrap();

    let store = FeedbackStore::in_memory();
    seed::bootstrap(&store, true).unwrap();
    let state = Arc::new(HttpState::new(
        store,
        Some(Arc::new(ActionPlanGenerator::new(Arc::new(client)))),
        PulseConfig::default(),
    ));

    let (status, body) = send(state, "POST", "/plan", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "AI summary failed. Please try again later.");
}

// ===========================================================================
// Reset
// ===========================================================================
#[tokio::test]
async fn test_reset_requires_confirmation() {
    let state = state_with(None, true);

    let (status, _) = send(state.clone(), "POST", "/reset", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.store.load().len(), 5);

    let (status, _) = send(state.clone(), "POST", "/reset", Some(json!({ "confirm": true }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, dash) = send(state, "GET", "/dashboard", None).await;
    assert_eq!(dash["summary"]["total"], 0);
    assert_eq!(dash["summary"]["average_mood"], 0.0);
}
