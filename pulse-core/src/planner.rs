//! Action plan generation via Gemini structured output.
//!
//! Provides a `CompletionBackend` trait with the Gemini `generateContent`
//! implementation, and `ActionPlanGenerator`, which formats eligible feedback
//! into a prompt, requests a schema-constrained reply and validates it into an
//! `ActionPlan`.
//!
//! Every call goes to the backend: no retry, no caching. Failures are logged
//! with their cause and surface to callers as a single `GenerateError::Failed`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeneratorConfig;
use crate::models::{ActionPlan, FeedbackRecord};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables consulted, in order, when no key is configured.
pub const API_KEY_ENV_VARS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

// ============================================================================
// Error types
// ============================================================================

/// Underlying causes of a failed generation. Logged, never shown to users.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Response contained no candidate text")]
    EmptyResponse,

    #[error("Response is not a valid action plan: {0}")]
    InvalidPlan(String),
}

/// What callers of `ActionPlanGenerator::generate` see.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateError {
    #[error("A plan is already being generated")]
    Busy,

    #[error("AI summary failed. Please try again later.")]
    Failed,
}

// ============================================================================
// Structured output schema
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    pub properties: BTreeMap<String, SchemaProperty>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    Object,
    String,
}

/// Object with four required string fields: point1, point2, point3, summary.
pub fn action_plan_schema() -> ResponseSchema {
    let fields = [
        ("point1", "First specific action item"),
        ("point2", "Second specific action item"),
        ("point3", "Third specific action item"),
        ("summary", "A brief summary of the overall sentiment"),
    ];

    ResponseSchema {
        kind: SchemaType::Object,
        properties: fields
            .iter()
            .map(|(name, description)| {
                (
                    name.to_string(),
                    SchemaProperty {
                        kind: SchemaType::String,
                        description: description.to_string(),
                    },
                )
            })
            .collect(),
        required: fields.iter().map(|(name, _)| name.to_string()).collect(),
    }
}

// ============================================================================
// Prompt and reply parsing
// ============================================================================

/// One line per record whose comment is non-empty after trimming.
pub fn format_feedback_lines(records: &[FeedbackRecord]) -> String {
    records
        .iter()
        .filter(|r| r.has_comment())
        .map(|r| format!("[Mood: {}/5] Comment: {}", r.mood, r.comment))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(records: &[FeedbackRecord]) -> String {
    format!(
        "You are an expert HR consultant and organizational psychologist.\n\
         Analyze the following employee feedback data and generate a clear, empathetic 3-point action plan for management.\n\
         \n\
         Feedback Data:\n\
         {}\n\
         \n\
         Identify recurring themes, morale issues, or positive trends.\n\
         Your response should be professional, constructive, and prioritized by impact.\n",
        format_feedback_lines(records)
    )
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    point1: Option<String>,
    point2: Option<String>,
    point3: Option<String>,
    summary: Option<String>,
}

/// Parse reply text into a plan. Every field must be present and non-blank.
pub fn parse_action_plan(text: &str) -> Result<ActionPlan, PlanError> {
    let raw: RawPlan = serde_json::from_str(text.trim())
        .map_err(|e| PlanError::InvalidPlan(e.to_string()))?;

    let missing = |name: &str| PlanError::InvalidPlan(format!("missing field `{}`", name));
    let plan = ActionPlan {
        point1: raw.point1.ok_or_else(|| missing("point1"))?,
        point2: raw.point2.ok_or_else(|| missing("point2"))?,
        point3: raw.point3.ok_or_else(|| missing("point3"))?,
        summary: raw.summary.ok_or_else(|| missing("summary"))?,
    };

    if let Some(field) = plan.first_blank_field() {
        return Err(PlanError::InvalidPlan(format!("field `{}` is empty", field)));
    }
    Ok(plan)
}

// ============================================================================
// CompletionBackend trait
// ============================================================================

/// Abstraction over schema-constrained text generation services.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send `prompt` and return the raw reply text, which the service was
    /// asked to shape according to `schema`.
    async fn complete(&self, prompt: &str, schema: &ResponseSchema) -> Result<String, PlanError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a ResponseSchema,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiCompletionClient
// ============================================================================

/// Calls the Gemini `generateContent` endpoint with a response schema.
#[derive(Debug, Clone)]
pub struct GeminiCompletionClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

/// Configured key, else the first non-empty of `API_KEY_ENV_VARS`.
pub fn resolve_api_key(configured: Option<String>) -> Option<String> {
    configured
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|k| !k.trim().is_empty())
        })
}

impl GeminiCompletionClient {
    pub fn new(config: &GeneratorConfig) -> Result<Self, PlanError> {
        let api_key = resolve_api_key(config.api_key.clone()).ok_or(PlanError::MissingApiKey)?;
        Self::with_base_url(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// Create a client against a custom base URL (for testing / proxies)
    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, PlanError> {
        if api_key.is_empty() {
            return Err(PlanError::MissingApiKey);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for GeminiCompletionClient {
    async fn complete(&self, prompt: &str, schema: &ResponseSchema) -> Result<String, PlanError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateContentRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            return Err(PlanError::Api { code, message });
        }

        let body: GenerateContentResponse = response.json().await?;

        body.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text.filter(|t| !t.trim().is_empty()))
            .ok_or(PlanError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// ActionPlanGenerator
// ============================================================================

/// Turns feedback into an action plan. At most one generation runs at a time.
pub struct ActionPlanGenerator {
    backend: Arc<dyn CompletionBackend>,
    schema: ResponseSchema,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ActionPlanGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            schema: action_plan_schema(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self, PlanError> {
        Ok(Self::new(Arc::new(GeminiCompletionClient::new(config)?)))
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    pub async fn generate(&self, records: &[FeedbackRecord]) -> Result<ActionPlan, GenerateError> {
        let _guard = self.begin().ok_or(GenerateError::Busy)?;

        let eligible = records.iter().filter(|r| r.has_comment()).count();
        tracing::info!(
            backend = self.backend.name(),
            records = records.len(),
            eligible,
            "Generating action plan"
        );

        let prompt = build_prompt(records);
        let result = match self.backend.complete(&prompt, &self.schema).await {
            Ok(text) => parse_action_plan(&text),
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            tracing::error!(backend = self.backend.name(), error = %e, "Action plan generation failed");
            GenerateError::Failed
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
