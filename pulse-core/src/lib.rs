pub mod aggregate;
pub mod config;
pub mod error;
pub mod intake;
pub mod models;
pub mod planner;
pub mod seed;
pub mod session;
pub mod store;

pub use aggregate::{average_mood, mood_histogram, recent, summarize, DashboardSummary, MoodBucket};
pub use config::PulseConfig;
pub use error::PulseError;
pub use intake::{IntakeError, IntakeForm};
pub use models::{ActionPlan, FeedbackRecord, Mood, Tone, ViewMode};
pub use planner::{
    ActionPlanGenerator, CompletionBackend, GeminiCompletionClient, GenerateError, PlanError,
    ResponseSchema, DEFAULT_MODEL,
};
pub use session::Session;
pub use store::{FeedbackStore, FileStorage, KeyValueStorage, MemoryStorage, FEEDBACK_SLOT};
