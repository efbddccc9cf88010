pub mod action_plan;
pub mod feedback;
pub mod view;

pub use action_plan::ActionPlan;
pub use feedback::{FeedbackRecord, Mood, Tone, SAMPLE_ID_PREFIX};
pub use view::ViewMode;
