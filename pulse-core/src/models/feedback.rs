use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix carried by the ids of bootstrap sample records.
pub const SAMPLE_ID_PREFIX: &str = "sample-";

/// Likert-style wellbeing rating, 1 (worst) through 5 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Mood(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Neutral,
    Negative,
}

impl Mood {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// All five levels in ascending order.
    pub fn all() -> [Mood; 5] {
        [Mood(1), Mood(2), Mood(3), Mood(4), Mood(5)]
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Awful",
            2 => "Poor",
            3 => "Neutral",
            4 => "Good",
            _ => "Amazing",
        }
    }

    pub fn icon(self) -> &'static str {
        match self.0 {
            1 => "😫",
            2 => "🙁",
            3 => "😐",
            4 => "🙂",
            _ => "🤩",
        }
    }

    pub fn tone(self) -> Tone {
        match self.0 {
            4..=5 => Tone::Positive,
            3 => Tone::Neutral,
            _ => Tone::Negative,
        }
    }
}

impl TryFrom<u8> for Mood {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Mood::new(value).ok_or_else(|| format!("mood must be between 1 and 5, got {}", value))
    }
}

impl From<Mood> for u8 {
    fn from(mood: Mood) -> Self {
        mood.0
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One anonymous submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub mood: Mood,
    pub comment: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl FeedbackRecord {
    pub fn new(mood: Mood, comment: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mood,
            comment: comment.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_sample(&self) -> bool {
        self.id.starts_with(SAMPLE_ID_PREFIX)
    }

    pub fn has_comment(&self) -> bool {
        !self.comment.trim().is_empty()
    }
}
