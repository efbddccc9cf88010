//! Feedback intake — validation and the intake form's confirmation cycle.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::models::{FeedbackRecord, Mood};

/// Reference confirmation delay before the form resets.
pub const DEFAULT_CONFIRMATION_DELAY: Duration = Duration::from_secs(3);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Please select a mood before submitting")]
    MoodNotSelected,

    #[error("Invalid mood {0}: must be between 1 and 5")]
    InvalidMood(i64),

    #[error("Feedback was just submitted; the form resets shortly")]
    AwaitingReset,
}

/// Build a new record. A missing mood is refused, never defaulted.
///
/// Takes the raw submitted number so anything outside 1..=5, including
/// values that do not fit a `u8`, is reported as `InvalidMood`.
pub fn submit(mood: Option<i64>, comment: &str) -> Result<FeedbackRecord, IntakeError> {
    let value = mood.ok_or(IntakeError::MoodNotSelected)?;
    let mood = u8::try_from(value)
        .ok()
        .and_then(Mood::new)
        .ok_or(IntakeError::InvalidMood(value))?;
    Ok(FeedbackRecord::new(mood, comment))
}

/// Intake form state: selection, comment, and the post-submit confirmation.
#[derive(Debug, Clone)]
pub struct IntakeForm {
    mood: Option<Mood>,
    comment: String,
    confirmed_until: Option<Instant>,
    delay: Duration,
}

impl Default for IntakeForm {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_DELAY)
    }
}

impl IntakeForm {
    pub fn new(delay: Duration) -> Self {
        Self {
            mood: None,
            comment: String::new(),
            confirmed_until: None,
            delay,
        }
    }

    pub fn select_mood(&mut self, value: u8) -> Result<(), IntakeError> {
        self.mood = Some(Mood::new(value).ok_or(IntakeError::InvalidMood(value.into()))?);
        Ok(())
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn mood(&self) -> Option<Mood> {
        self.mood
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The submit control is enabled only once a mood is chosen.
    pub fn can_submit(&self) -> bool {
        self.mood.is_some() && self.confirmed_until.is_none()
    }

    pub fn is_confirming(&self) -> bool {
        self.confirmed_until.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn submit(&mut self, now: Instant) -> Result<FeedbackRecord, IntakeError> {
        if self.confirmed_until.is_some() {
            return Err(IntakeError::AwaitingReset);
        }
        let record = submit(self.mood.map(|m| i64::from(m.value())), &self.comment)?;
        self.confirmed_until = Some(now + self.delay);
        Ok(record)
    }

    /// Clears mood and comment once the confirmation delay has elapsed.
    /// Returns true when a reset happened.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.confirmed_until {
            Some(deadline) if now >= deadline => {
                self.mood = None;
                self.comment.clear();
                self.confirmed_until = None;
                true
            }
            _ => false,
        }
    }
}
