//! Illustrative sample data for a fresh installation.

use chrono::Utc;

use crate::error::PulseError;
use crate::models::{FeedbackRecord, Mood, SAMPLE_ID_PREFIX};
use crate::store::FeedbackStore;

const SAMPLES: [(u8, &str, i64); 5] = [
    (4, "I really love the new flexible hours!", 10_000_000),
    (2, "Meetings are taking over my deep work time.", 8_000_000),
    (5, "Great team collaboration today on the project.", 5_000_000),
    (3, "Office snacks are a bit low lately.", 3_000_000),
    (1, "Feeling quite burnt out with the current deadline.", 1_000_000),
];

/// The five sample records, timestamped relative to `now_ms`.
pub fn sample_feedback(now_ms: i64) -> Vec<FeedbackRecord> {
    SAMPLES
        .iter()
        .enumerate()
        .filter_map(|(i, (mood, comment, age_ms))| {
            Some(FeedbackRecord {
                id: format!("{}{}", SAMPLE_ID_PREFIX, i + 1),
                mood: Mood::new(*mood)?,
                comment: comment.to_string(),
                timestamp: now_ms - age_ms,
            })
        })
        .collect()
}

/// Load the store, seeding samples first when enabled and nothing was ever saved.
/// An existing but unreadable slot is left untouched and loads as empty.
pub fn bootstrap(store: &FeedbackStore, enabled: bool) -> Result<Vec<FeedbackRecord>, PulseError> {
    if enabled && !store.has_data()? {
        let samples = sample_feedback(Utc::now().timestamp_millis());
        store.save(&samples)?;
        tracing::info!(count = samples.len(), "Seeded sample feedback");
        return Ok(samples);
    }
    Ok(store.load())
}
