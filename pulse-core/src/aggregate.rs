//! Dashboard statistics. Pure functions, recomputed on every read.

use serde::{Deserialize, Serialize};

use crate::models::{FeedbackRecord, Mood};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodBucket {
    pub mood: Mood,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total: usize,
    pub average_mood: f64,
    pub histogram: Vec<MoodBucket>,
    pub recent: Vec<FeedbackRecord>,
}

/// Mean mood rounded to one decimal place; 0.0 for no records.
pub fn average_mood(records: &[FeedbackRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: u64 = records.iter().map(|r| u64::from(r.mood.value())).sum();
    let mean = sum as f64 / records.len() as f64;
    (mean * 10.0).round() / 10.0
}

/// Counts per mood, always five buckets in order 1..=5.
pub fn mood_histogram(records: &[FeedbackRecord]) -> Vec<MoodBucket> {
    Mood::all()
        .into_iter()
        .map(|mood| MoodBucket {
            mood,
            label: mood.label().to_string(),
            count: records.iter().filter(|r| r.mood == mood).count(),
        })
        .collect()
}

/// The last `n` records, most recent first.
pub fn recent(records: &[FeedbackRecord], n: usize) -> Vec<FeedbackRecord> {
    records.iter().rev().take(n).cloned().collect()
}

pub fn summarize(records: &[FeedbackRecord], recent_limit: usize) -> DashboardSummary {
    DashboardSummary {
        total: records.len(),
        average_mood: average_mood(records),
        histogram: mood_histogram(records),
        recent: recent(records, recent_limit),
    }
}
