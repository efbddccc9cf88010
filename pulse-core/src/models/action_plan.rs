use serde::{Deserialize, Serialize};

/// Three prioritized action items plus a sentiment summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub point1: String,
    pub point2: String,
    pub point3: String,
    pub summary: String,
}

impl ActionPlan {
    pub fn points(&self) -> [&str; 3] {
        [&self.point1, &self.point2, &self.point3]
    }

    /// Name of the first field that is blank, if any.
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("point1", &self.point1),
            ("point2", &self.point2),
            ("point3", &self.point3),
            ("summary", &self.summary),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
    }
}
