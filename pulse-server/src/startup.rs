use std::sync::Arc;

use pulse_core::{seed, ActionPlanGenerator, FeedbackStore, FileStorage, PulseConfig};

use crate::http::HttpState;

/// Open the store, seed it when allowed, and wire the plan generator.
///
/// A missing API key disables plan generation instead of failing startup.
pub fn build_state(config: PulseConfig, allow_seed: bool) -> anyhow::Result<Arc<HttpState>> {
    let storage = FileStorage::new(&config.storage.data_dir)?;
    let store = FeedbackStore::new(Arc::new(storage));

    let records = seed::bootstrap(&store, allow_seed && config.storage.seed_samples)?;
    tracing::info!(
        records = records.len(),
        data_dir = %config.storage.data_dir,
        "Feedback store loaded"
    );

    let generator = match ActionPlanGenerator::from_config(&config.generator) {
        Ok(g) => {
            tracing::info!(model = %config.generator.model, "Action plan generation enabled");
            Some(Arc::new(g))
        }
        Err(e) => {
            tracing::warn!("Action plan generation disabled: {}", e);
            None
        }
    };

    Ok(Arc::new(HttpState::new(store, generator, config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> PulseConfig {
        let mut config = PulseConfig::default();
        config.storage.data_dir = dir.to_string_lossy().to_string();
        config.generator.api_key = Some("test-key".to_string());
        config
    }

    #[test]
    fn test_build_state_seeds_fresh_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = build_state(config_in(dir.path()), true).unwrap();
        assert_eq!(state.store.load().len(), 5);
        assert!(state.generator.is_some());
    }

    #[test]
    fn test_build_state_without_seed() {
        let dir = tempfile::tempdir().unwrap();
        let state = build_state(config_in(dir.path()), false).unwrap();
        assert!(state.store.load().is_empty());
    }
}
