use serde::Serialize;

use crate::models::{ActionPlan, ViewMode};

/// Per-session presentation state: current view plus the latest plan outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    view: ViewMode,
    plan: Option<ActionPlan>,
    plan_error: Option<String>,
    /// Bumped whenever the plan state is invalidated; a generation started
    /// under an older epoch must not write its outcome back.
    #[serde(skip)]
    epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn plan(&self) -> Option<&ActionPlan> {
        self.plan.as_ref()
    }

    pub fn plan_error(&self) -> Option<&str> {
        self.plan_error.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Switching views discards the plan and any plan error.
    pub fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.view = view;
            self.discard_plan();
        }
    }

    pub fn record_plan(&mut self, plan: ActionPlan) {
        self.plan = Some(plan);
        self.plan_error = None;
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.plan = None;
        self.plan_error = Some(message.into());
    }

    /// Drop the plan state, e.g. after the data it was derived from is cleared.
    pub fn discard_plan(&mut self) {
        self.plan = None;
        self.plan_error = None;
        self.epoch += 1;
    }

    /// Record a generation outcome only if nothing invalidated the plan
    /// since `epoch` was taken. Returns whether the outcome was kept.
    pub fn settle(&mut self, epoch: u64, outcome: Result<ActionPlan, String>) -> bool {
        if epoch != self.epoch {
            return false;
        }
        match outcome {
            Ok(plan) => self.record_plan(plan),
            Err(message) => self.record_failure(message),
        }
        true
    }
}
