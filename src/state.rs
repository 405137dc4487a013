use std::sync::Arc;
use std::time::Instant;

use crate::services::ReviewStateService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    review_states: Arc<ReviewStateService>,
}

impl AppState {
    pub fn new(review_states: Arc<ReviewStateService>) -> Self {
        Self {
            started_at: Instant::now(),
            review_states,
        }
    }

    pub fn review_states(&self) -> &ReviewStateService {
        &self.review_states
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
