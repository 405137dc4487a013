pub mod review_states;

pub use review_states::{
    OutcomeResult, ReviewStateService, ReviewStateView, ReviewStats, ScheduleError, ToggleResult,
};
