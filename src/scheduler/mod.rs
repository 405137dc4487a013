//! Spaced-repetition scheduling engine
//!
//! Contains:
//! - IntervalPolicy - continuous stage / ease factor progression
//! - MilestoneGridPolicy - nine checkable review milestones
//! - MasteryEstimator - 0-5 mastery level and learning phase
//! - DueQueuePrioritizer - session queue ordering
//! - ReminderEligibility - once-per-day reminder gate
//!
//! Everything here is pure: callers pass in the state snapshot and `now`,
//! and persist whatever comes back.

pub mod interval;
pub mod mastery;
pub mod milestone;
pub mod queue;
pub mod reminder;
pub mod types;

pub use interval::{ContinuousFields, IntervalAdvance, IntervalPolicy, MAX_STAGE};
pub use mastery::{MasteryEstimator, MAX_MASTERY_LEVEL};
pub use milestone::{MilestoneGrid, MilestoneGridPolicy, MilestoneToggle};
pub use queue::DueQueuePrioritizer;
pub use reminder::ReminderEligibility;
pub use types::{
    LearningPhase, Outcome, ParseEnumError, ReviewState, ScheduleMode, Track, DEFAULT_EASE_FACTOR,
    LONG_SLOT_COUNT, MAX_EASE_FACTOR, MIN_EASE_FACTOR, SHORT_SLOT_COUNT, TOTAL_SLOT_COUNT,
};

impl ReviewState {
    pub fn continuous(&self) -> ContinuousFields {
        ContinuousFields {
            stage: self.stage,
            ease_factor: self.ease_factor,
            memory_strength: self.memory_strength,
        }
    }

    pub fn grid(&self) -> MilestoneGrid {
        MilestoneGrid {
            short_slots: self.short_slots,
            long_slots: self.long_slots,
        }
    }

    /// Whether any milestone slot was ever checked, including slots that
    /// were unchecked afterwards.
    pub fn milestone_ever_completed(&self) -> bool {
        self.milestone_completed_at.is_some() || self.grid().completed() > 0
    }
}
