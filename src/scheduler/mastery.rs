use super::interval::clamp_strength;
use super::milestone::MilestoneGrid;
use super::types::{LearningPhase, ReviewState, ScheduleMode, TOTAL_SLOT_COUNT};

pub const MAX_MASTERY_LEVEL: u8 = 5;
const GUARDRAIL_MIN_REVIEWS: u32 = 3;
const GUARDRAIL_CAP: u32 = 2;
const MASTERED_LEVEL: u8 = 5;
const REVIEWING_LEVEL: u8 = 3;

// Absorbs accumulated float error, e.g. 0.1 * 6 landing just under 0.6.
const STRENGTH_EPSILON: f64 = 1e-9;

pub struct MasteryEstimator;

impl MasteryEstimator {
    /// Displayed 0-5 level for whichever mechanism owns the state.
    pub fn estimate(state: &ReviewState) -> u8 {
        let raw = match state.mode {
            ScheduleMode::Continuous => Self::continuous_level(
                state.memory_strength,
                state.review_count,
                state.correct_count,
            ),
            ScheduleMode::Milestone => Self::milestone_level(&state.grid()),
        };
        Self::apply_guardrail(raw, state.review_count)
    }

    /// `floor(strength * 5)` nudged by one level up for a perfect record and
    /// one level down for a correct rate under one half.
    pub fn continuous_level(memory_strength: f64, review_count: u32, correct_count: u32) -> u8 {
        let base = (clamp_strength(memory_strength) * 5.0 + STRENGTH_EPSILON).floor() as i32;
        let level = base + correct_rate_nudge(review_count, correct_count);
        level.clamp(0, MAX_MASTERY_LEVEL as i32) as u8
    }

    pub fn milestone_level(grid: &MilestoneGrid) -> u8 {
        let level = grid.completed() * MAX_MASTERY_LEVEL as usize / TOTAL_SLOT_COUNT;
        level.min(MAX_MASTERY_LEVEL as usize) as u8
    }

    /// Fewer than three reviews can never show more than level 2.
    pub fn apply_guardrail(level: u8, review_count: u32) -> u8 {
        let level = level.min(MAX_MASTERY_LEVEL);
        if review_count >= GUARDRAIL_MIN_REVIEWS {
            return level;
        }
        let cap = GUARDRAIL_CAP.max(review_count);
        (level as u32).min(cap) as u8
    }

    pub fn phase(state: &ReviewState) -> LearningPhase {
        Self::phase_for(state.review_count, Self::estimate(state))
    }

    pub fn phase_for(review_count: u32, level: u8) -> LearningPhase {
        if review_count == 0 {
            LearningPhase::New
        } else if level >= MASTERED_LEVEL {
            LearningPhase::Mastered
        } else if level < REVIEWING_LEVEL {
            LearningPhase::Learning
        } else {
            LearningPhase::Reviewing
        }
    }
}

/// `floor((correct / reviews - 0.5) * 2)` evaluated exactly on integers.
fn correct_rate_nudge(review_count: u32, correct_count: u32) -> i32 {
    if review_count == 0 {
        return 0;
    }
    let correct = correct_count.min(review_count) as u64;
    let reviews = review_count as u64;
    if correct >= reviews {
        1
    } else if 2 * correct < reviews {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::types::{LONG_SLOT_COUNT, SHORT_SLOT_COUNT};
    use chrono::{Duration, TimeZone, Utc};

    fn state(mode: ScheduleMode) -> ReviewState {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ReviewState::new("u1", "w1", mode, now, Duration::minutes(10))
    }

    #[test]
    fn test_fresh_state_is_level_zero() {
        assert_eq!(MasteryEstimator::estimate(&state(ScheduleMode::Continuous)), 0);
        assert_eq!(MasteryEstimator::estimate(&state(ScheduleMode::Milestone)), 0);
    }

    #[test]
    fn test_correct_rate_nudges() {
        // 0.6 strength -> base 3
        assert_eq!(MasteryEstimator::continuous_level(0.6, 10, 10), 4);
        assert_eq!(MasteryEstimator::continuous_level(0.6, 10, 5), 3);
        assert_eq!(MasteryEstimator::continuous_level(0.6, 10, 4), 2);
        assert_eq!(MasteryEstimator::continuous_level(0.6, 0, 0), 3);
    }

    #[test]
    fn test_accumulated_strength_is_not_truncated_down() {
        let strength = (0..6).fold(0.0, |acc, _| acc + 0.1);
        assert_eq!(MasteryEstimator::continuous_level(strength, 6, 3), 3);
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(MasteryEstimator::continuous_level(1.0, 5, 5), 5);
        assert_eq!(MasteryEstimator::continuous_level(0.0, 5, 0), 0);
        assert_eq!(MasteryEstimator::continuous_level(7.0, 5, 9), 5);
    }

    #[test]
    fn test_guardrail_caps_early_reviews() {
        let mut s = state(ScheduleMode::Continuous);
        s.memory_strength = 1.0;
        s.review_count = 2;
        s.correct_count = 2;
        assert_eq!(MasteryEstimator::estimate(&s), 2);

        s.review_count = 3;
        s.correct_count = 3;
        assert_eq!(MasteryEstimator::estimate(&s), 5);
    }

    #[test]
    fn test_milestone_levels() {
        let mut grid = MilestoneGrid::default();
        assert_eq!(MasteryEstimator::milestone_level(&grid), 0);

        grid.short_slots = [true; SHORT_SLOT_COUNT];
        assert_eq!(MasteryEstimator::milestone_level(&grid), 1);

        grid.long_slots = [true, true, true, false, false, false];
        assert_eq!(MasteryEstimator::milestone_level(&grid), 3);

        grid.long_slots = [true; LONG_SLOT_COUNT];
        assert_eq!(MasteryEstimator::milestone_level(&grid), 5);
    }

    #[test]
    fn test_phase_projection() {
        assert_eq!(MasteryEstimator::phase_for(0, 0), LearningPhase::New);
        assert_eq!(MasteryEstimator::phase_for(4, 1), LearningPhase::Learning);
        assert_eq!(MasteryEstimator::phase_for(4, 3), LearningPhase::Reviewing);
        assert_eq!(MasteryEstimator::phase_for(9, 5), LearningPhase::Mastered);
    }
}
