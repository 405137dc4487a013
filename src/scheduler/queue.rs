use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::mastery::MasteryEstimator;
use super::types::ReviewState;

/// Orders review states into a session queue.
///
/// Key, most significant first: overdue before not overdue, more errors
/// first, fewer reviews first, lower mastery first. The sort is stable so
/// equal keys keep their input order.
pub struct DueQueuePrioritizer;

impl DueQueuePrioritizer {
    pub fn sort(states: Vec<ReviewState>, now: DateTime<Utc>) -> Vec<ReviewState> {
        let mut keyed: Vec<(QueueKey, ReviewState)> = states
            .into_iter()
            .map(|state| (QueueKey::of(&state, now), state))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| a.cmp_priority(b));
        keyed.into_iter().map(|(_, state)| state).collect()
    }

    /// Due states only, prioritized and truncated to `limit`.
    pub fn due(states: Vec<ReviewState>, now: DateTime<Utc>, limit: usize) -> Vec<ReviewState> {
        let due: Vec<ReviewState> = states.into_iter().filter(|s| s.is_due(now)).collect();
        let mut sorted = Self::sort(due, now);
        sorted.truncate(limit);
        sorted
    }

    /// Working set for a session: every due state first, then the states
    /// coming due soonest as filler.
    pub fn session(states: Vec<ReviewState>, now: DateTime<Utc>, size: usize) -> Vec<ReviewState> {
        let (due, upcoming): (Vec<_>, Vec<_>) = states.into_iter().partition(|s| s.is_due(now));

        let mut out = Self::sort(due, now);
        if out.len() >= size {
            out.truncate(size);
            return out;
        }

        let mut filler: Vec<(QueueKey, ReviewState)> = upcoming
            .into_iter()
            .map(|state| (QueueKey::of(&state, now), state))
            .collect();
        filler.sort_by(|(ka, a), (kb, b)| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| ka.cmp_priority(kb))
        });

        let remaining = size - out.len();
        out.extend(filler.into_iter().take(remaining).map(|(_, state)| state));
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueKey {
    overdue: bool,
    error_count: u32,
    review_count: u32,
    mastery: u8,
}

impl QueueKey {
    fn of(state: &ReviewState, now: DateTime<Utc>) -> Self {
        Self {
            overdue: state.is_due(now),
            error_count: state.error_count,
            review_count: state.review_count,
            mastery: MasteryEstimator::estimate(state),
        }
    }

    fn cmp_priority(&self, other: &Self) -> Ordering {
        other
            .overdue
            .cmp(&self.overdue)
            .then_with(|| other.error_count.cmp(&self.error_count))
            .then_with(|| self.review_count.cmp(&other.review_count))
            .then_with(|| self.mastery.cmp(&other.mastery))
    }
}
