//! Milestone-mode progression: nine checkable review checkpoints.
//!
//! Short track: +1h, +4h, +12h. Long track: +1d, +2d, +4d, +7d, +15d, +31d.
//! Only a false -> true flip moves the due time. Unchecking a slot leaves the
//! due time where the earlier completion put it.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::types::{Track, LONG_SLOT_COUNT, SHORT_SLOT_COUNT, TOTAL_SLOT_COUNT};

const SHORT_OFFSET_HOURS: [i64; SHORT_SLOT_COUNT] = [1, 4, 12];
const LONG_OFFSET_DAYS: [i64; LONG_SLOT_COUNT] = [1, 2, 4, 7, 15, 31];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneGrid {
    pub short_slots: [bool; SHORT_SLOT_COUNT],
    pub long_slots: [bool; LONG_SLOT_COUNT],
}

impl MilestoneGrid {
    pub fn completed(&self) -> usize {
        self.short_slots
            .iter()
            .chain(self.long_slots.iter())
            .filter(|done| **done)
            .count()
    }

    pub fn completion_ratio(&self) -> f64 {
        self.completed() as f64 / TOTAL_SLOT_COUNT as f64
    }

    pub fn is_graduated(&self) -> bool {
        self.completed() == TOTAL_SLOT_COUNT
    }

    fn with_flipped(&self, track: Track, index: usize) -> Self {
        let mut next = *self;
        match track {
            Track::Short => next.short_slots[index] = !next.short_slots[index],
            Track::Long => next.long_slots[index] = !next.long_slots[index],
        }
        next
    }

    fn slot(&self, track: Track, index: usize) -> bool {
        match track {
            Track::Short => self.short_slots[index],
            Track::Long => self.long_slots[index],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneToggle {
    pub short_slots: [bool; SHORT_SLOT_COUNT],
    pub long_slots: [bool; LONG_SLOT_COUNT],
    pub next_review_at: DateTime<Utc>,
    pub is_new_completion: bool,
}

impl MilestoneToggle {
    pub fn grid(&self) -> MilestoneGrid {
        MilestoneGrid {
            short_slots: self.short_slots,
            long_slots: self.long_slots,
        }
    }
}

pub struct MilestoneGridPolicy;

impl MilestoneGridPolicy {
    fn short_offset(index: usize) -> Duration {
        Duration::hours(SHORT_OFFSET_HOURS[index])
    }

    fn long_offset(index: usize) -> Duration {
        Duration::days(LONG_OFFSET_DAYS[index])
    }

    pub fn first_short_offset() -> Duration {
        Self::short_offset(0)
    }

    pub fn longest_offset() -> Duration {
        Self::long_offset(LONG_SLOT_COUNT - 1)
    }

    /// Flips `grid[track][index]`.
    ///
    /// `ever_completed` tells whether any completion happened before this one,
    /// even if it was later unchecked. Returns `None` when `index` is outside
    /// the track.
    pub fn toggle(
        grid: &MilestoneGrid,
        ever_completed: bool,
        current_due: DateTime<Utc>,
        track: Track,
        index: usize,
        now: DateTime<Utc>,
    ) -> Option<MilestoneToggle> {
        if index >= track.slot_count() {
            return None;
        }

        let is_new_completion = !grid.slot(track, index);
        let next = grid.with_flipped(track, index);

        let next_review_at = if is_new_completion {
            Self::next_due(&next, ever_completed, now)
        } else {
            current_due
        };

        Some(MilestoneToggle {
            short_slots: next.short_slots,
            long_slots: next.long_slots,
            next_review_at,
            is_new_completion,
        })
    }

    /// Next obligation for a grid: the first open short slot, then the first
    /// open long slot, and the longest offset once everything is done.
    pub fn next_due(grid: &MilestoneGrid, ever_completed: bool, now: DateTime<Utc>) -> DateTime<Utc> {
        if !ever_completed {
            return now + Self::first_short_offset();
        }

        if let Some(idx) = grid.short_slots.iter().position(|done| !done) {
            return now + Self::short_offset(idx);
        }

        if let Some(idx) = grid.long_slots.iter().position(|done| !done) {
            return now + Self::long_offset(idx);
        }

        now + Self::longest_offset()
    }
}
