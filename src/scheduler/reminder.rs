use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use super::types::ReviewState;

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// One reminder per due item per calendar day, where the day boundary is the
/// reminder subsystem's fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct ReminderEligibility {
    offset: FixedOffset,
}

impl ReminderEligibility {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let minutes = utc_offset_minutes.clamp(-MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES);
        let offset = FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn reminder_day(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    pub fn may_remind(&self, item: &ReviewState, reminders_sent_today: bool, now: DateTime<Utc>) -> bool {
        item.is_due(now) && !reminders_sent_today
    }
}

impl Default for ReminderEligibility {
    fn default() -> Self {
        Self::new(0)
    }
}
