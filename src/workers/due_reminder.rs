use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info};

use crate::db::StoreError;
use crate::scheduler::DueQueuePrioritizer;
use crate::services::review_states::{ReviewStateService, MAX_BATCH_SIZE};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReminderScanStats {
    pub users_scanned: i64,
    pub items_due: i64,
    pub reminders_recorded: i64,
    pub already_reminded: i64,
    pub failed_users: i64,
}

/// Records one reminder per due (user, word) for the current reminder day.
/// Running it again on the same day records nothing new.
pub async fn scan_due_reminders(
    service: Arc<ReviewStateService>,
) -> Result<ReminderScanStats, super::WorkerError> {
    let start = Instant::now();
    let now = service.now();
    let gate = service.settings().reminder;
    let day = gate.reminder_day(now);
    let store = service.store();

    info!(day = %day, "Starting due reminder scan");

    let mut stats = ReminderScanStats::default();
    let users = store.users_with_due(now).await?;
    stats.users_scanned = users.len() as i64;

    for user_id in users {
        if let Err(e) = remind_user(&service, &user_id, day, now, &mut stats).await {
            error!(user_id = %user_id, error = %e, "Failed to record due reminders");
            stats.failed_users += 1;
        }
    }

    info!(
        users_scanned = stats.users_scanned,
        items_due = stats.items_due,
        reminders_recorded = stats.reminders_recorded,
        already_reminded = stats.already_reminded,
        failed_users = stats.failed_users,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Due reminder scan completed"
    );

    Ok(stats)
}

async fn remind_user(
    service: &ReviewStateService,
    user_id: &str,
    day: NaiveDate,
    now: DateTime<Utc>,
    stats: &mut ReminderScanStats,
) -> Result<(), StoreError> {
    let store = service.store();
    let gate = service.settings().reminder;
    let states = store.list_due_for_user(user_id, now).await?;

    for item in DueQueuePrioritizer::due(states, now, MAX_BATCH_SIZE) {
        stats.items_due += 1;
        let sent_today = store.reminder_exists(&item.user_id, &item.word_id, day).await?;
        if !gate.may_remind(&item, sent_today, now) {
            stats.already_reminded += 1;
            continue;
        }
        if store.record_reminder(&item.user_id, &item.word_id, day, now).await? {
            stats.reminders_recorded += 1;
            debug!(user_id = %item.user_id, word_id = %item.word_id, "Due reminder recorded");
        } else {
            stats.already_reminded += 1;
        }
    }
    Ok(())
}
