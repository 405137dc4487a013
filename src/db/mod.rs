pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::scheduler::ReviewState;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("review state already exists")]
    Conflict,
    #[error("review state does not exist")]
    Missing,
    #[error("corrupt review state row: {0}")]
    Corrupt(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Backing store for review states and the reminder ledger.
#[derive(Debug, Clone)]
pub enum ReviewStateStore {
    Memory(Arc<MemoryStore>),
    Sqlite(SqliteStore),
}

impl ReviewStateStore {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryStore::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }

    pub async fn insert(&self, state: &ReviewState) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.insert(state),
            Self::Sqlite(store) => store.insert(state).await,
        }
    }

    pub async fn get(&self, user_id: &str, word_id: &str) -> Result<Option<ReviewState>, StoreError> {
        match self {
            Self::Memory(store) => Ok(store.get(user_id, word_id)),
            Self::Sqlite(store) => store.get(user_id, word_id).await,
        }
    }

    pub async fn save(&self, state: &ReviewState) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.save(state),
            Self::Sqlite(store) => store.save(state).await,
        }
    }

    pub async fn delete(&self, user_id: &str, word_id: &str) -> Result<bool, StoreError> {
        match self {
            Self::Memory(store) => Ok(store.delete(user_id, word_id)),
            Self::Sqlite(store) => store.delete(user_id, word_id).await,
        }
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<ReviewState>, StoreError> {
        match self {
            Self::Memory(store) => Ok(store.list_for_user(user_id)),
            Self::Sqlite(store) => store.list_for_user(user_id).await,
        }
    }

    pub async fn list_due_for_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReviewState>, StoreError> {
        match self {
            Self::Memory(store) => Ok(store.list_due_for_user(user_id, now)),
            Self::Sqlite(store) => store.list_due_for_user(user_id, now).await,
        }
    }

    pub async fn users_with_due(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Memory(store) => Ok(store.users_with_due(now)),
            Self::Sqlite(store) => store.users_with_due(now).await,
        }
    }

    pub async fn reminder_exists(
        &self,
        user_id: &str,
        word_id: &str,
        day: NaiveDate,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Memory(store) => Ok(store.reminder_exists(user_id, word_id, day)),
            Self::Sqlite(store) => store.reminder_exists(user_id, word_id, day).await,
        }
    }

    /// Returns false when a reminder for that day was already recorded.
    pub async fn record_reminder(
        &self,
        user_id: &str,
        word_id: &str,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Memory(store) => Ok(store.record_reminder(user_id, word_id, day)),
            Self::Sqlite(store) => store.record_reminder(user_id, word_id, day, now).await,
        }
    }
}

/// Listing order shared by every backend: soonest due first, then word id.
pub(crate) fn sort_for_listing(states: &mut [ReviewState]) {
    states.sort_by(|a, b| {
        a.next_review_at
            .cmp(&b.next_review_at)
            .then_with(|| a.word_id.cmp(&b.word_id))
    });
}
