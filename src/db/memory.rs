use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;

use super::{sort_for_listing, StoreError};
use crate::scheduler::ReviewState;

type StateKey = (String, String);

/// Process-local store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    states: RwLock<BTreeMap<StateKey, ReviewState>>,
    reminders: RwLock<BTreeSet<(String, String, NaiveDate)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: &ReviewState) -> Result<(), StoreError> {
        let key = (state.user_id.clone(), state.word_id.clone());
        let mut guard = self.states.write();
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        guard.insert(key, state.clone());
        Ok(())
    }

    pub fn get(&self, user_id: &str, word_id: &str) -> Option<ReviewState> {
        self.states
            .read()
            .get(&(user_id.to_string(), word_id.to_string()))
            .cloned()
    }

    pub fn save(&self, state: &ReviewState) -> Result<(), StoreError> {
        let key = (state.user_id.clone(), state.word_id.clone());
        let mut guard = self.states.write();
        match guard.get_mut(&key) {
            Some(slot) => {
                *slot = state.clone();
                Ok(())
            }
            None => Err(StoreError::Missing),
        }
    }

    pub fn delete(&self, user_id: &str, word_id: &str) -> bool {
        self.states
            .write()
            .remove(&(user_id.to_string(), word_id.to_string()))
            .is_some()
    }

    pub fn list_for_user(&self, user_id: &str) -> Vec<ReviewState> {
        let mut out: Vec<ReviewState> = self
            .states
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sort_for_listing(&mut out);
        out
    }

    pub fn list_due_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Vec<ReviewState> {
        let mut out: Vec<ReviewState> = self
            .states
            .read()
            .values()
            .filter(|s| s.user_id == user_id && s.is_due(now))
            .cloned()
            .collect();
        sort_for_listing(&mut out);
        out
    }

    pub fn users_with_due(&self, now: DateTime<Utc>) -> Vec<String> {
        let users: BTreeSet<String> = self
            .states
            .read()
            .values()
            .filter(|s| s.is_due(now))
            .map(|s| s.user_id.clone())
            .collect();
        users.into_iter().collect()
    }

    pub fn reminder_exists(&self, user_id: &str, word_id: &str, day: NaiveDate) -> bool {
        self.reminders
            .read()
            .contains(&(user_id.to_string(), word_id.to_string(), day))
    }

    pub fn record_reminder(&self, user_id: &str, word_id: &str, day: NaiveDate) -> bool {
        self.reminders
            .write()
            .insert((user_id.to_string(), word_id.to_string(), day))
    }
}
