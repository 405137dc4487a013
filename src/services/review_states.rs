use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::SchedulerSettings;
use crate::db::{ReviewStateStore, StoreError};
use crate::scheduler::{
    DueQueuePrioritizer, IntervalAdvance, IntervalPolicy, LearningPhase, MasteryEstimator,
    MilestoneGridPolicy, MilestoneToggle, Outcome, ReviewState, ScheduleMode, Track,
    DEFAULT_EASE_FACTOR, LONG_SLOT_COUNT, SHORT_SLOT_COUNT,
};

pub const DEFAULT_DUE_LIMIT: usize = 50;
pub const MAX_BATCH_SIZE: usize = 500;
const MAX_ID_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("mode conflict: {0}")]
    ModeConflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeResult {
    pub next_review_at: DateTime<Utc>,
    pub stage: u32,
    pub interval_days: f64,
    pub ease_factor: f64,
    pub memory_strength: f64,
    pub mastery_level: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub short_slots: [bool; SHORT_SLOT_COUNT],
    pub long_slots: [bool; LONG_SLOT_COUNT],
    pub next_review_at: DateTime<Utc>,
    pub mastery_level: u8,
    pub is_new_completion: bool,
}

/// A review state plus the projections every screen shows next to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStateView {
    #[serde(flatten)]
    pub state: ReviewState,
    pub mastery_level: u8,
    pub phase: LearningPhase,
    pub is_due: bool,
}

impl ReviewStateView {
    pub fn project(state: ReviewState, now: DateTime<Utc>) -> Self {
        let mastery_level = MasteryEstimator::estimate(&state);
        Self {
            phase: MasteryEstimator::phase_for(state.review_count, mastery_level),
            is_due: state.is_due(now),
            mastery_level,
            state,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_words: i64,
    pub due_words: i64,
    pub new_words: i64,
    pub learning_words: i64,
    pub reviewing_words: i64,
    pub mastered_words: i64,
    pub average_mastery: f64,
}

pub struct ReviewStateService {
    store: ReviewStateStore,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
}

impl ReviewStateService {
    pub fn new(store: ReviewStateStore, clock: Arc<dyn Clock>, settings: SchedulerSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn store(&self) -> &ReviewStateStore {
        &self.store
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn enroll(&self, user_id: &str, word_id: &str) -> Result<ReviewState, ScheduleError> {
        let user_id = validate_id("userId", user_id)?;
        let word_id = validate_id("wordId", word_id)?;

        let state = ReviewState::new(
            user_id,
            word_id,
            self.settings.default_mode,
            self.now(),
            self.settings.first_review_delay,
        );

        match self.store.insert(&state).await {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                return Err(ScheduleError::AlreadyExists("该单词已在复习计划中".to_string()))
            }
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(user_id = %user_id, word_id = %word_id, mode = %state.mode, "review state created");
        Ok(state)
    }

    pub async fn get(&self, user_id: &str, word_id: &str) -> Result<ReviewState, ScheduleError> {
        let user_id = validate_id("userId", user_id)?;
        let word_id = validate_id("wordId", word_id)?;
        self.store
            .get(user_id, word_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound("复习状态不存在".to_string()))
    }

    pub async fn view(&self, user_id: &str, word_id: &str) -> Result<ReviewStateView, ScheduleError> {
        let state = self.get(user_id, word_id).await?;
        Ok(ReviewStateView::project(state, self.now()))
    }

    pub async fn advance_on_outcome(
        &self,
        user_id: &str,
        word_id: &str,
        outcome: Outcome,
    ) -> Result<OutcomeResult, ScheduleError> {
        let current = self.get(user_id, word_id).await?;
        let now = self.now();

        let (next, advance) = apply_outcome(&current, outcome, now)?;
        self.persist(&next).await?;

        tracing::debug!(
            user_id = %next.user_id,
            word_id = %next.word_id,
            outcome = %outcome,
            stage = next.stage,
            interval_days = advance.interval_days,
            "review outcome applied"
        );

        Ok(OutcomeResult {
            next_review_at: advance.next_review_at,
            stage: advance.stage,
            interval_days: advance.interval_days,
            ease_factor: advance.ease_factor,
            memory_strength: advance.memory_strength,
            mastery_level: MasteryEstimator::estimate(&next),
        })
    }

    pub async fn toggle_milestone(
        &self,
        user_id: &str,
        word_id: &str,
        track: Track,
        index: usize,
    ) -> Result<ToggleResult, ScheduleError> {
        let current = self.get(user_id, word_id).await?;
        let now = self.now();

        let (next, toggle) = apply_toggle(&current, track, index, now)?;
        self.persist(&next).await?;

        tracing::debug!(
            user_id = %next.user_id,
            word_id = %next.word_id,
            track = track.as_str(),
            index,
            new_completion = toggle.is_new_completion,
            "milestone toggled"
        );

        Ok(ToggleResult {
            short_slots: toggle.short_slots,
            long_slots: toggle.long_slots,
            next_review_at: toggle.next_review_at,
            mastery_level: MasteryEstimator::estimate(&next),
            is_new_completion: toggle.is_new_completion,
        })
    }

    pub async fn switch_mode(
        &self,
        user_id: &str,
        word_id: &str,
        mode: ScheduleMode,
    ) -> Result<ReviewStateView, ScheduleError> {
        let current = self.get(user_id, word_id).await?;
        let now = self.now();

        if current.mode == mode {
            return Ok(ReviewStateView::project(current, now));
        }

        let next = apply_mode_switch(&current, mode, now);
        self.persist(&next).await?;

        tracing::info!(
            user_id = %next.user_id,
            word_id = %next.word_id,
            from = %current.mode,
            to = %mode,
            "review mode switched"
        );
        Ok(ReviewStateView::project(next, now))
    }

    pub async fn reset(&self, user_id: &str, word_id: &str) -> Result<ReviewStateView, ScheduleError> {
        let current = self.get(user_id, word_id).await?;
        let now = self.now();

        let next = apply_reset(&current, now, self.settings.first_review_delay);
        self.persist(&next).await?;

        tracing::info!(user_id = %next.user_id, word_id = %next.word_id, "review progress reset");
        Ok(ReviewStateView::project(next, now))
    }

    pub async fn remove(&self, user_id: &str, word_id: &str) -> Result<(), ScheduleError> {
        let user_id = validate_id("userId", user_id)?;
        let word_id = validate_id("wordId", word_id)?;
        if !self.store.delete(user_id, word_id).await? {
            return Err(ScheduleError::NotFound("复习状态不存在".to_string()));
        }
        tracing::debug!(user_id = %user_id, word_id = %word_id, "review state deleted");
        Ok(())
    }

    pub async fn list_due(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReviewState>, ScheduleError> {
        let user_id = validate_id("userId", user_id)?;
        let limit = validate_limit(limit)?;
        let states = self.store.list_due_for_user(user_id, now).await?;
        Ok(DueQueuePrioritizer::due(states, now, limit))
    }

    pub async fn build_session(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        size: usize,
    ) -> Result<Vec<ReviewState>, ScheduleError> {
        let user_id = validate_id("userId", user_id)?;
        let size = validate_limit(size)?;
        let states = self.store.list_for_user(user_id).await?;
        Ok(DueQueuePrioritizer::session(states, now, size))
    }

    pub async fn stats(&self, user_id: &str, now: DateTime<Utc>) -> Result<ReviewStats, ScheduleError> {
        let user_id = validate_id("userId", user_id)?;
        let states = self.store.list_for_user(user_id).await?;
        Ok(summarize(&states, now))
    }

    pub fn estimate_mastery(&self, state: &ReviewState) -> u8 {
        MasteryEstimator::estimate(state)
    }

    async fn persist(&self, state: &ReviewState) -> Result<(), ScheduleError> {
        match self.store.save(state).await {
            Ok(()) => Ok(()),
            // Removed between read and write.
            Err(StoreError::Missing) => Err(ScheduleError::NotFound("复习状态不存在".to_string())),
            Err(err) => Err(err.into()),
        }
    }
}

/// Continuous-mode transition for one answer.
pub fn apply_outcome(
    current: &ReviewState,
    outcome: Outcome,
    now: DateTime<Utc>,
) -> Result<(ReviewState, IntervalAdvance), ScheduleError> {
    if current.mode != ScheduleMode::Continuous {
        return Err(ScheduleError::ModeConflict(
            "该单词当前由复习格子计划，请先切换到连续复习模式".to_string(),
        ));
    }

    let advance = IntervalPolicy::advance(current.continuous(), outcome, now);

    let mut next = current.clone();
    next.stage = advance.stage;
    next.ease_factor = advance.ease_factor;
    next.memory_strength = advance.memory_strength;
    next.next_review_at = advance.next_review_at;
    next.review_count = next.review_count.saturating_add(1);
    if outcome.is_correct() {
        next.correct_count = next.correct_count.saturating_add(1);
    } else {
        next.error_count = next.error_count.saturating_add(1);
    }
    next.last_review_at = Some(now);
    next.updated_at = now;

    Ok((next, advance))
}

/// Milestone-mode transition for one checkbox flip. Unchecking only
/// changes the slot itself.
pub fn apply_toggle(
    current: &ReviewState,
    track: Track,
    index: usize,
    now: DateTime<Utc>,
) -> Result<(ReviewState, MilestoneToggle), ScheduleError> {
    if current.mode != ScheduleMode::Milestone {
        return Err(ScheduleError::ModeConflict(
            "该单词当前由连续复习计划，请先切换到复习格子模式".to_string(),
        ));
    }

    let toggle = MilestoneGridPolicy::toggle(
        &current.grid(),
        current.milestone_ever_completed(),
        current.next_review_at,
        track,
        index,
        now,
    )
    .ok_or_else(|| {
        ScheduleError::Validation(format!(
            "index must be below {} for the {} track",
            track.slot_count(),
            track.as_str()
        ))
    })?;

    let mut next = current.clone();
    next.short_slots = toggle.short_slots;
    next.long_slots = toggle.long_slots;
    next.updated_at = now;

    if toggle.is_new_completion {
        next.next_review_at = toggle.next_review_at;
        next.review_count = next.review_count.saturating_add(1);
        next.correct_count = next.correct_count.saturating_add(1);
        next.last_review_at = Some(now);
        next.milestone_completed_at = Some(now);
    }

    Ok((next, toggle))
}

/// Hands `next_review_at` to the other mechanism and re-derives it from
/// that mechanism's own fields.
pub fn apply_mode_switch(current: &ReviewState, mode: ScheduleMode, now: DateTime<Utc>) -> ReviewState {
    let mut next = current.clone();
    next.mode = mode;
    next.next_review_at = match mode {
        ScheduleMode::Continuous => IntervalPolicy::due_at(current.continuous().clamped().stage, now),
        ScheduleMode::Milestone => {
            MilestoneGridPolicy::next_due(&current.grid(), current.milestone_ever_completed(), now)
        }
    };
    next.updated_at = now;
    next
}

pub fn apply_reset(current: &ReviewState, now: DateTime<Utc>, first_delay: Duration) -> ReviewState {
    let mut next = current.clone();
    next.stage = 1;
    next.ease_factor = DEFAULT_EASE_FACTOR;
    next.memory_strength = 0.0;
    next.review_count = 0;
    next.correct_count = 0;
    next.error_count = 0;
    next.last_review_at = None;
    next.milestone_completed_at = None;
    next.next_review_at = now + first_delay.max(Duration::zero());
    next.short_slots = [false; SHORT_SLOT_COUNT];
    next.long_slots = [false; LONG_SLOT_COUNT];
    next.updated_at = now;
    next
}

pub fn summarize(states: &[ReviewState], now: DateTime<Utc>) -> ReviewStats {
    let mut stats = ReviewStats::default();
    let mut mastery_sum = 0u64;

    for state in states {
        let level = MasteryEstimator::estimate(state);
        mastery_sum += u64::from(level);
        stats.total_words += 1;
        if state.is_due(now) {
            stats.due_words += 1;
        }
        match MasteryEstimator::phase_for(state.review_count, level) {
            LearningPhase::New => stats.new_words += 1,
            LearningPhase::Learning => stats.learning_words += 1,
            LearningPhase::Reviewing => stats.reviewing_words += 1,
            LearningPhase::Mastered => stats.mastered_words += 1,
        }
    }

    if stats.total_words > 0 {
        stats.average_mastery = mastery_sum as f64 / stats.total_words as f64;
    }
    stats
}

fn validate_id<'a>(field: &str, value: &'a str) -> Result<&'a str, ScheduleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::Validation(format!("{field} must be a non-empty string")));
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(ScheduleError::Validation(format!(
            "{field} exceeds maximum length of {MAX_ID_LEN}"
        )));
    }
    Ok(trimmed)
}

fn validate_limit(limit: usize) -> Result<usize, ScheduleError> {
    if limit == 0 {
        return Err(ScheduleError::Validation("limit must be positive".to_string()));
    }
    Ok(limit.min(MAX_BATCH_SIZE))
}
