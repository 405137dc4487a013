use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_EASE_FACTOR: f64 = 3.0;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

pub const SHORT_SLOT_COUNT: usize = 3;
pub const LONG_SLOT_COUNT: usize = 6;
pub const TOTAL_SLOT_COUNT: usize = SHORT_SLOT_COUNT + LONG_SLOT_COUNT;

/// Answer quality reported by the review session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Forgot,
    Hard,
    Good,
    Easy,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forgot => "forgot",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }

    pub fn is_correct(&self) -> bool {
        !matches!(self, Self::Forgot)
    }
}

impl FromStr for Outcome {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forgot" | "again" => Ok(Self::Forgot),
            "hard" => Ok(Self::Hard),
            "good" => Ok(Self::Good),
            "easy" => Ok(Self::Easy),
            _ => Err(ParseEnumError::new("outcome", s)),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which progression mechanism owns `next_review_at` for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    #[default]
    Continuous,
    Milestone,
}

impl ScheduleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Milestone => "milestone",
        }
    }
}

impl FromStr for ScheduleMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(Self::Continuous),
            "milestone" => Ok(Self::Milestone),
            _ => Err(ParseEnumError::new("mode", s)),
        }
    }
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Short,
    Long,
}

impl Track {
    pub fn slot_count(&self) -> usize {
        match self {
            Self::Short => SHORT_SLOT_COUNT,
            Self::Long => LONG_SLOT_COUNT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

impl FromStr for Track {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "long" => Ok(Self::Long),
            _ => Err(ParseEnumError::new("track", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Coarse learning phase shown next to the mastery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LearningPhase {
    New,
    Learning,
    Reviewing,
    Mastered,
}

/// Scheduling record for one (user, word) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub id: String,
    pub user_id: String,
    pub word_id: String,
    pub mode: ScheduleMode,
    pub stage: u32,
    pub ease_factor: f64,
    pub memory_strength: f64,
    pub review_count: u32,
    pub correct_count: u32,
    pub error_count: u32,
    pub last_review_at: Option<DateTime<Utc>>,
    /// Latest milestone completion. Continuous-mode reviews never set it.
    #[serde(default)]
    pub milestone_completed_at: Option<DateTime<Utc>>,
    pub next_review_at: DateTime<Utc>,
    pub short_slots: [bool; SHORT_SLOT_COUNT],
    pub long_slots: [bool; LONG_SLOT_COUNT],
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewState {
    /// Fresh state for a word that just entered the user's collection.
    /// The first prompt is pushed out by `first_delay` instead of firing immediately.
    pub fn new(
        user_id: impl Into<String>,
        word_id: impl Into<String>,
        mode: ScheduleMode,
        now: DateTime<Utc>,
        first_delay: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            word_id: word_id.into(),
            mode,
            stage: 1,
            ease_factor: DEFAULT_EASE_FACTOR,
            memory_strength: 0.0,
            review_count: 0,
            correct_count: 0,
            error_count: 0,
            last_review_at: None,
            milestone_completed_at: None,
            next_review_at: now + first_delay.max(Duration::zero()),
            short_slots: [false; SHORT_SLOT_COUNT],
            long_slots: [false; LONG_SLOT_COUNT],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }
}
