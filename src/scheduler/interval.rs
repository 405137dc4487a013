//! Continuous-mode progression.
//!
//! Each stage maps to a fixed review gap:
//! same session, 20min, 1h, 8h, 1d, 2d, 6d, 15d, 30d.
//! Outcomes move the stage along the table and nudge the ease factor and
//! memory strength; every input is clamped, nothing is rejected.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::types::{Outcome, DEFAULT_EASE_FACTOR, MAX_EASE_FACTOR, MIN_EASE_FACTOR};

pub const MAX_STAGE: u32 = 9;

const STAGE_INTERVAL_MINUTES: [i64; MAX_STAGE as usize] = [
    0,         // same session
    20,        // 20 minutes
    60,        // 1 hour
    8 * 60,    // 8 hours
    24 * 60,   // 1 day
    2 * 1440,  // 2 days
    6 * 1440,  // 6 days
    15 * 1440, // 15 days
    30 * 1440, // 30 days
];

const MINUTES_PER_DAY: f64 = 1440.0;

const FORGOT_EASE_PENALTY: f64 = 0.2;
const HARD_EASE_PENALTY: f64 = 0.1;
const EASY_EASE_BONUS: f64 = 0.1;

const FORGOT_STRENGTH_LOSS: f64 = 0.3;
const HARD_STRENGTH_LOSS: f64 = 0.05;
const GOOD_STRENGTH_GAIN: f64 = 0.10;
const EASY_STRENGTH_GAIN: f64 = 0.15;

/// The continuous-mode fields of a review state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousFields {
    pub stage: u32,
    pub ease_factor: f64,
    pub memory_strength: f64,
}

impl Default for ContinuousFields {
    fn default() -> Self {
        Self {
            stage: 1,
            ease_factor: DEFAULT_EASE_FACTOR,
            memory_strength: 0.0,
        }
    }
}

impl ContinuousFields {
    pub fn clamped(self) -> Self {
        Self {
            stage: clamp_stage(self.stage),
            ease_factor: clamp_ease(self.ease_factor),
            memory_strength: clamp_strength(self.memory_strength),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalAdvance {
    pub stage: u32,
    pub ease_factor: f64,
    pub memory_strength: f64,
    pub interval_days: f64,
    pub next_review_at: DateTime<Utc>,
}

impl IntervalAdvance {
    pub fn fields(&self) -> ContinuousFields {
        ContinuousFields {
            stage: self.stage,
            ease_factor: self.ease_factor,
            memory_strength: self.memory_strength,
        }
    }
}

pub struct IntervalPolicy;

impl IntervalPolicy {
    pub fn interval(stage: u32) -> Duration {
        let idx = (clamp_stage(stage) - 1) as usize;
        Duration::minutes(STAGE_INTERVAL_MINUTES[idx])
    }

    pub fn interval_days(stage: u32) -> f64 {
        let idx = (clamp_stage(stage) - 1) as usize;
        STAGE_INTERVAL_MINUTES[idx] as f64 / MINUTES_PER_DAY
    }

    /// Due time for a state already sitting at `stage`.
    pub fn due_at(stage: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Self::interval(stage)
    }

    pub fn advance(current: ContinuousFields, outcome: Outcome, now: DateTime<Utc>) -> IntervalAdvance {
        let ContinuousFields {
            stage,
            ease_factor,
            memory_strength,
        } = current.clamped();

        let (stage, ease_factor, memory_strength) = match outcome {
            Outcome::Forgot => (
                1,
                ease_factor - FORGOT_EASE_PENALTY,
                memory_strength - FORGOT_STRENGTH_LOSS,
            ),
            Outcome::Hard => (
                stage.max(1),
                ease_factor - HARD_EASE_PENALTY,
                memory_strength - HARD_STRENGTH_LOSS,
            ),
            Outcome::Good => (
                (stage + 1).min(MAX_STAGE),
                ease_factor,
                memory_strength + GOOD_STRENGTH_GAIN,
            ),
            Outcome::Easy => (
                (stage + 2).min(MAX_STAGE),
                ease_factor + EASY_EASE_BONUS,
                memory_strength + EASY_STRENGTH_GAIN,
            ),
        };

        IntervalAdvance {
            stage,
            ease_factor: clamp_ease(ease_factor),
            memory_strength: clamp_strength(memory_strength),
            interval_days: Self::interval_days(stage),
            next_review_at: Self::due_at(stage, now),
        }
    }
}

pub fn clamp_stage(stage: u32) -> u32 {
    stage.clamp(1, MAX_STAGE)
}

pub fn clamp_ease(ease_factor: f64) -> f64 {
    if ease_factor.is_nan() {
        return DEFAULT_EASE_FACTOR;
    }
    ease_factor.clamp(MIN_EASE_FACTOR, MAX_EASE_FACTOR)
}

pub fn clamp_strength(memory_strength: f64) -> f64 {
    if memory_strength.is_nan() {
        return 0.0;
    }
    memory_strength.clamp(0.0, 1.0)
}
