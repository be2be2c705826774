// src/engine/mod.rs

//! The attempt engine: question-set assembly, the attempt life cycle,
//! scoring, difficulty feedback and the per-question timer.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::StoreError;

pub mod assembler;
pub mod controller;
pub mod difficulty;
pub mod policy;
pub mod timer;

pub use controller::{AttemptController, Phase, ResumeOutcome, Reveal, Snapshot, SubmitOutcome};
pub use policy::{DifficultyRule, QuizRunConfiguration, ScoringRule};

/// Who is playing, and which attempt (if any) they can pick back up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub resumable_attempt_id: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            resumable_attempt_id: None,
        }
    }

    pub fn with_marker(mut self, attempt_id: Option<String>) -> Self {
        self.resumable_attempt_id = attempt_id;
        self
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("cannot {action} while {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },

    #[error("this attempt has been deleted")]
    Discarded,
}

/// Wall-clock source for attempt timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
