// src/engine/policy.rs

use std::time::Duration;

use crate::models::attempt::QuestionCount;

/// Points awarded to the attempt per answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringRule {
    pub correct: i64,
    pub incorrect: i64,
}

impl ScoringRule {
    /// +4 for a correct answer, -1 for a wrong or missing one.
    pub const STANDARD: ScoringRule = ScoringRule {
        correct: 4,
        incorrect: -1,
    };

    pub fn points(&self, is_correct: bool) -> i64 {
        if is_correct { self.correct } else { self.incorrect }
    }

    pub fn max_score(&self, question_count: usize) -> i64 {
        question_count as i64 * self.correct
    }
}

impl Default for ScoringRule {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Feedback applied to a question's difficulty signal after each answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyRule {
    pub step: i32,
    pub min: i32,
    pub max: i32,
}

impl DifficultyRule {
    /// +10 when answered correctly, -10 otherwise, kept within [-100, 100].
    pub const STANDARD: DifficultyRule = DifficultyRule {
        step: 10,
        min: -100,
        max: 100,
    };

    pub fn adjust(&self, previous: i32, is_correct: bool) -> i32 {
        let delta = if is_correct { self.step } else { -self.step };
        previous.saturating_add(delta).clamp(self.min, self.max)
    }
}

impl Default for DifficultyRule {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Everything that varies between runs of the attempt flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRunConfiguration {
    /// Per-question countdown; `None` lets players answer at their own pace.
    pub timer: Option<Duration>,
    pub scoring: ScoringRule,
    pub difficulty: DifficultyRule,
    /// Used when a start request does not say how many questions it wants.
    pub default_count: QuestionCount,
}

impl QuizRunConfiguration {
    pub const DEFAULT_QUESTION_SECONDS: u64 = 60;

    pub fn untimed() -> Self {
        Self {
            timer: None,
            ..Self::default()
        }
    }

    pub fn timed(duration: Duration) -> Self {
        Self {
            timer: Some(duration),
            ..Self::default()
        }
    }
}

impl Default for QuizRunConfiguration {
    fn default() -> Self {
        Self {
            timer: Some(Duration::from_secs(Self::DEFAULT_QUESTION_SECONDS)),
            scoring: ScoringRule::STANDARD,
            difficulty: DifficultyRule::STANDARD,
            default_count: QuestionCount::All,
        }
    }
}
