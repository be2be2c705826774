// src/models/attempt.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{OptionLetter, selected_option};

/// Topic sentinel stored on attempts that span every topic of a subject.
pub const ALL_TOPICS: &str = "all";

/// Which topic(s) of a subject a run draws its questions from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicSelection {
    All,
    Topic(String),
}

impl TopicSelection {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if Self::is_reserved(trimmed) {
            TopicSelection::All
        } else {
            TopicSelection::Topic(trimmed.to_string())
        }
    }

    /// Whether an authored topic name would be read back as the sentinel.
    pub fn is_reserved(name: &str) -> bool {
        name.trim().eq_ignore_ascii_case(ALL_TOPICS)
    }
}

impl fmt::Display for TopicSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicSelection::All => f.write_str(ALL_TOPICS),
            TopicSelection::Topic(topic) => f.write_str(topic),
        }
    }
}

/// How many questions a run should contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionCount {
    All,
    Limit(usize),
}

/// Where a question of a derived set lives: its quiz and position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRef {
    pub quiz_id: String,
    pub index: usize,
}

/// Outcome of one question within an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_index: usize,
    /// `None` means the timer ran out with nothing selected.
    #[serde(with = "selected_option")]
    pub selected_option: Option<OptionLetter>,
    pub is_correct: bool,
    /// Seconds spent on the question.
    pub time_taken: u64,
}

/// One user's run through a derived question set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub user_id: String,
    pub quiz_id: String,
    pub subject: String,
    pub topic: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between start and end; zero until finalized.
    #[serde(default)]
    pub total_time_taken: i64,
    pub score: i64,
    pub max_score: i64,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub question_refs: Vec<QuestionRef>,
}

impl Attempt {
    pub fn question_count(&self) -> usize {
        self.question_refs.len()
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn correct_answers(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }

    /// Stamps the end of the run. `total_time_taken` never goes negative.
    pub fn finalize(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.total_time_taken = (end_time - self.start_time).num_seconds().max(0);
    }
}

/// A stored attempt together with its document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: String,
    #[serde(flatten)]
    pub attempt: Attempt,
}

/// DTO for starting a run.
#[derive(Debug, Deserialize, Validate)]
pub struct StartAttemptRequest {
    #[validate(length(min = 1, max = 100, message = "Select a subject."))]
    pub subject: String,
    /// A topic name, or "all" for every topic of the subject.
    #[validate(length(min = 1, max = 100, message = "Select a topic."))]
    pub topic: String,
    /// Number of questions; omitted means every available question.
    /// Out-of-range values are clamped, never rejected.
    pub count: Option<usize>,
}

/// DTO for answering the current question. An empty option means "no answer".
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub option: String,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn topic_selection_round_trips_the_sentinel() {
        assert_eq!(TopicSelection::parse("all"), TopicSelection::All);
        assert_eq!(TopicSelection::parse(" ALL "), TopicSelection::All);
        assert_eq!(
            TopicSelection::parse("Optics"),
            TopicSelection::Topic("Optics".to_string())
        );
        assert_eq!(TopicSelection::All.to_string(), "all");
        assert!(TopicSelection::is_reserved(" All"));
        assert!(!TopicSelection::is_reserved("Allotropes"));
    }

    #[test]
    fn finalize_never_goes_negative() {
        let start = Utc::now();
        let mut attempt = Attempt {
            user_id: "1".into(),
            quiz_id: "q".into(),
            subject: "s".into(),
            topic: "t".into(),
            start_time: start,
            end_time: None,
            total_time_taken: 0,
            score: 0,
            max_score: 4,
            answers: Vec::new(),
            question_refs: Vec::new(),
        };

        attempt.finalize(start - Duration::seconds(5));
        assert_eq!(attempt.total_time_taken, 0);

        attempt.finalize(start + Duration::seconds(42));
        assert_eq!(attempt.total_time_taken, 42);
        assert!(attempt.is_finished());
    }

    #[test]
    fn attempt_record_flattens_the_document() {
        let json = serde_json::json!({
            "id": "abc",
            "userId": "1",
            "quizId": "q",
            "subject": "Math",
            "topic": "all",
            "startTime": "2024-05-01T10:00:00Z",
            "endTime": null,
            "score": 3,
            "maxScore": 8,
            "answers": [
                { "questionIndex": 0, "selectedOption": "", "isCorrect": false, "timeTaken": 60 }
            ]
        });

        let record: AttemptRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.attempt.answers[0].selected_option, None);
        assert!(record.attempt.question_refs.is_empty());
        assert!(!record.attempt.is_finished());
    }
}
