// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{Question, QuestionInput, QuestionView};

/// A stored quiz document: the questions of one (subject, topic) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub subject: String,
    pub topic: String,
    pub questions: Vec<Question>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Exact-match filter over quiz documents. Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizFilter {
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub created_by: Option<String>,
}

impl QuizFilter {
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    pub fn subject_topic(subject: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            topic: Some(topic.into()),
            created_by: None,
        }
    }

    pub fn created_by(user_id: impl Into<String>) -> Self {
        Self {
            created_by: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, quiz: &Quiz) -> bool {
        self.subject.as_deref().is_none_or(|s| s == quiz.subject)
            && self.topic.as_deref().is_none_or(|t| t == quiz.topic)
            && self.created_by.as_deref().is_none_or(|c| c == quiz.created_by)
    }
}

/// Quiz as returned to authors, with difficulty labels on every question.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub id: String,
    pub subject: String,
    pub topic: String,
    pub questions: Vec<QuestionView>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Quiz> for QuizView {
    fn from(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            subject: quiz.subject,
            topic: quiz.topic,
            questions: quiz.questions.into_iter().map(QuestionView::from).collect(),
            created_by: quiz.created_by,
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
        }
    }
}

/// DTO for saving a quiz. Saving into an existing (subject, topic) merges.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveQuizRequest {
    #[validate(length(min = 1, max = 100, message = "Subject must be 1 to 100 characters."))]
    pub subject: String,
    #[validate(length(min = 1, max = 100, message = "Topic must be 1 to 100 characters."))]
    pub topic: String,
    #[validate(length(min = 1, max = 500, message = "A quiz needs at least one question."), nested)]
    pub questions: Vec<QuestionInput>,
}

/// DTO for replacing the question list of an existing quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceQuestionsRequest {
    #[validate(length(min = 1, max = 500, message = "A quiz needs at least one question."), nested)]
    pub questions: Vec<QuestionInput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(subject: &str, topic: &str, owner: &str) -> Quiz {
        Quiz {
            id: "q1".to_string(),
            subject: subject.to_string(),
            topic: topic.to_string(),
            questions: Vec::new(),
            created_by: owner.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn filter_is_exact_match() {
        let q = quiz("Physics", "Optics", "7");

        assert!(QuizFilter::default().matches(&q));
        assert!(QuizFilter::subject("Physics").matches(&q));
        assert!(!QuizFilter::subject("physics").matches(&q));
        assert!(QuizFilter::subject_topic("Physics", "Optics").matches(&q));
        assert!(!QuizFilter::subject_topic("Physics", "Waves").matches(&q));
        assert!(QuizFilter::created_by("7").matches(&q));
        assert!(!QuizFilter::created_by("8").matches(&q));
    }

    #[test]
    fn save_request_requires_questions() {
        let req: SaveQuizRequest = serde_json::from_value(serde_json::json!({
            "subject": "Physics",
            "topic": "Optics",
            "questions": []
        }))
        .unwrap();

        assert!(req.validate().is_err());
    }

    #[test]
    fn save_request_validates_each_question() {
        let question = |text: &str| {
            serde_json::json!({
                "type": "text",
                "text": text,
                "options": ["1", "2", "3", "4"],
                "correctOption": "A"
            })
        };

        let valid: SaveQuizRequest = serde_json::from_value(serde_json::json!({
            "subject": "Physics",
            "topic": "Optics",
            "questions": [question("What bends light?")]
        }))
        .unwrap();
        assert!(valid.validate().is_ok());

        let blank: SaveQuizRequest = serde_json::from_value(serde_json::json!({
            "subject": "Physics",
            "topic": "Optics",
            "questions": [question("What bends light?"), question("  ")]
        }))
        .unwrap();
        assert!(blank.validate().is_err());
    }
}
