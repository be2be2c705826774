// src/handlers/dashboard.rs

use axum::{Json, extract::State, response::IntoResponse};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{attempt::AttemptRecord, quiz::QuizFilter},
    store::Stores,
    utils::jwt::AuthUser,
};

const RECENT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAttempt {
    pub id: String,
    pub subject: String,
    pub topic: String,
    pub score: i64,
    pub max_score: i64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_quizzes: usize,
    /// Percentage of all points available across every attempt.
    pub avg_score: i64,
    pub attempts_today: usize,
    pub recent_attempts: Vec<RecentAttempt>,
}

pub fn summarize(
    total_quizzes: usize,
    attempts: &[AttemptRecord],
    now: DateTime<Utc>,
) -> DashboardSummary {
    let total_score: i64 = attempts.iter().map(|r| r.attempt.score).sum();
    let total_max: i64 = attempts.iter().map(|r| r.attempt.max_score).sum();
    let avg_score = if total_max > 0 {
        (total_score as f64 / total_max as f64 * 100.0).round() as i64
    } else {
        0
    };

    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let attempts_today = attempts
        .iter()
        .filter(|r| r.attempt.start_time >= midnight)
        .count();

    let mut newest: Vec<&AttemptRecord> = attempts.iter().collect();
    newest.sort_by(|a, b| b.attempt.start_time.cmp(&a.attempt.start_time));
    let recent_attempts = newest
        .into_iter()
        .take(RECENT_ATTEMPTS)
        .map(|r| RecentAttempt {
            id: r.id.clone(),
            subject: r.attempt.subject.clone(),
            topic: r.attempt.topic.clone(),
            score: r.attempt.score,
            max_score: r.attempt.max_score,
            date: r.attempt.start_time,
        })
        .collect();

    DashboardSummary {
        total_quizzes,
        avg_score,
        attempts_today,
        recent_attempts,
    }
}

pub async fn dashboard(
    State(stores): State<Stores>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = stores
        .content
        .list_quizzes(&QuizFilter::created_by(&user.user_id))
        .await?;
    let attempts = stores.attempts.list_attempts(&user.user_id).await?;

    Ok(Json(summarize(quizzes.len(), &attempts, Utc::now())))
}
