// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::DifficultyRule,
    error::AppError,
    models::{
        attempt::TopicSelection,
        question::{Question, QuestionInput},
        quiz::{Quiz, QuizFilter, QuizView, ReplaceQuestionsRequest, SaveQuizRequest},
    },
    store::Stores,
    utils::jwt::AuthUser,
};

#[derive(Debug, Deserialize)]
pub struct QuizQuery {
    pub subject: Option<String>,
    pub topic: Option<String>,
}

fn into_questions(inputs: Vec<QuestionInput>) -> Vec<Question> {
    let rule = DifficultyRule::STANDARD;
    inputs
        .into_iter()
        .map(|input| input.into_question(rule.min, rule.max))
        .collect()
}

async fn owned_quiz(stores: &Stores, id: &str, user: &AuthUser) -> Result<Quiz, AppError> {
    let quiz = stores
        .content
        .get_quiz(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz '{}' not found", id)))?;

    if quiz.created_by != user.user_id {
        return Err(AppError::Forbidden(
            "Only the author can change this quiz".to_string(),
        ));
    }
    Ok(quiz)
}

/// Lists quizzes, optionally filtered by exact subject and topic.
pub async fn list_quizzes(
    State(stores): State<Stores>,
    Query(query): Query<QuizQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = QuizFilter {
        subject: query.subject,
        topic: query.topic,
        created_by: None,
    };
    let quizzes = stores.content.list_quizzes(&filter).await?;

    Ok(Json(
        quizzes.into_iter().map(QuizView::from).collect::<Vec<_>>(),
    ))
}

pub async fn get_quiz(
    State(stores): State<Stores>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = stores
        .content
        .get_quiz(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz '{}' not found", id)))?;

    Ok(Json(QuizView::from(quiz)))
}

/// Saves a quiz. If one already exists for the (subject, topic) pair its
/// questions are replaced (200), otherwise a new quiz is created (201).
pub async fn save_quiz(
    State(stores): State<Stores>,
    user: AuthUser,
    Json(payload): Json<SaveQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let subject = payload.subject.trim().to_string();
    let topic = payload.topic.trim().to_string();
    if subject.is_empty() || topic.is_empty() {
        return Err(AppError::BadRequest(
            "Subject and topic cannot be blank".to_string(),
        ));
    }
    if TopicSelection::is_reserved(&topic) {
        return Err(AppError::BadRequest(format!(
            "'{}' is reserved for runs across every topic",
            topic
        )));
    }

    let questions = into_questions(payload.questions);
    let now = Utc::now();

    let existing = stores
        .content
        .list_quizzes(&QuizFilter::subject_topic(&subject, &topic))
        .await?
        .into_iter()
        .next();

    if let Some(mut quiz) = existing {
        if !stores
            .content
            .merge_questions(&quiz.id, &questions, now)
            .await?
        {
            return Err(AppError::NotFound(format!("Quiz '{}' not found", quiz.id)));
        }
        quiz.questions = questions;
        quiz.updated_at = now;

        tracing::info!(quiz = %quiz.id, user = %user.user_id, "quiz merged");
        return Ok((StatusCode::OK, Json(QuizView::from(quiz))));
    }

    let quiz = Quiz {
        id: Uuid::new_v4().to_string(),
        subject,
        topic,
        questions,
        created_by: user.user_id.clone(),
        created_at: now,
        updated_at: now,
    };
    stores.content.put_quiz(&quiz).await?;

    tracing::info!(quiz = %quiz.id, user = %user.user_id, "quiz created");
    Ok((StatusCode::CREATED, Json(QuizView::from(quiz))))
}

/// Replaces the question list of a quiz. Author only.
pub async fn replace_questions(
    State(stores): State<Stores>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<ReplaceQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut quiz = owned_quiz(&stores, &id, &user).await?;
    let questions = into_questions(payload.questions);
    let now = Utc::now();

    if !stores
        .content
        .merge_questions(&quiz.id, &questions, now)
        .await?
    {
        return Err(AppError::NotFound(format!("Quiz '{}' not found", id)));
    }
    quiz.questions = questions;
    quiz.updated_at = now;

    Ok(Json(QuizView::from(quiz)))
}

/// Deletes a quiz. Author only.
pub async fn delete_quiz(
    State(stores): State<Stores>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = owned_quiz(&stores, &id, &user).await?;
    stores.content.delete_quiz(&quiz.id).await?;

    tracing::info!(quiz = %quiz.id, user = %user.user_id, "quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}
