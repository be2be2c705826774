// src/handlers/catalog.rs

use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::quiz::QuizFilter,
    store::Stores,
    utils::jwt::AuthUser,
};

/// Lists every subject that has at least one quiz, sorted.
pub async fn list_subjects(State(stores): State<Stores>) -> Result<impl IntoResponse, AppError> {
    let quizzes = stores.content.list_quizzes(&QuizFilter::default()).await?;
    let subjects: BTreeSet<String> = quizzes.into_iter().map(|quiz| quiz.subject).collect();

    Ok(Json(subjects.into_iter().collect::<Vec<_>>()))
}

/// Lists the topics of one subject, sorted.
pub async fn list_topics(
    State(stores): State<Stores>,
    Path(subject): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = stores
        .content
        .list_quizzes(&QuizFilter::subject(subject))
        .await?;
    let topics: BTreeSet<String> = quizzes.into_iter().map(|quiz| quiz.topic).collect();

    Ok(Json(topics.into_iter().collect::<Vec<_>>()))
}

/// Deletes every quiz the caller created under a subject.
pub async fn delete_subject(
    State(stores): State<Stores>,
    user: AuthUser,
    Path(subject): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let filter = QuizFilter {
        subject: Some(subject.clone()),
        created_by: Some(user.user_id.clone()),
        ..QuizFilter::default()
    };
    let quizzes = stores.content.list_quizzes(&filter).await?;

    if quizzes.is_empty() {
        return Err(AppError::NotFound(format!(
            "You have no quizzes under '{}'",
            subject
        )));
    }

    let mut deleted = 0;
    for quiz in &quizzes {
        if stores.content.delete_quiz(&quiz.id).await? {
            deleted += 1;
        }
    }

    tracing::info!(user = %user.user_id, subject = %subject, deleted, "subject deleted");
    Ok(Json(json!({ "deleted": deleted })))
}
