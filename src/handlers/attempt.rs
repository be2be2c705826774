// src/handlers/attempt.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    engine::{Phase, ResumeOutcome, SubmitOutcome, assembler::SetRequest},
    error::AppError,
    models::{
        attempt::{AnswerRequest, QuestionCount, StartAttemptRequest, TopicSelection},
        question::OptionLetter,
    },
    session::SessionRegistry,
    utils::jwt::AuthUser,
};

/// Current state of the caller's run. Picks up an unfinished attempt on
/// first access.
pub async fn current(
    State(sessions): State<SessionRegistry>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.controller(&user.user_id).await?;
    Ok(Json(controller.snapshot()))
}

pub async fn start(
    State(sessions): State<SessionRegistry>,
    user: AuthUser,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let request = SetRequest {
        subject: payload.subject,
        topic: TopicSelection::parse(&payload.topic),
        count: payload
            .count
            .map(QuestionCount::Limit)
            .unwrap_or(sessions.run_configuration().default_count),
    };

    let snapshot = sessions.start(&user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Records an answer. An empty option submits "no answer".
pub async fn answer(
    State(sessions): State<SessionRegistry>,
    user: AuthUser,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let selection = if payload.option.trim().is_empty() {
        None
    } else {
        let letter = OptionLetter::parse(&payload.option).ok_or_else(|| {
            AppError::BadRequest(format!("'{}' is not an option", payload.option.trim()))
        })?;
        Some(letter)
    };

    let controller = sessions.controller(&user.user_id).await?;
    match controller.submit_answer(selection).await? {
        SubmitOutcome::Recorded(snapshot) => Ok((StatusCode::OK, Json(snapshot))),
        SubmitOutcome::Ignored => Ok((StatusCode::ACCEPTED, Json(controller.snapshot()))),
    }
}

pub async fn advance(
    State(sessions): State<SessionRegistry>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.controller(&user.user_id).await?;
    Ok(Json(controller.advance().await?))
}

/// Returns the final score. The run is released afterwards, so the next
/// `GET /api/attempt` reports no quiz running.
pub async fn finish(
    State(sessions): State<SessionRegistry>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(sessions.finish(&user.user_id).await?))
}

/// The caller's unfinished run. The registry already picks it up when it
/// first opens the caller's controller, so a run in flight is returned as is.
pub async fn resume(
    State(sessions): State<SessionRegistry>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.controller(&user.user_id).await?;
    let outcome = match controller.phase().await {
        Phase::InProgress(_) | Phase::AwaitingReveal(_) => {
            ResumeOutcome::Resumed(controller.snapshot())
        }
        Phase::NotStarted => controller.resume().await?,
        Phase::Complete => ResumeOutcome::NothingToResume,
    };

    match outcome {
        ResumeOutcome::Resumed(snapshot) => Ok(Json(snapshot)),
        ResumeOutcome::NothingToResume => Err(AppError::NotFound(
            "No unfinished attempt to resume".to_string(),
        )),
    }
}
