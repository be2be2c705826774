// src/handlers/history.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{error::AppError, session::SessionRegistry, store::Stores, utils::jwt::AuthUser};

/// The caller's attempts, newest first.
pub async fn list_attempts(
    State(stores): State<Stores>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let attempts = stores.attempts.list_attempts(&user.user_id).await?;
    Ok(Json(attempts))
}

pub async fn delete_attempt(
    State(stores): State<Stores>,
    State(sessions): State<SessionRegistry>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = stores
        .attempts
        .get_attempt(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt '{}' not found", id)))?;

    if attempt.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "You can only delete your own attempts".to_string(),
        ));
    }

    sessions.discard(&user.user_id, Some(&id)).await;
    stores.attempts.delete_attempt(&id).await?;

    tracing::info!(attempt = %id, user = %user.user_id, "attempt deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Clears the caller's whole history.
pub async fn delete_all_attempts(
    State(stores): State<Stores>,
    State(sessions): State<SessionRegistry>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    sessions.discard(&user.user_id, None).await;
    let deleted = stores.attempts.delete_attempts_for(&user.user_id).await?;

    tracing::info!(user = %user.user_id, deleted, "attempt history cleared");
    Ok(Json(json!({ "deleted": deleted })))
}
