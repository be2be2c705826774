// src/handlers/image.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{error::AppError, imagehost::ImageHost, utils::jwt::AuthUser};

/// DTO for an image upload: base64 data, optionally as a data URL.
#[derive(Debug, Deserialize, Validate)]
pub struct UploadImageRequest {
    #[validate(length(min = 1, message = "No image provided."))]
    pub image: String,
}

/// Strips a `data:image/png;base64,` style prefix if present.
fn base64_payload(image: &str) -> &str {
    match image.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => image,
    }
}

/// Uploads a question or explanation image and returns its public URL.
pub async fn upload_image(
    State(images): State<ImageHost>,
    user: AuthUser,
    Json(payload): Json<UploadImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let url = images.upload(base64_payload(payload.image.trim())).await?;

    tracing::info!(user = %user.user_id, "image uploaded");
    Ok(Json(json!({ "url": url })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_prefix_is_stripped() {
        assert_eq!(base64_payload("data:image/png;base64,iVBOR"), "iVBOR");
        assert_eq!(base64_payload("iVBOR"), "iVBOR");
    }
}
