//! Thermogram prediction endpoint
//!
//! The uploaded image is staged on disk, handed to the predictor and removed
//! again once the request finishes, successfully or not.

use std::time::Instant;

use axum::extract::{multipart::MultipartRejection, Multipart, State};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::infrastructure::observability::record_prediction;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

struct ImageUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    data: bytes::Bytes,
}

fn no_image() -> ApiError {
    ApiError::bad_request("No image file provided")
}

/// Pull the `image` part out of the form, skipping any other fields
async fn read_image(multipart: &mut Multipart) -> Result<Option<ImageUpload>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::bad_request("Invalid upload").with_message(e.body_text())
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            ApiError::new(e.status(), "Invalid upload").with_message(e.body_text())
        })?;

        if data.is_empty() {
            return Ok(None);
        }

        return Ok(Some(ImageUpload {
            file_name,
            content_type,
            data,
        }));
    }

    Ok(None)
}

/// POST /api/predict and POST /api/v1/predict
///
/// Responds with the predictor's JSON object verbatim.
pub async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart = multipart.map_err(|_| no_image())?;
    let image = read_image(&mut multipart).await?.ok_or_else(no_image)?;

    let staged = state
        .uploads
        .save(
            image.file_name.as_deref(),
            image.content_type.as_deref(),
            image.data,
        )
        .await?;

    let start = Instant::now();
    let result = state.predictor.predict(staged.path()).await;
    let elapsed = start.elapsed();

    match result {
        Ok(payload) => {
            record_prediction("success", elapsed);
            info!(duration_ms = elapsed.as_millis() as u64, "Prediction completed");
            Ok(Json(payload))
        }
        Err(err) => {
            record_prediction(err.kind(), elapsed);
            warn!(
                error = %err,
                kind = err.kind(),
                duration_ms = elapsed.as_millis() as u64,
                "Prediction failed"
            );
            Err(err.into())
        }
    }
}
