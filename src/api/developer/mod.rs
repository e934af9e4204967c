//! Developer portal endpoints: API key management and usage statistics

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::RequireUser;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::api_key::RateLimit;
use crate::domain::{ApiKey, DomainError};
use crate::infrastructure::usage::UsageStats;

/// Create the developer router
pub fn create_developer_router() -> Router<AppState> {
    Router::new()
        .route("/keys/generate", post(generate_key))
        .route("/keys", get(list_keys))
        .route("/keys/{id}", delete(delete_key))
        .route("/stats", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct GenerateKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// A freshly generated key; the only response that carries the plaintext
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedKeyResponse {
    pub id: String,
    pub name: String,
    pub key: String,
    pub key_prefix: String,
    pub created_at: DateTime<Utc>,
    pub rate_limit: RateLimit,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: String,
    pub key_prefix: String,
    pub is_active: bool,
    pub rate_limit: RateLimit,
    pub total_calls: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().to_string(),
            name: key.name().to_string(),
            key_prefix: key.key_prefix().to_string(),
            is_active: key.is_active(),
            rate_limit: key.rate_limit(),
            total_calls: key.total_calls(),
            last_used_at: key.last_used_at(),
            created_at: key.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteKeyResponse {
    pub success: bool,
    pub message: String,
}

/// Keep client errors as they are; give server errors an endpoint-specific message
fn failed(message: &'static str) -> impl Fn(DomainError) -> ApiError {
    move |err| {
        let api_err = ApiError::from(err);
        if api_err.status.is_server_error() {
            api_err.with_message(message)
        } else {
            api_err
        }
    }
}

/// POST /api/developer/keys/generate
pub async fn generate_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(request): Json<GenerateKeyRequest>,
) -> Result<Json<GeneratedKeyResponse>, ApiError> {
    let name = request.name.unwrap_or_default();
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required")
            .with_message("Please provide a name for your API key"));
    }

    let created = state
        .api_key_service
        .generate(user.id(), &name)
        .await
        .map_err(failed("Failed to generate API key"))?;
    let key = &created.api_key;

    Ok(Json(GeneratedKeyResponse {
        id: key.id().to_string(),
        name: key.name().to_string(),
        key: created.secret.clone(),
        key_prefix: key.key_prefix().to_string(),
        created_at: key.created_at(),
        rate_limit: key.rate_limit(),
    }))
}

/// GET /api/developer/keys
pub async fn list_keys(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<ApiKeyResponse>>, ApiError> {
    let keys = state
        .api_key_service
        .list_for_user(user.id())
        .await
        .map_err(failed("Failed to fetch API keys"))?;

    Ok(Json(keys.iter().map(ApiKeyResponse::from).collect()))
}

/// DELETE /api/developer/keys/{id}
pub async fn delete_key(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteKeyResponse>, ApiError> {
    state
        .api_key_service
        .delete_owned(user.id(), &id)
        .await
        .map_err(|err| match err {
            DomainError::NotFound { .. } => ApiError::not_found("API key not found")
                .with_message("The specified API key does not exist or does not belong to you"),
            other => failed("Failed to delete API key")(other),
        })?;

    Ok(Json(DeleteKeyResponse {
        success: true,
        message: "API key deleted successfully".to_string(),
    }))
}

/// GET /api/developer/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<UsageStats>, ApiError> {
    let on_error = failed("Failed to fetch usage statistics");

    let key_ids = state
        .api_key_service
        .list_for_user(user.id())
        .await
        .map_err(&on_error)?
        .into_iter()
        .map(|key| key.id().clone())
        .collect();

    let stats = state
        .usage_service
        .stats(key_ids, state.rate_limit)
        .await
        .map_err(&on_error)?;

    Ok(Json(stats))
}
