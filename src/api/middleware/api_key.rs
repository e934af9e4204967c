//! Developer API key authentication, rate limiting and usage accounting

use std::time::Instant;

use axum::{
    body::Body,
    extract::{FromRequestParts, OriginalUri, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{lookup_prefix, validate_key_format};
use crate::domain::{ApiKey, ApiUsage};
use crate::infrastructure::api_key::RateLimitResult;
use crate::infrastructure::observability::record_api_key_rejection;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Gate a route behind `X-API-Key`.
///
/// On success the resolved key is stored as a request extension and one
/// usage record is written after the handler returns, whatever its status.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();

    let api_key = match authorize(&state, request.headers()).await {
        Ok(key) => key,
        Err(err) => return err.into_response(),
    };

    let endpoint = request_path(&request);
    let method = request.method().to_string();
    let ip_address = client_ip(request.headers());
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    request.extensions_mut().insert(api_key.clone());
    let response = next.run(request).await;

    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let usage = ApiUsage::new(
        api_key.id().clone(),
        api_key.user_id().clone(),
        endpoint,
        method,
    )
    .with_response(response.status().as_u16(), elapsed_ms)
    .with_client(ip_address, user_agent);

    if let Err(e) = state.usage_service.record(usage).await {
        warn!(api_key_id = %api_key.id(), error = %e, "Failed to record API usage");
    }

    if let Err(e) = state.api_key_service.record_call(api_key.id(), Utc::now()).await {
        warn!(api_key_id = %api_key.id(), error = %e, "Failed to update API key counters");
    }

    response
}

/// Full request path, including any prefix stripped by a nested router
fn request_path(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path(), |original| original.0.path())
        .to_string()
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<ApiKey, ApiError> {
    let Some(presented) = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        record_api_key_rejection("missing");
        return Err(ApiError::unauthorized("API key required")
            .with_message("Please provide an API key in the X-API-Key header"));
    };

    if validate_key_format(presented).is_err() {
        record_api_key_rejection("malformed");
        return Err(ApiError::unauthorized("Invalid API key format")
            .with_message("API key must start with sk_live_ and be 40 characters long"));
    }

    let api_key = state
        .api_key_service
        .authenticate(presented)
        .await
        .map_err(validation_failure)?
        .ok_or_else(|| {
            debug!(prefix = lookup_prefix(presented), "No API key matched");
            record_api_key_rejection("invalid");
            ApiError::unauthorized("Invalid API key")
                .with_message("The provided API key is invalid or has been deactivated")
        })?;

    match state
        .api_key_service
        .check_rate_limit(&api_key)
        .await
        .map_err(validation_failure)?
    {
        RateLimitResult::Allowed => Ok(api_key),
        RateLimitResult::Exceeded {
            period,
            limit,
            reset_at,
        } => {
            debug!(api_key_id = %api_key.id(), %period, limit, "API key rate limited");
            record_api_key_rejection("rate_limited");
            Err(ApiError::rate_limited(limit, period, reset_at))
        }
    }
}

fn validation_failure(err: crate::domain::DomainError) -> ApiError {
    tracing::error!(error = %err, "API key validation failed");
    ApiError::internal("Internal server error")
        .with_message("An error occurred while validating your API key")
}

/// Originating client address as reported by a fronting proxy
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
}

/// The key resolved by [`require_api_key`]
#[derive(Debug, Clone)]
pub struct AuthenticatedKey(pub ApiKey);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiKey>()
            .cloned()
            .map(AuthenticatedKey)
            .ok_or_else(|| ApiError::unauthorized("API key required"))
    }
}
