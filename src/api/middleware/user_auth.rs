//! User authentication using JWT session tokens

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::user::User;

/// Header the web application sends its session token in
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Extractor that requires a valid session token
///
/// The token is read from:
/// - `x-auth-token: <jwt>`
/// - `Authorization: Bearer <jwt>`
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_jwt_token(&parts.headers).ok_or_else(|| {
            ApiError::unauthorized("No token, authorization denied")
                .with_message("Sign in and send the session token in the x-auth-token header")
        })?;

        let claims = state.jwt_service.validate(&token).map_err(|e| {
            debug!(error = %e, "Rejected session token");
            ApiError::unauthorized("Token is not valid")
        })?;

        let user = state
            .user_service
            .get(claims.user_id())
            .await?
            .ok_or_else(|| ApiError::unauthorized("Token is not valid"))?;

        Ok(RequireUser(user))
    }
}

/// Session token from `x-auth-token`, falling back to a bearer token
pub fn extract_jwt_token(headers: &HeaderMap) -> Option<String> {
    let from_custom = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let from_bearer = || {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    };

    from_custom.or_else(from_bearer).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_custom_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, "eyJhbGciOiJIUzI1NiJ9.test".parse().unwrap());

        assert_eq!(
            extract_jwt_token(&headers).as_deref(),
            Some("eyJhbGciOiJIUzI1NiJ9.test")
        );
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer   token-with-spaces   ".parse().unwrap());

        assert_eq!(extract_jwt_token(&headers).as_deref(), Some("token-with-spaces"));
    }

    #[test]
    fn test_custom_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, "custom".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer bearer".parse().unwrap());

        assert_eq!(extract_jwt_token(&headers).as_deref(), Some("custom"));
    }

    #[test]
    fn test_missing_or_wrong_scheme() {
        assert!(extract_jwt_token(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert!(extract_jwt_token(&headers).is_none());
    }
}
