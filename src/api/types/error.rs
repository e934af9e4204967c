//! HTTP error bodies
//!
//! Every failure is rendered as `{error, message?, details?}`; rate-limit
//! rejections add `{limit, period, resetAt}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, PredictionError};
use crate::infrastructure::api_key::LimitPeriod;

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error: error.into(),
                message: None,
                details: None,
                limit: None,
                period: None,
                reset_at: None,
            },
        }
    }

    /// Human-readable explanation
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.body.message = Some(message.into());
        self
    }

    /// Diagnostic detail, e.g. process stderr
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    pub fn conflict(error: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, error)
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error)
    }

    /// 429 for a key that used up its hourly or daily allowance
    pub fn rate_limited(limit: u32, period: LimitPeriod, reset_at: DateTime<Utc>) -> Self {
        let adjective = match period {
            LimitPeriod::Hour => "hourly",
            LimitPeriod::Day => "daily",
        };
        let mut err = Self::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").with_message(
            format!("You have exceeded the {} rate limit of {} requests", adjective, limit),
        );

        err.body.limit = Some(limit);
        err.body.period = Some(period.to_string());
        err.body.reset_at = Some(reset_at);
        err
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::not_found("Not found").with_message(message),
            DomainError::Validation { message } => {
                Self::bad_request("Invalid request").with_message(message)
            }
            DomainError::Conflict { message } => Self::conflict(message),
            DomainError::Unauthorized { message } => {
                Self::unauthorized("Unauthorized").with_message(message)
            }
            DomainError::Prediction { message } => Self::internal(message),
            DomainError::Configuration { .. }
            | DomainError::Storage { .. }
            | DomainError::Internal { .. } => {
                tracing::error!(error = %err, "Request failed");
                Self::internal("Server error").with_message("An unexpected error occurred")
            }
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        let details = err.details();
        let api_err = Self::internal(err.to_string());

        match details {
            Some(details) => api_err.with_details(details),
            None => api_err,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.body.message {
            Some(message) => write!(f, "{}: {}: {}", self.status, self.body.error, message),
            None => write!(f, "{}: {}", self.status, self.body.error),
        }
    }
}

impl std::error::Error for ApiError {}
