//! Risk prediction domain
//!
//! The classifier itself is an external process; the domain only knows how
//! to hand it an image path and what failures can come back.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::DomainError;

/// Failures of a single prediction run
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Failed to start prediction process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Prediction process timed out after {0:?}")]
    Timeout(Duration),

    #[error("Python script failed")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Prediction process produced no output")]
    EmptyOutput,

    #[error("Failed to parse prediction result")]
    MalformedOutput { output: String },

    /// The classifier ran but reported an error object
    #[error("{message}")]
    Rejected { message: String },
}

impl PredictionError {
    /// Diagnostic detail suitable for the `details` field of an error body
    pub fn details(&self) -> Option<String> {
        match self {
            Self::Spawn(e) => Some(e.to_string()),
            Self::Failed { stderr, .. } if !stderr.trim().is_empty() => {
                Some(stderr.trim().to_string())
            }
            Self::Failed { exit_code, .. } => {
                exit_code.map(|code| format!("Process exited with code {code}"))
            }
            Self::MalformedOutput { output } => Some(output.clone()),
            _ => None,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "spawn",
            Self::Timeout(_) => "timeout",
            Self::Failed { .. } => "failed",
            Self::EmptyOutput => "empty_output",
            Self::MalformedOutput { .. } => "malformed_output",
            Self::Rejected { .. } => "rejected",
        }
    }
}

impl From<PredictionError> for DomainError {
    fn from(err: PredictionError) -> Self {
        DomainError::prediction(err.to_string())
    }
}

/// Scores a foot thermogram stored on local disk
#[async_trait]
pub trait Predictor: Send + Sync + Debug {
    /// Run the classifier on the image and return its JSON payload verbatim
    async fn predict(&self, image_path: &Path) -> Result<Value, PredictionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_details_prefer_stderr() {
        let err = PredictionError::Failed {
            exit_code: Some(1),
            stderr: "Traceback: boom\n".to_string(),
        };
        assert_eq!(err.details().as_deref(), Some("Traceback: boom"));
        assert_eq!(err.to_string(), "Python script failed");
    }

    #[test]
    fn test_failed_details_fall_back_to_exit_code() {
        let err = PredictionError::Failed {
            exit_code: Some(2),
            stderr: String::new(),
        };
        assert_eq!(err.details().as_deref(), Some("Process exited with code 2"));
    }

    #[test]
    fn test_rejected_message() {
        let err = PredictionError::Rejected {
            message: "Could not read image".to_string(),
        };
        assert_eq!(err.to_string(), "Could not read image");
        assert_eq!(err.kind(), "rejected");
        assert!(err.details().is_none());
    }
}
