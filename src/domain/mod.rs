//! Domain layer - Core business logic and entities

pub mod api_key;
pub mod error;
pub mod prediction;
pub mod usage;
pub mod user;

pub use api_key::{
    ApiKey, ApiKeyId, ApiKeyRepository, ApiKeyValidationError, RateLimit,
};
pub use error::DomainError;
pub use prediction::{PredictionError, Predictor};
pub use usage::{ApiUsage, UsageQuery, UsageRecordId, UsageRepository};
pub use user::{User, UserId, UserRepository, UserValidationError};
