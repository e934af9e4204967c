//! API key repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::{ApiKey, ApiKeyId};
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Repository trait for API key storage
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + Debug {
    /// Get an API key by its ID
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Active keys sharing a lookup prefix (candidates for hash comparison)
    async fn find_active_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError>;

    /// Every key with the given lookup prefix, active or not, oldest first
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError>;

    /// Active keys owned by a user, newest first
    async fn list_active_by_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError>;

    /// Store a new API key
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    /// Delete an API key, returning whether it existed
    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError>;

    /// Increment the call counter and stamp the last use time
    async fn record_usage(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError>;
}
