//! API key entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{validate_api_key_id, ApiKeyValidationError};
use crate::domain::user::UserId;

/// API key identifier - a generated UUID string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiKeyId(String);

impl ApiKeyId {
    /// Create a new ApiKeyId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, ApiKeyValidationError> {
        let id = id.into();
        validate_api_key_id(&id)?;
        Ok(Self(id))
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApiKeyId {
    type Error = ApiKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiKeyId> for String {
    fn from(id: ApiKeyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-key request thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Maximum requests in any trailing hour
    pub hourly: u32,
    /// Maximum requests in any trailing 24 hours
    pub daily: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            hourly: 100,
            daily: 1000,
        }
    }
}

impl RateLimit {
    pub fn new(hourly: u32, daily: u32) -> Self {
        Self { hourly, daily }
    }
}

/// API key entity
///
/// Only the SHA-256 hash of the key is kept; the plaintext is returned once
/// at generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    id: ApiKeyId,
    user_id: UserId,
    name: String,
    key_hash: String,
    /// First 12 characters of the key, used to narrow the hash comparison
    key_prefix: String,
    is_active: bool,
    rate_limit: RateLimit,
    total_calls: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Create a new, active API key
    pub fn new(
        id: ApiKeyId,
        user_id: UserId,
        name: impl Into<String>,
        key_hash: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            user_id,
            name: name.into(),
            key_hash: key_hash.into(),
            key_prefix: key_prefix.into(),
            is_active: true,
            rate_limit: RateLimit::default(),
            total_calls: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set rate limits
    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Restore persisted usage counters
    pub fn with_usage(mut self, total_calls: u64, last_used_at: Option<DateTime<Utc>>) -> Self {
        self.total_calls = total_calls;
        self.last_used_at = last_used_at;
        self
    }

    /// Restore persisted timestamps
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Restore persisted active flag
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.rate_limit
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the key belongs to the given user
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    // Mutators

    /// Record one authenticated call
    pub fn record_usage(&mut self, at: DateTime<Utc>) {
        self.total_calls += 1;
        self.last_used_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_key() -> ApiKey {
        ApiKey::new(
            ApiKeyId::generate(),
            UserId::generate(),
            "Test Key",
            "sha256$hash",
            "sk_live_abcd",
        )
    }

    #[test]
    fn test_api_key_id_valid() {
        let id = ApiKeyId::new("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(id.as_str(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn test_api_key_id_invalid() {
        assert!(ApiKeyId::new("").is_err());
        assert!(ApiKeyId::new("a/b").is_err());
    }

    #[test]
    fn test_default_rate_limit() {
        let limit = RateLimit::default();
        assert_eq!(limit.hourly, 100);
        assert_eq!(limit.daily, 1000);
    }

    #[test]
    fn test_new_key_is_active() {
        let key = create_test_key();

        assert!(key.is_active());
        assert_eq!(key.total_calls(), 0);
        assert!(key.last_used_at().is_none());
        assert_eq!(key.rate_limit(), RateLimit::default());
    }

    #[test]
    fn test_record_usage() {
        let mut key = create_test_key();
        let now = Utc::now();

        key.record_usage(now);
        key.record_usage(now);

        assert_eq!(key.total_calls(), 2);
        assert_eq!(key.last_used_at(), Some(now));
    }

    #[test]
    fn test_ownership() {
        let key = create_test_key();
        let owner = key.user_id().clone();

        assert!(key.is_owned_by(&owner));
        assert!(!key.is_owned_by(&UserId::generate()));
    }

    #[test]
    fn test_restored_inactive_key() {
        let key = create_test_key().with_active(false);
        assert!(!key.is_active());
    }
}
