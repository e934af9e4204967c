//! Developer API key management and request authentication

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::api_key::{
    lookup_prefix, validate_key_name, ApiKey, ApiKeyId, ApiKeyRepository, RateLimit,
};
use crate::domain::usage::UsageRepository;
use crate::domain::user::UserId;
use crate::domain::DomainError;

use super::generator::ApiKeyGenerator;
use super::rate_limiter::{RateLimitResult, RateLimiter};

/// A new key together with its one-time plaintext
#[derive(Debug)]
pub struct CreateApiKeyResult {
    pub api_key: ApiKey,
    pub secret: String,
}

#[derive(Debug)]
pub struct ApiKeyService<R, U>
where
    R: ApiKeyRepository,
    U: UsageRepository,
{
    repository: Arc<R>,
    generator: ApiKeyGenerator,
    rate_limiter: RateLimiter<U>,
    default_rate_limit: RateLimit,
}

impl<R: ApiKeyRepository, U: UsageRepository> ApiKeyService<R, U> {
    pub fn new(repository: Arc<R>, usage: Arc<U>) -> Self {
        Self {
            repository,
            generator: ApiKeyGenerator::new(),
            rate_limiter: RateLimiter::new(usage),
            default_rate_limit: RateLimit::default(),
        }
    }

    /// Thresholds assigned to keys generated from now on
    pub fn with_default_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.default_rate_limit = rate_limit;
        self
    }

    /// Mint a key for a user
    pub async fn generate(
        &self,
        user_id: &UserId,
        name: &str,
    ) -> Result<CreateApiKeyResult, DomainError> {
        let name = validate_key_name(name).map_err(|e| DomainError::validation(e.to_string()))?;
        let generated = self.generator.generate();

        let api_key = ApiKey::new(
            ApiKeyId::generate(),
            user_id.clone(),
            name,
            generated.hash,
            generated.prefix,
        )
        .with_rate_limit(self.default_rate_limit);

        let created = self.repository.create(api_key).await?;
        info!(
            api_key_id = %created.id(),
            user_id = %user_id,
            prefix = created.key_prefix(),
            "API key generated"
        );

        Ok(CreateApiKeyResult {
            api_key: created,
            secret: generated.key,
        })
    }

    /// Active keys owned by a user, newest first
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError> {
        self.repository.list_active_by_user(user_id).await
    }

    /// Delete a key the user owns; missing and foreign keys both read as not found
    pub async fn delete_owned(&self, user_id: &UserId, id: &str) -> Result<(), DomainError> {
        let not_found = || DomainError::not_found("API key not found");

        let id = ApiKeyId::new(id).map_err(|_| not_found())?;
        let key = self.repository.get(&id).await?.ok_or_else(not_found)?;

        if !key.is_owned_by(user_id) {
            debug!(api_key_id = %id, user_id = %user_id, "Refusing to delete foreign API key");
            return Err(not_found());
        }

        self.repository.delete(&id).await?;
        info!(api_key_id = %id, user_id = %user_id, "API key deleted");

        Ok(())
    }

    /// Resolve a well-formed presented key to its active record.
    ///
    /// Candidates share the lookup prefix; the first whose hash matches wins.
    pub async fn authenticate(&self, key: &str) -> Result<Option<ApiKey>, DomainError> {
        let candidates = self
            .repository
            .find_active_by_prefix(lookup_prefix(key))
            .await?;

        Ok(candidates
            .into_iter()
            .find(|candidate| self.generator.verify_key(key, candidate.key_hash())))
    }

    pub async fn check_rate_limit(&self, key: &ApiKey) -> Result<RateLimitResult, DomainError> {
        self.rate_limiter.check(key).await
    }

    /// Bump the key's call counter
    pub async fn record_call(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.repository.record_usage(id, at).await
    }

    /// Keys sharing a stored prefix, regardless of status
    pub async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError> {
        self.repository.list_by_prefix(prefix).await
    }

    pub fn default_rate_limit(&self) -> RateLimit {
        self.default_rate_limit
    }
}
