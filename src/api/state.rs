//! Application state for shared services

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::api_key::{ApiKeyRepository, RateLimit};
use crate::domain::usage::UsageRepository;
use crate::domain::user::UserRepository;
use crate::domain::{ApiKey, ApiKeyId, ApiUsage, DomainError, Predictor, User, UserId};
use crate::infrastructure::api_key::{ApiKeyService, CreateApiKeyResult, RateLimitResult};
use crate::infrastructure::auth::JwtGenerator;
use crate::infrastructure::prediction::UploadStore;
use crate::infrastructure::usage::{UsageService, UsageStats};
use crate::infrastructure::user::{PasswordHasher, RegisterUserRequest, UserService};

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<dyn UserServiceTrait>,
    pub api_key_service: Arc<dyn ApiKeyServiceTrait>,
    pub usage_service: Arc<dyn UsageServiceTrait>,
    pub jwt_service: Arc<dyn JwtGenerator>,
    pub predictor: Arc<dyn Predictor>,
    pub uploads: Arc<UploadStore>,
    /// Thresholds reported by the stats endpoint
    pub rate_limit: RateLimit,
    /// Present when running on Postgres; pinged by the readiness probe
    pub database: Option<PgPool>,
}

/// Trait for user account operations
#[async_trait::async_trait]
pub trait UserServiceTrait: Send + Sync {
    async fn register(&self, request: RegisterUserRequest) -> Result<User, DomainError>;
    async fn authenticate(&self, email: &str, password: &str)
        -> Result<Option<User>, DomainError>;
    async fn get(&self, id: &str) -> Result<Option<User>, DomainError>;
    async fn count(&self) -> Result<usize, DomainError>;
}

/// Trait for developer API key operations
#[async_trait::async_trait]
pub trait ApiKeyServiceTrait: Send + Sync {
    async fn generate(&self, user_id: &UserId, name: &str)
        -> Result<CreateApiKeyResult, DomainError>;
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError>;
    async fn delete_owned(&self, user_id: &UserId, id: &str) -> Result<(), DomainError>;
    async fn authenticate(&self, key: &str) -> Result<Option<ApiKey>, DomainError>;
    async fn check_rate_limit(&self, key: &ApiKey) -> Result<RateLimitResult, DomainError>;
    async fn record_call(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError>;
}

/// Trait for usage recording and reporting
#[async_trait::async_trait]
pub trait UsageServiceTrait: Send + Sync {
    async fn record(&self, usage: ApiUsage) -> Result<(), DomainError>;
    async fn stats(
        &self,
        key_ids: Vec<ApiKeyId>,
        limits: RateLimit,
    ) -> Result<UsageStats, DomainError>;
    async fn purge_expired(&self, retention: chrono::Duration) -> Result<u64, DomainError>;
}

// Implement traits for the actual services

#[async_trait::async_trait]
impl<R, H> UserServiceTrait for UserService<R, H>
where
    R: UserRepository + 'static,
    H: PasswordHasher + 'static,
{
    async fn register(&self, request: RegisterUserRequest) -> Result<User, DomainError> {
        UserService::register(self, request).await
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        UserService::authenticate(self, email, password).await
    }

    async fn get(&self, id: &str) -> Result<Option<User>, DomainError> {
        UserService::get(self, id).await
    }

    async fn count(&self) -> Result<usize, DomainError> {
        UserService::count(self).await
    }
}

#[async_trait::async_trait]
impl<R, U> ApiKeyServiceTrait for ApiKeyService<R, U>
where
    R: ApiKeyRepository + 'static,
    U: UsageRepository + 'static,
{
    async fn generate(
        &self,
        user_id: &UserId,
        name: &str,
    ) -> Result<CreateApiKeyResult, DomainError> {
        ApiKeyService::generate(self, user_id, name).await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError> {
        ApiKeyService::list_for_user(self, user_id).await
    }

    async fn delete_owned(&self, user_id: &UserId, id: &str) -> Result<(), DomainError> {
        ApiKeyService::delete_owned(self, user_id, id).await
    }

    async fn authenticate(&self, key: &str) -> Result<Option<ApiKey>, DomainError> {
        ApiKeyService::authenticate(self, key).await
    }

    async fn check_rate_limit(&self, key: &ApiKey) -> Result<RateLimitResult, DomainError> {
        ApiKeyService::check_rate_limit(self, key).await
    }

    async fn record_call(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        ApiKeyService::record_call(self, id, at).await
    }
}

#[async_trait::async_trait]
impl<U: UsageRepository + 'static> UsageServiceTrait for UsageService<U> {
    async fn record(&self, usage: ApiUsage) -> Result<(), DomainError> {
        UsageService::record(self, usage).await
    }

    async fn stats(
        &self,
        key_ids: Vec<ApiKeyId>,
        limits: RateLimit,
    ) -> Result<UsageStats, DomainError> {
        UsageService::stats(self, key_ids, limits).await
    }

    async fn purge_expired(&self, retention: chrono::Duration) -> Result<u64, DomainError> {
        UsageService::purge_expired(self, retention).await
    }
}
