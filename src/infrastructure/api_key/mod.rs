//! API key infrastructure

mod generator;
mod postgres_repository;
mod rate_limiter;
mod repository;
mod service;

pub use generator::{ApiKeyGenerator, GeneratedApiKey};
pub use postgres_repository::PostgresApiKeyRepository;
pub use rate_limiter::{LimitPeriod, RateLimitResult, RateLimiter};
pub use repository::InMemoryApiKeyRepository;
pub use service::{ApiKeyService, CreateApiKeyResult};
