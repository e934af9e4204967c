//! Usage tracking infrastructure

mod in_memory;
mod postgres_repository;
mod service;

pub use in_memory::InMemoryUsageRepository;
pub use postgres_repository::PostgresUsageRepository;
pub use service::{RateLimitUsage, RecentCall, UsageService, UsageStats, WindowUsage};
