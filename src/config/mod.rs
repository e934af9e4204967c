//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, CorsConfig, LogFormat, LoggingConfig, PredictionConfig,
    RateLimitSettings, ServerConfig, StorageBackend, StorageConfig, UsageConfig,
};
