//! Seedora API
//!
//! Backend for the Seedora / ThermoFoot web application:
//! - Account registration and JWT sessions
//! - Developer API keys with hourly and daily rate limits
//! - Usage accounting and statistics
//! - Diabetic foot ulcer risk prediction through an external classifier script

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::{info, warn};

use api::state::AppState;
use config::{AuthConfig, StorageBackend};
use domain::{ApiKeyRepository, Predictor, UsageRepository, UserRepository};
use infrastructure::{
    api_key::{ApiKeyService, InMemoryApiKeyRepository, PostgresApiKeyRepository},
    auth::{JwtConfig, JwtService},
    prediction::{ScriptPredictor, UploadStore},
    storage::{connect_pool, PostgresConfig, PostgresMigrator},
    usage::{InMemoryUsageRepository, PostgresUsageRepository, UsageService},
    user::{Argon2Hasher, InMemoryUserRepository, PostgresUserRepository, UserService},
};

/// Create the application state for the configured storage backend
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let predictor = script_predictor(config);

    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            Ok(create_in_memory_state(config, predictor))
        }
        StorageBackend::Postgres => {
            let pool = connect_postgres(config).await?;

            Ok(assemble_state(
                config,
                predictor,
                Arc::new(PostgresUserRepository::new(pool.clone())),
                Arc::new(PostgresApiKeyRepository::new(pool.clone())),
                Arc::new(PostgresUsageRepository::new(pool.clone())),
                Some(pool),
            ))
        }
    }
}

/// State backed by in-memory repositories
pub fn create_in_memory_state(config: &AppConfig, predictor: Arc<dyn Predictor>) -> AppState {
    assemble_state(
        config,
        predictor,
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryApiKeyRepository::new()),
        Arc::new(InMemoryUsageRepository::new()),
        None,
    )
}

fn script_predictor(config: &AppConfig) -> Arc<dyn Predictor> {
    let prediction = &config.prediction;

    if !prediction.script.exists() {
        warn!(
            script = %prediction.script.display(),
            "Prediction script not found; predictions will fail until it is installed"
        );
    }

    Arc::new(ScriptPredictor::new(
        prediction.interpreter.clone(),
        prediction.script.clone(),
        prediction.timeout(),
    ))
}

async fn connect_postgres(config: &AppConfig) -> anyhow::Result<PgPool> {
    let url = config
        .storage
        .database_url
        .as_deref()
        .context("storage.database_url is required when storage.backend = \"postgres\"")?;

    let pool = connect_pool(
        &PostgresConfig::new(url).with_max_connections(config.storage.max_connections),
    )
    .await?;

    let applied = PostgresMigrator::new(pool.clone()).run().await?;
    info!(applied, "Database migrations complete");

    Ok(pool)
}

fn assemble_state<U, K, R>(
    config: &AppConfig,
    predictor: Arc<dyn Predictor>,
    users: Arc<U>,
    keys: Arc<K>,
    usage: Arc<R>,
    database: Option<PgPool>,
) -> AppState
where
    U: UserRepository + 'static,
    K: ApiKeyRepository + 'static,
    R: UsageRepository + 'static,
{
    let rate_limit = config.rate_limit.into();

    AppState {
        user_service: Arc::new(UserService::new(users, Arc::new(Argon2Hasher::new()))),
        api_key_service: Arc::new(
            ApiKeyService::new(keys, usage.clone()).with_default_rate_limit(rate_limit),
        ),
        usage_service: Arc::new(UsageService::new(usage)),
        jwt_service: Arc::new(JwtService::new(jwt_config(&config.auth))),
        predictor,
        uploads: Arc::new(UploadStore::new(config.prediction.upload_dir.clone())),
        rate_limit,
        database,
    }
}

fn jwt_config(auth: &AuthConfig) -> JwtConfig {
    match auth.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => JwtConfig::new(secret, auth.jwt_expiration_hours),
        None => {
            warn!("auth.jwt_secret is not set; using a random secret, sessions end on restart");
            JwtConfig::ephemeral(auth.jwt_expiration_hours)
        }
    }
}
