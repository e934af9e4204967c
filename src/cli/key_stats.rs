//! Key-stats command - inspect stored API keys
//!
//! Lookup prefixes carry only a few bytes of entropy, so every key sharing
//! the prefix is reported. Compares each key's own call counter with the number of usage records
//! stored for it. Only meaningful against the Postgres backend.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::config::{AppConfig, StorageBackend};
use crate::domain::{ApiKeyRepository, UsageRepository};
use crate::infrastructure::api_key::{ApiKeyService, PostgresApiKeyRepository};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::storage::{connect_pool, PostgresConfig};
use crate::infrastructure::usage::{PostgresUsageRepository, UsageService};

#[derive(Debug, Args)]
pub struct KeyStatsArgs {
    /// Stored lookup prefix, e.g. `sk_live_1605`
    #[arg(long)]
    pub prefix: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatsReport {
    pub id: String,
    pub name: String,
    pub prefix: String,
    pub is_active: bool,
    pub total_calls: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_records: u64,
}

pub async fn run(args: KeyStatsArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(&config.logging);

    if config.storage.backend != StorageBackend::Postgres {
        bail!("key-stats reads persisted data; set storage.backend = \"postgres\"");
    }

    let url = config
        .storage
        .database_url
        .as_deref()
        .context("storage.database_url is required")?;
    let pool = connect_pool(&PostgresConfig::new(url).with_max_connections(1)).await?;

    let usage_repo = std::sync::Arc::new(PostgresUsageRepository::new(pool.clone()));
    let api_keys = ApiKeyService::new(
        std::sync::Arc::new(PostgresApiKeyRepository::new(pool.clone())),
        usage_repo.clone(),
    );
    let usage = UsageService::new(usage_repo);

    let reports = collect(&api_keys, &usage, &args.prefix).await?;
    pool.close().await;

    if reports.is_empty() {
        bail!("Key not found with prefix: {}", args.prefix);
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

/// Every key with the prefix, oldest first, with its usage record count
pub async fn collect<R, U>(
    api_keys: &ApiKeyService<R, U>,
    usage: &UsageService<U>,
    prefix: &str,
) -> anyhow::Result<Vec<KeyStatsReport>>
where
    R: ApiKeyRepository,
    U: UsageRepository,
{
    let keys = api_keys.list_by_prefix(prefix).await?;
    let mut reports = Vec::with_capacity(keys.len());

    for key in keys {
        let usage_records = usage.count_for_key(key.id()).await?;

        reports.push(KeyStatsReport {
            id: key.id().to_string(),
            name: key.name().to_string(),
            prefix: key.key_prefix().to_string(),
            is_active: key.is_active(),
            total_calls: key.total_calls(),
            last_used_at: key.last_used_at(),
            usage_records,
        });
    }

    Ok(reports)
}
