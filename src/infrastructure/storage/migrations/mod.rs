//! Versioned schema migrations

use sqlx::postgres::PgPool;

use crate::domain::DomainError;

/// One forward-only schema change
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub up: &'static str,
}

/// Schema for users, developer keys and usage records
pub fn schema_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "create users",
            up: r#"
                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    username TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT,
                    google_id TEXT UNIQUE,
                    avatar TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
            "#,
        },
        Migration {
            version: 2,
            description: "create api_keys",
            up: r#"
                CREATE TABLE IF NOT EXISTS api_keys (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    key_hash TEXT NOT NULL,
                    key_prefix TEXT NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    rate_limit_hourly INTEGER NOT NULL DEFAULT 100,
                    rate_limit_daily INTEGER NOT NULL DEFAULT 1000,
                    total_calls BIGINT NOT NULL DEFAULT 0,
                    last_used_at TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX IF NOT EXISTS idx_api_keys_prefix_active
                    ON api_keys (key_prefix, is_active);
                CREATE INDEX IF NOT EXISTS idx_api_keys_user_active
                    ON api_keys (user_id, is_active);
            "#,
        },
        Migration {
            version: 3,
            description: "create api_usage",
            up: r#"
                CREATE TABLE IF NOT EXISTS api_usage (
                    id TEXT PRIMARY KEY,
                    api_key_id TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    endpoint TEXT NOT NULL,
                    method TEXT NOT NULL,
                    status_code INTEGER NOT NULL,
                    response_time_ms BIGINT NOT NULL,
                    timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    ip_address TEXT,
                    user_agent TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_api_usage_key_time
                    ON api_usage (api_key_id, timestamp);
                CREATE INDEX IF NOT EXISTS idx_api_usage_user_time
                    ON api_usage (user_id, timestamp);
                CREATE INDEX IF NOT EXISTS idx_api_usage_time
                    ON api_usage (timestamp);
            "#,
        },
    ]
}

/// Applies migrations in version order, recording each in `_migrations`
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create migrations table: {}", e)))?;

        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)")
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check migration status: {}", e)))
    }

    /// Apply a single migration inside a transaction; no-op when already applied
    pub async fn apply(&self, migration: &Migration) -> Result<bool, DomainError> {
        if self.is_applied(migration.version).await? {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to run migration {}: {}",
                    migration.version, e
                ))
            })?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to record migration {}: {}",
                    migration.version, e
                ))
            })?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit migration: {}", e)))?;

        Ok(true)
    }

    /// Apply every pending schema migration
    pub async fn run(&self) -> Result<usize, DomainError> {
        self.ensure_migrations_table().await?;

        let mut migrations = schema_migrations();
        migrations.sort_by_key(|m| m.version);

        let mut applied = 0;
        for migration in &migrations {
            if self.apply(migration).await? {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "Applied migration"
                );
                applied += 1;
            }
        }

        Ok(applied)
    }
}
