//! PostgreSQL API key repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository, RateLimit};
use crate::domain::user::UserId;
use crate::domain::DomainError;
use crate::infrastructure::storage::is_unique_violation;

const API_KEY_COLUMNS: &str = "id, user_id, name, key_hash, key_prefix, is_active, \
     rate_limit_hourly, rate_limit_daily, total_calls, last_used_at, created_at, updated_at";

/// PostgreSQL implementation of ApiKeyRepository
#[derive(Debug, Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to get API key: {}", e)))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn find_active_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE key_prefix = $1 AND is_active = TRUE ORDER BY created_at ASC"
        ))
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to look up API key: {}", e)))?;

        rows.iter().map(row_to_api_key).collect()
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE key_prefix = $1 ORDER BY created_at ASC"
        ))
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to look up API key: {}", e)))?;

        rows.iter().map(row_to_api_key).collect()
    }

    async fn list_active_by_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError> {
        let rows = sqlx::query(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE user_id = $1 AND is_active = TRUE ORDER BY created_at DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to list API keys: {}", e)))?;

        rows.iter().map(row_to_api_key).collect()
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let limit = api_key.rate_limit();

        sqlx::query(
            r#"
            INSERT INTO api_keys (id, user_id, name, key_hash, key_prefix, is_active,
                                  rate_limit_hourly, rate_limit_daily, total_calls,
                                  last_used_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(api_key.id().as_str())
        .bind(api_key.user_id().as_str())
        .bind(api_key.name())
        .bind(api_key.key_hash())
        .bind(api_key.key_prefix())
        .bind(api_key.is_active())
        .bind(limit.hourly as i32)
        .bind(limit.daily as i32)
        .bind(api_key.total_calls() as i64)
        .bind(api_key.last_used_at())
        .bind(api_key.created_at())
        .bind(api_key.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!("API key '{}' already exists", api_key.id()))
            } else {
                DomainError::storage(format!("Failed to create API key: {}", e))
            }
        })?;

        Ok(api_key)
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete API key: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_usage(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET total_calls = total_calls + 1, last_used_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to record API key usage: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("API key '{}' not found", id)));
        }

        Ok(())
    }
}

fn row_to_api_key(row: &PgRow) -> Result<ApiKey, DomainError> {
    let (id, user_id) = parse_ids(row.get("id"), row.get("user_id"))?;

    Ok(ApiKey::new(
        id,
        user_id,
        row.get::<String, _>("name"),
        row.get::<String, _>("key_hash"),
        row.get::<String, _>("key_prefix"),
    )
    .with_active(row.get("is_active"))
    .with_rate_limit(rate_limit_from_columns(
        row.get("rate_limit_hourly"),
        row.get("rate_limit_daily"),
    ))
    .with_usage(counter_from_column(row.get("total_calls")), row.get("last_used_at"))
    .with_timestamps(row.get("created_at"), row.get("updated_at")))
}

fn parse_ids(id: String, user_id: String) -> Result<(ApiKeyId, UserId), DomainError> {
    let id = ApiKeyId::new(id).map_err(|e| DomainError::storage(e.to_string()))?;
    let user_id = UserId::new(user_id).map_err(|e| DomainError::storage(e.to_string()))?;
    Ok((id, user_id))
}

/// Negative column values clamp to zero
fn rate_limit_from_columns(hourly: i32, daily: i32) -> RateLimit {
    RateLimit::new(
        u32::try_from(hourly).unwrap_or(0),
        u32::try_from(daily).unwrap_or(0),
    )
}

fn counter_from_column(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_conversion() {
        assert_eq!(rate_limit_from_columns(100, 1000), RateLimit::default());
        assert_eq!(rate_limit_from_columns(-5, 20), RateLimit::new(0, 20));
    }

    #[test]
    fn test_counter_conversion() {
        assert_eq!(counter_from_column(42), 42);
        assert_eq!(counter_from_column(-1), 0);
    }

    #[test]
    fn test_id_conversion() {
        let (id, user_id) = parse_ids("key-1".to_string(), "user-1".to_string()).unwrap();
        assert_eq!(id.as_str(), "key-1");
        assert_eq!(user_id.as_str(), "user-1");

        let err = parse_ids("bad id!".to_string(), "user-1".to_string()).unwrap_err();
        assert!(matches!(err, DomainError::Storage { .. }));

        let err = parse_ids("key-1".to_string(), String::new()).unwrap_err();
        assert!(matches!(err, DomainError::Storage { .. }));
    }
}
