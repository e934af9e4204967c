//! PostgreSQL usage repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};

use crate::domain::api_key::ApiKeyId;
use crate::domain::usage::{ApiUsage, UsageQuery, UsageRecordId, UsageRepository};
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// PostgreSQL implementation of UsageRepository
#[derive(Debug, Clone)]
pub struct PostgresUsageRepository {
    pool: PgPool,
}

impl PostgresUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Append `WHERE` clauses for a usage query
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &UsageQuery) {
    builder.push(" WHERE TRUE");

    if let Some(ids) = &query.api_key_ids {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        builder.push(" AND api_key_id = ANY(").push_bind(ids).push(")");
    }

    if let Some(since) = query.since {
        builder.push(" AND timestamp >= ").push_bind(since);
    }
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn record(&self, usage: ApiUsage) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO api_usage (id, api_key_id, user_id, endpoint, method, status_code,
                                   response_time_ms, timestamp, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(usage.id.as_str())
        .bind(usage.api_key_id.as_str())
        .bind(usage.user_id.as_str())
        .bind(&usage.endpoint)
        .bind(&usage.method)
        .bind(i32::from(usage.status_code))
        .bind(usage.response_time_ms as i64)
        .bind(usage.timestamp)
        .bind(&usage.ip_address)
        .bind(&usage.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to record usage: {}", e)))?;

        Ok(())
    }

    async fn count(&self, query: &UsageQuery) -> Result<u64, DomainError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM api_usage");
        push_filters(&mut builder, query);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count usage: {}", e)))?;

        Ok(count.max(0) as u64)
    }

    async fn earliest(&self, query: &UsageQuery) -> Result<Option<DateTime<Utc>>, DomainError> {
        let mut builder = QueryBuilder::new("SELECT MIN(timestamp) FROM api_usage");
        push_filters(&mut builder, query);

        builder
            .build_query_scalar::<Option<DateTime<Utc>>>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to query usage: {}", e)))
    }

    async fn recent(&self, query: &UsageQuery, limit: usize) -> Result<Vec<ApiUsage>, DomainError> {
        let mut builder = QueryBuilder::new(
            "SELECT id, api_key_id, user_id, endpoint, method, status_code, \
             response_time_ms, timestamp, ip_address, user_agent FROM api_usage",
        );
        push_filters(&mut builder, query);
        builder
            .push(" ORDER BY timestamp DESC LIMIT ")
            .push_bind(limit as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to query usage: {}", e)))?;

        rows.iter().map(row_to_usage).collect()
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM api_usage WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to purge usage: {}", e)))?;

        Ok(result.rows_affected())
    }
}

/// Out-of-range status codes read back as 0
fn status_from_column(value: i32) -> u16 {
    u16::try_from(value).unwrap_or_default()
}

fn row_to_usage(row: &PgRow) -> Result<ApiUsage, DomainError> {
    let api_key_id = ApiKeyId::new(row.get::<String, _>("api_key_id"))
        .map_err(|e| DomainError::storage(e.to_string()))?;
    let user_id = UserId::new(row.get::<String, _>("user_id"))
        .map_err(|e| DomainError::storage(e.to_string()))?;
    let status_code: i32 = row.get("status_code");
    let response_time_ms: i64 = row.get("response_time_ms");

    Ok(ApiUsage {
        id: UsageRecordId::new(row.get::<String, _>("id")),
        api_key_id,
        user_id,
        endpoint: row.get("endpoint"),
        method: row.get("method"),
        status_code: status_from_column(status_code),
        response_time_ms: u64::try_from(response_time_ms).unwrap_or(0),
        timestamp: row.get("timestamp"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filtered_sql(query: &UsageQuery) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM api_usage");
        push_filters(&mut builder, query);
        builder.sql().to_string()
    }

    #[test]
    fn test_filters_unrestricted() {
        assert_eq!(
            filtered_sql(&UsageQuery::new()),
            "SELECT COUNT(*) FROM api_usage WHERE TRUE"
        );
    }

    #[test]
    fn test_filters_key_and_since() {
        let key = ApiKeyId::new("key-1").unwrap();
        let query = UsageQuery::for_key(&key).since(Utc::now());

        assert_eq!(
            filtered_sql(&query),
            "SELECT COUNT(*) FROM api_usage WHERE TRUE AND api_key_id = ANY($1) AND timestamp >= $2"
        );
    }

    #[test]
    fn test_filters_since_only() {
        let query = UsageQuery::new().since(Utc::now());

        assert_eq!(
            filtered_sql(&query),
            "SELECT COUNT(*) FROM api_usage WHERE TRUE AND timestamp >= $1"
        );
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(status_from_column(429), 429);
        assert_eq!(status_from_column(-1), 0);
        assert_eq!(status_from_column(70_000), 0);
    }
}
