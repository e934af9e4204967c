//! Usage repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::record::ApiUsage;
use crate::domain::api_key::ApiKeyId;
use crate::domain::DomainError;

/// Query parameters for usage records
#[derive(Debug, Clone, Default)]
pub struct UsageQuery {
    /// Restrict to these keys; `None` matches every key
    pub api_key_ids: Option<Vec<ApiKeyId>>,
    /// Start timestamp (inclusive)
    pub since: Option<DateTime<Utc>>,
}

impl UsageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by a single key
    pub fn for_key(api_key_id: &ApiKeyId) -> Self {
        Self::default().with_api_keys(vec![api_key_id.clone()])
    }

    /// Filter by a set of keys
    pub fn with_api_keys(mut self, api_key_ids: Vec<ApiKeyId>) -> Self {
        self.api_key_ids = Some(api_key_ids);
        self
    }

    /// Only records at or after `since`
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Whether a record satisfies this query
    pub fn matches(&self, usage: &ApiUsage) -> bool {
        if let Some(ids) = &self.api_key_ids {
            if !ids.contains(&usage.api_key_id) {
                return false;
            }
        }

        if let Some(since) = self.since {
            if usage.timestamp < since {
                return false;
            }
        }

        true
    }
}

/// Repository for usage records
#[async_trait]
pub trait UsageRepository: Send + Sync + Debug {
    /// Record a usage event
    async fn record(&self, usage: ApiUsage) -> Result<(), DomainError>;

    /// Count usage records matching query
    async fn count(&self, query: &UsageQuery) -> Result<u64, DomainError>;

    /// Timestamp of the oldest record matching query
    async fn earliest(&self, query: &UsageQuery) -> Result<Option<DateTime<Utc>>, DomainError>;

    /// Most recent records matching query, newest first
    async fn recent(&self, query: &UsageQuery, limit: usize) -> Result<Vec<ApiUsage>, DomainError>;

    /// Delete records older than the cutoff, returning how many were removed
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::UserId;

    #[test]
    fn test_query_matches() {
        let key = ApiKeyId::generate();
        let usage = ApiUsage::new(key.clone(), UserId::generate(), "/api/v1/predict", "POST");

        assert!(UsageQuery::new().matches(&usage));
        assert!(UsageQuery::for_key(&key).matches(&usage));
        assert!(!UsageQuery::for_key(&ApiKeyId::generate()).matches(&usage));
        assert!(!UsageQuery::new()
            .since(Utc::now() + chrono::Duration::hours(1))
            .matches(&usage));
    }

    #[test]
    fn test_empty_key_set_matches_nothing() {
        let usage = ApiUsage::new(ApiKeyId::generate(), UserId::generate(), "/x", "GET");
        assert!(!UsageQuery::new().with_api_keys(vec![]).matches(&usage));
    }
}
