//! Usage recording, developer statistics and retention

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;

use crate::domain::api_key::{ApiKeyId, RateLimit};
use crate::domain::usage::{ApiUsage, UsageQuery, UsageRepository};
use crate::domain::DomainError;

const RECENT_CALLS_LIMIT: usize = 10;

/// Calls made against one threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowUsage {
    pub used: u64,
    pub total: u32,
    pub remaining: u64,
}

impl WindowUsage {
    fn new(used: u64, total: u32) -> Self {
        Self {
            used,
            total,
            remaining: u64::from(total).saturating_sub(used),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitUsage {
    pub hourly: WindowUsage,
    pub daily: WindowUsage,
}

/// One entry in the recent-calls list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCall {
    pub endpoint: String,
    pub status_code: u16,
    /// Milliseconds
    pub response_time: u64,
    pub timestamp: DateTime<Utc>,
}

impl From<ApiUsage> for RecentCall {
    fn from(usage: ApiUsage) -> Self {
        Self {
            endpoint: usage.endpoint,
            status_code: usage.status_code,
            response_time: usage.response_time_ms,
            timestamp: usage.timestamp,
        }
    }
}

/// Aggregated usage across a developer's active keys
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub today: u64,
    pub this_week: u64,
    pub this_month: u64,
    pub rate_limit: RateLimitUsage,
    pub recent_calls: Vec<RecentCall>,
}

impl UsageStats {
    fn empty(limits: RateLimit) -> Self {
        Self {
            today: 0,
            this_week: 0,
            this_month: 0,
            rate_limit: RateLimitUsage {
                hourly: WindowUsage::new(0, limits.hourly),
                daily: WindowUsage::new(0, limits.daily),
            },
            recent_calls: Vec::new(),
        }
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(chrono::NaiveTime::MIN))
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN))
}

#[derive(Debug)]
pub struct UsageService<U: UsageRepository> {
    repository: Arc<U>,
}

impl<U: UsageRepository> UsageService<U> {
    pub fn new(repository: Arc<U>) -> Self {
        Self { repository }
    }

    pub async fn record(&self, usage: ApiUsage) -> Result<(), DomainError> {
        self.repository.record(usage).await
    }

    pub async fn stats(
        &self,
        key_ids: Vec<ApiKeyId>,
        limits: RateLimit,
    ) -> Result<UsageStats, DomainError> {
        self.stats_at(key_ids, limits, Utc::now()).await
    }

    /// Statistics as of `now`.
    ///
    /// Calendar windows (today, this month) are UTC. The daily threshold is
    /// reported against calls since midnight, the hourly one against the
    /// trailing hour.
    pub async fn stats_at(
        &self,
        key_ids: Vec<ApiKeyId>,
        limits: RateLimit,
        now: DateTime<Utc>,
    ) -> Result<UsageStats, DomainError> {
        if key_ids.is_empty() {
            return Ok(UsageStats::empty(limits));
        }

        let keys = UsageQuery::new().with_api_keys(key_ids);
        let today = self
            .repository
            .count(&keys.clone().since(start_of_day(now)))
            .await?;
        let this_week = self
            .repository
            .count(&keys.clone().since(now - Duration::days(7)))
            .await?;
        let this_month = self
            .repository
            .count(&keys.clone().since(start_of_month(now)))
            .await?;
        let last_hour = self
            .repository
            .count(&keys.clone().since(now - Duration::hours(1)))
            .await?;
        let recent_calls = self
            .repository
            .recent(&keys, RECENT_CALLS_LIMIT)
            .await?
            .into_iter()
            .map(RecentCall::from)
            .collect();

        Ok(UsageStats {
            today,
            this_week,
            this_month,
            rate_limit: RateLimitUsage {
                hourly: WindowUsage::new(last_hour, limits.hourly),
                daily: WindowUsage::new(today, limits.daily),
            },
            recent_calls,
        })
    }

    /// Total records for one key
    pub async fn count_for_key(&self, key_id: &ApiKeyId) -> Result<u64, DomainError> {
        self.repository.count(&UsageQuery::for_key(key_id)).await
    }

    /// Delete records older than the retention period
    pub async fn purge_expired(&self, retention: Duration) -> Result<u64, DomainError> {
        self.repository.delete_before(Utc::now() - retention).await
    }
}
