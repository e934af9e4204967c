//! Usage-window rate limiting
//!
//! Counts recorded usage for a key in the trailing hour and trailing day.
//! Nothing is cached; every check reads the usage repository.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::api_key::ApiKey;
use crate::domain::usage::{UsageQuery, UsageRepository};
use crate::domain::DomainError;

/// Window whose threshold was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPeriod {
    Hour,
    Day,
}

impl LimitPeriod {
    pub fn duration(&self) -> Duration {
        match self {
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
        }
    }
}

impl std::fmt::Display for LimitPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hour => write!(f, "hour"),
            Self::Day => write!(f, "day"),
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitResult {
    Allowed,
    Exceeded {
        period: LimitPeriod,
        limit: u32,
        /// When the oldest counted call leaves the window
        reset_at: DateTime<Utc>,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Checks a key's hourly then daily threshold against recorded usage
#[derive(Debug)]
pub struct RateLimiter<U: UsageRepository> {
    usage: Arc<U>,
}

impl<U: UsageRepository> RateLimiter<U> {
    pub fn new(usage: Arc<U>) -> Self {
        Self { usage }
    }

    pub async fn check(&self, key: &ApiKey) -> Result<RateLimitResult, DomainError> {
        self.check_at(key, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        key: &ApiKey,
        now: DateTime<Utc>,
    ) -> Result<RateLimitResult, DomainError> {
        let limits = key.rate_limit();

        for (period, limit) in [
            (LimitPeriod::Hour, limits.hourly),
            (LimitPeriod::Day, limits.daily),
        ] {
            let window = UsageQuery::for_key(key.id()).since(now - period.duration());
            let used = self.usage.count(&window).await?;

            if used >= u64::from(limit) {
                let reset_at = self
                    .usage
                    .earliest(&window)
                    .await?
                    .unwrap_or(now)
                    + period.duration();

                return Ok(RateLimitResult::Exceeded {
                    period,
                    limit,
                    reset_at,
                });
            }
        }

        Ok(RateLimitResult::Allowed)
    }
}
