//! In-memory usage repository

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::usage::{ApiUsage, UsageQuery, UsageRepository};
use crate::domain::DomainError;

/// Usage records held in a vector; suitable for tests and single-process runs
#[derive(Debug, Default)]
pub struct InMemoryUsageRepository {
    records: RwLock<Vec<ApiUsage>>,
}

impl InMemoryUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<ApiUsage>>, DomainError> {
        self.records
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<ApiUsage>>, DomainError> {
        self.records
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl UsageRepository for InMemoryUsageRepository {
    async fn record(&self, usage: ApiUsage) -> Result<(), DomainError> {
        self.write()?.push(usage);
        Ok(())
    }

    async fn count(&self, query: &UsageQuery) -> Result<u64, DomainError> {
        Ok(self.read()?.iter().filter(|u| query.matches(u)).count() as u64)
    }

    async fn earliest(&self, query: &UsageQuery) -> Result<Option<DateTime<Utc>>, DomainError> {
        Ok(self
            .read()?
            .iter()
            .filter(|u| query.matches(u))
            .map(|u| u.timestamp)
            .min())
    }

    async fn recent(&self, query: &UsageQuery, limit: usize) -> Result<Vec<ApiUsage>, DomainError> {
        let mut matching: Vec<ApiUsage> = self
            .read()?
            .iter()
            .filter(|u| query.matches(u))
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);

        Ok(matching)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|u| u.timestamp >= cutoff);

        Ok((before - records.len()) as u64)
    }
}
