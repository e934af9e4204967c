//! In-memory API key repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::api_key::{ApiKey, ApiKeyId, ApiKeyRepository};
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// In-memory implementation of ApiKeyRepository
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: Arc<RwLock<HashMap<String, ApiKey>>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        Ok(self.keys.read().await.get(id.as_str()).cloned())
    }

    async fn find_active_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;

        let mut matches: Vec<ApiKey> = keys
            .values()
            .filter(|k| k.is_active() && k.key_prefix() == prefix)
            .cloned()
            .collect();
        matches.sort_by_key(|k| k.created_at());

        Ok(matches)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;

        let mut matches: Vec<ApiKey> = keys
            .values()
            .filter(|k| k.key_prefix() == prefix)
            .cloned()
            .collect();
        matches.sort_by_key(|k| k.created_at());

        Ok(matches)
    }

    async fn list_active_by_user(&self, user_id: &UserId) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;

        let mut owned: Vec<ApiKey> = keys
            .values()
            .filter(|k| k.is_active() && k.is_owned_by(user_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(owned)
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;

        if keys.contains_key(api_key.id().as_str()) {
            return Err(DomainError::conflict(format!(
                "API key '{}' already exists",
                api_key.id()
            )));
        }

        keys.insert(api_key.id().as_str().to_string(), api_key.clone());
        Ok(api_key)
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        Ok(self.keys.write().await.remove(id.as_str()).is_some())
    }

    async fn record_usage(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        let mut keys = self.keys.write().await;

        match keys.get_mut(id.as_str()) {
            Some(key) => {
                key.record_usage(at);
                Ok(())
            }
            None => Err(DomainError::not_found(format!("API key '{}' not found", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user: &UserId, prefix: &str) -> ApiKey {
        ApiKey::new(ApiKeyId::generate(), user.clone(), "key", "sha256$x", prefix)
    }

    #[tokio::test]
    async fn test_prefix_lookup_skips_inactive() {
        let repo = InMemoryApiKeyRepository::new();
        let user = UserId::generate();

        repo.create(key(&user, "sk_live_aaaa")).await.unwrap();
        repo.create(key(&user, "sk_live_aaaa").with_active(false))
            .await
            .unwrap();
        repo.create(key(&user, "sk_live_bbbb")).await.unwrap();

        let active = repo.find_active_by_prefix("sk_live_aaaa").await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].is_active());

        assert_eq!(repo.list_by_prefix("sk_live_aaaa").await.unwrap().len(), 2);
        assert_eq!(repo.list_by_prefix("sk_live_bbbb").await.unwrap().len(), 1);
        assert!(repo.list_by_prefix("sk_live_cccc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let repo = InMemoryApiKeyRepository::new();
        let user = UserId::generate();
        let now = Utc::now();

        let older = key(&user, "sk_live_0001")
            .with_timestamps(now - chrono::Duration::hours(2), now);
        let newer = key(&user, "sk_live_0002");
        let other = key(&UserId::generate(), "sk_live_0003");

        repo.create(older.clone()).await.unwrap();
        repo.create(newer.clone()).await.unwrap();
        repo.create(other).await.unwrap();

        let listed = repo.list_active_by_user(&user).await.unwrap();
        let ids: Vec<&ApiKeyId> = listed.iter().map(|k| k.id()).collect();
        assert_eq!(ids, vec![newer.id(), older.id()]);
    }

    #[tokio::test]
    async fn test_record_usage_and_delete() {
        let repo = InMemoryApiKeyRepository::new();
        let created = repo
            .create(key(&UserId::generate(), "sk_live_abcd"))
            .await
            .unwrap();
        let at = Utc::now();

        repo.record_usage(created.id(), at).await.unwrap();
        let stored = repo.get(created.id()).await.unwrap().unwrap();
        assert_eq!(stored.total_calls(), 1);
        assert_eq!(stored.last_used_at(), Some(at));

        assert!(repo.delete(created.id()).await.unwrap());
        assert!(!repo.delete(created.id()).await.unwrap());
        assert!(repo.record_usage(created.id(), at).await.is_err());
    }
}
