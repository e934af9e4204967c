//! API usage record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::api_key::ApiKeyId;
use crate::domain::user::UserId;

/// Unique identifier for a usage record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageRecordId(String);

impl UsageRecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UsageRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One request made with a developer API key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUsage {
    pub id: UsageRecordId,
    pub api_key_id: ApiKeyId,
    pub user_id: UserId,
    /// Request path, e.g. `/api/v1/predict`
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ApiUsage {
    /// Create a usage record stamped with the current time
    pub fn new(
        api_key_id: ApiKeyId,
        user_id: UserId,
        endpoint: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            id: UsageRecordId::generate(),
            api_key_id,
            user_id,
            endpoint: endpoint.into(),
            method: method.into(),
            status_code: 200,
            response_time_ms: 0,
            timestamp: Utc::now(),
            ip_address: None,
            user_agent: None,
        }
    }

    /// Set the response outcome
    pub fn with_response(mut self, status_code: u16, response_time_ms: u64) -> Self {
        self.status_code = status_code;
        self.response_time_ms = response_time_ms;
        self
    }

    /// Override the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach client details
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_builder() {
        let at = Utc::now() - chrono::Duration::minutes(5);
        let usage = ApiUsage::new(ApiKeyId::generate(), UserId::generate(), "/api/v1/predict", "POST")
            .with_response(500, 42)
            .with_timestamp(at)
            .with_client(Some("10.0.0.1".to_string()), None);

        assert_eq!(usage.status_code, 500);
        assert_eq!(usage.response_time_ms, 42);
        assert_eq!(usage.timestamp, at);
        assert_eq!(usage.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(usage.user_agent.is_none());
    }

    #[test]
    fn test_usage_serializes_camel_case() {
        let usage = ApiUsage::new(ApiKeyId::generate(), UserId::generate(), "/x", "GET");
        let json = serde_json::to_value(&usage).unwrap();

        assert!(json.get("statusCode").is_some());
        assert!(json.get("responseTimeMs").is_some());
        assert!(json.get("ipAddress").is_none());
    }
}
