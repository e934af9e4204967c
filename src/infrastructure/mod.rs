//! Infrastructure layer - Storage, security and process implementations

pub mod api_key;
pub mod auth;
pub mod logging;
pub mod observability;
pub mod prediction;
pub mod storage;
pub mod usage;
pub mod user;
