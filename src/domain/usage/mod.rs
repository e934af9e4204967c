//! API usage tracking domain

mod record;
mod repository;

pub use record::{ApiUsage, UsageRecordId};
pub use repository::{UsageQuery, UsageRepository};
