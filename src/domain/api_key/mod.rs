//! Developer API key domain

mod entity;
mod repository;
mod validation;

pub use entity::{ApiKey, ApiKeyId, RateLimit};
pub use repository::ApiKeyRepository;
pub use validation::{
    lookup_prefix, validate_api_key_id, validate_key_format, validate_key_name,
    ApiKeyValidationError, KEY_LENGTH, KEY_SECRET_HEX_LENGTH, KEY_TYPE_PREFIX,
    LOOKUP_PREFIX_LENGTH,
};
