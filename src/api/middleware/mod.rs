//! API middleware components

pub mod api_key;
pub mod logging;
pub mod metrics;
pub mod security;
pub mod user_auth;

pub use api_key::{client_ip, require_api_key, AuthenticatedKey, API_KEY_HEADER};
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use security::security_headers_middleware;
pub use user_auth::{extract_jwt_token, RequireUser, AUTH_TOKEN_HEADER};
