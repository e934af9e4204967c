//! User domain
//!
//! Accounts that sign in to the web application and own developer API keys.

mod entity;
mod repository;
mod validation;

pub use entity::{User, UserId};
pub use repository::UserRepository;
pub use validation::{
    normalize_email, validate_email, validate_password, validate_user_id, validate_username,
    UserValidationError,
};
