//! User registration and sign-in

use std::sync::Arc;

use crate::domain::user::{
    normalize_email, validate_email, validate_password, validate_username, User, UserId,
    UserRepository,
};
use crate::domain::DomainError;

use super::password::PasswordHasher;

/// Input for a new email/password account
#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Account management over a user repository
#[derive(Debug)]
pub struct UserService<R: UserRepository, H: PasswordHasher> {
    repository: Arc<R>,
    hasher: Arc<H>,
}

impl<R: UserRepository, H: PasswordHasher> UserService<R, H> {
    pub fn new(repository: Arc<R>, hasher: Arc<H>) -> Self {
        Self { repository, hasher }
    }

    /// Create an account; the email is stored lowercased and must be unused
    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, DomainError> {
        validate_username(&request.username)
            .map_err(|e| DomainError::validation(e.to_string()))?;
        validate_email(&request.email).map_err(|e| DomainError::validation(e.to_string()))?;
        validate_password(&request.password)
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let email = normalize_email(&request.email);
        if self.repository.email_exists(&email).await? {
            return Err(DomainError::conflict("User already exists"));
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = User::new(UserId::generate(), request.username.trim(), email)
            .with_password_hash(password_hash);

        let user = self.repository.create(user).await?;
        tracing::info!(user_id = %user.id(), "User registered");

        Ok(user)
    }

    /// Check email and password; `None` when either is wrong
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, DomainError> {
        let user = match self.repository.get_by_email(&normalize_email(email)).await? {
            Some(u) => u,
            None => return Ok(None),
        };

        // Google-only accounts have no password to check against
        let verified = user
            .password_hash()
            .is_some_and(|hash| self.hasher.verify(password, hash));

        Ok(verified.then_some(user))
    }

    /// Get a user by ID
    pub async fn get(&self, id: &str) -> Result<Option<User>, DomainError> {
        let Ok(user_id) = UserId::new(id) else {
            return Ok(None);
        };
        self.repository.get(&user_id).await
    }

    pub async fn count(&self) -> Result<usize, DomainError> {
        self.repository.count().await
    }
}
