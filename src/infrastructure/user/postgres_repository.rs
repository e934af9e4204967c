//! PostgreSQL user repository

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::storage::is_unique_violation;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, google_id, avatar, created_at, updated_at";

/// PostgreSQL implementation of UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user by email: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, google_id, avatar,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id().as_str())
        .bind(user.username())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.google_id())
        .bind(user.avatar())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict("User already exists")
            } else {
                DomainError::storage(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(user)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count users: {}", e)))?;

        Ok(count as usize)
    }
}

fn row_to_user(row: &PgRow) -> Result<User, DomainError> {
    let id = parse_user_id(row.get("id"))?;

    let user = User::new(id, row.get::<String, _>("username"), row.get::<String, _>("email"))
        .with_timestamps(row.get("created_at"), row.get("updated_at"));

    Ok(with_optional_columns(
        user,
        row.get("password_hash"),
        row.get("google_id"),
        row.get("avatar"),
    ))
}

fn parse_user_id(id: String) -> Result<UserId, DomainError> {
    UserId::new(id).map_err(|e| DomainError::storage(e.to_string()))
}

/// NULL columns leave the corresponding field unset
fn with_optional_columns(
    mut user: User,
    password_hash: Option<String>,
    google_id: Option<String>,
    avatar: Option<String>,
) -> User {
    if let Some(hash) = password_hash {
        user = user.with_password_hash(hash);
    }
    if let Some(google_id) = google_id {
        user = user.with_google_id(google_id);
    }
    if let Some(avatar) = avatar {
        user = user.with_avatar(avatar);
    }
    user
}
