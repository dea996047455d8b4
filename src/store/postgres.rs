use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::store::{CredentialStore, NewUser, StoreError, User};

const USER_COLUMNS: &str = "id, username, email, hashed_password, is_active, is_verified_email, \
     email_verification_token, password_reset_token, password_reset_token_expiry, \
     created_at, updated_at";

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_column(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

/// Unique violations on the username/email indexes become the matching
/// conflict variant; anything else stays a database error.
fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some("ix_users_username") => return StoreError::UsernameTaken,
                Some("ix_users_email") => return StoreError::EmailTaken,
                _ => {}
            }
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            "INSERT INTO users (username, email, hashed_password) \
             VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.hashed_password)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE users SET username = $2, email = $3, hashed_password = $4, \
             is_active = $5, is_verified_email = $6, email_verification_token = $7, \
             password_reset_token = $8, password_reset_token_expiry = $9, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.hashed_password)
            .bind(user.is_active)
            .bind(user.is_verified_email)
            .bind(&user.email_verification_token)
            .bind(&user.password_reset_token)
            .bind(user.password_reset_token_expiry)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_by_column("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_by_column("email", email).await
    }

    async fn find_by_email_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, StoreError> {
        self.find_by_column("email_verification_token", token).await
    }

    async fn find_by_password_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.find_by_column("password_reset_token", token).await
    }

    async fn verify_email_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "UPDATE users SET is_verified_email = TRUE, email_verification_token = NULL, \
             updated_at = NOW() \
             WHERE email_verification_token = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn reset_password_by_token(
        &self,
        token: &str,
        new_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let query = format!(
            "UPDATE users SET hashed_password = $2, password_reset_token = NULL, \
             password_reset_token_expiry = NULL, updated_at = NOW() \
             WHERE password_reset_token = $1 \
               AND password_reset_token_expiry IS NOT NULL \
               AND password_reset_token_expiry > $3 \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(token)
            .bind(new_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn clear_password_reset(&self, token: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "UPDATE users SET password_reset_token = NULL, password_reset_token_expiry = NULL, \
             updated_at = NOW() \
             WHERE password_reset_token = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
