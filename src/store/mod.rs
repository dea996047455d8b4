use axum::async_trait;
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;

pub mod memory;
pub mod postgres;

/// User record as held by the credential store.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, never the plaintext.
    pub hashed_password: String,
    pub is_active: bool,
    pub is_verified_email: bool,
    /// Outstanding email verification token, at most one per user.
    pub email_verification_token: Option<String>,
    /// Outstanding password reset token, at most one per user.
    pub password_reset_token: Option<String>,
    /// Only meaningful while `password_reset_token` is set.
    pub password_reset_token_expiry: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields supplied at registration; everything else defaults.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already registered")]
    UsernameTaken,

    #[error("email already registered")]
    EmailTaken,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Durable user records looked up by id, username, email or token.
///
/// The three token operations are conditional writes: they mutate the row
/// only if the token (still) matches, so two concurrent consumers cannot
/// both succeed against the same token.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Full-record update keyed by id; bumps `updated_at`.
    async fn update(&self, user: &User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn find_by_password_reset_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Marks the email verified and clears the token, if the token matches.
    async fn verify_email_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Replaces the password hash and clears the reset slot, if the token
    /// matches and is unexpired at `now`.
    async fn reset_password_by_token(
        &self,
        token: &str,
        new_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;

    /// Clears the reset slot without touching the password, if the token
    /// matches. Used to retire expired tokens on first sight.
    async fn clear_password_reset(&self, token: &str) -> Result<Option<User>, StoreError>;
}
