use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::store::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for the two email-based lifecycle requests.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Request body for consuming a password reset token.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Response returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Generic message body; the request-* endpoints return it with identical
/// content whether or not the email is registered.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

/// Public part of the user returned to clients. Never carries the password
/// hash or either token slot.
#[derive(Debug, Serialize)]
pub struct UserPublic {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_verified_email: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            is_verified_email: user.is_verified_email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
