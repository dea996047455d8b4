use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Domain errors for the account and token lifecycle. HTTP mapping happens
/// only here, in `IntoResponse`; everything below the handlers returns these.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username already registered")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    /// Unknown username and wrong password collapse into this one variant so
    /// the response never reveals which of the two it was.
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Inactive user")]
    InactiveUser,

    /// Malformed, forged, expired or wrong-kind bearer token, or a token
    /// whose subject no longer exists.
    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Email verification token is invalid or has expired.")]
    VerificationTokenInvalid,

    #[error("Password reset token is invalid or has expired.")]
    ResetTokenInvalid,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UsernameTaken => AuthError::UsernameTaken,
            StoreError::EmailTaken => AuthError::EmailTaken,
            StoreError::Database(e) => AuthError::Internal(e.into()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            AuthError::UsernameTaken | AuthError::EmailTaken => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AuthError::InactiveUser
            | AuthError::VerificationTokenInvalid
            | AuthError::ResetTokenInvalid => (StatusCode::BAD_REQUEST, self.to_string()),
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({ "detail": detail }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
