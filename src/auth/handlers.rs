use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::auth::dto::{
    EmailRequest, LoginRequest, Message, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    TokenPair, UserPublic,
};
use crate::auth::extractors::CurrentUser;
use crate::auth::service::AuthService;
use crate::auth::verification::VerificationService;
use crate::error::AuthError;
use crate::state::AppState;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;

/// Both request-* endpoints answer with these fixed messages no matter
/// whether the address is registered.
const VERIFICATION_REQUESTED: &str =
    "If an account with that email exists, a verification link has been sent.";
const RESET_REQUESTED: &str =
    "If an account with that email exists, a password reset link has been sent.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route(
            "/auth/request-email-verification",
            post(request_email_verification),
        )
        .route("/auth/verify-email/:token", get(verify_email))
        .route("/auth/request-password-reset", post(request_password_reset))
        .route("/auth/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserPublic>), AuthError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.len() < USERNAME_MIN || payload.username.len() > USERNAME_MAX {
        warn!(username = %payload.username, "invalid username length");
        return Err(AuthError::Validation(
            "Username must be 3 to 32 characters".into(),
        ));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if payload.password.len() < PASSWORD_MIN {
        warn!("password too short");
        return Err(AuthError::Validation("Password too short".into()));
    }

    let service = AuthService::from_ref(&state);
    let user = service
        .register(&payload.username, &payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(UserPublic::from(user))))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    payload.username = payload.username.trim().to_string();

    let service = AuthService::from_ref(&state);
    let pair = service.login(&payload.username, &payload.password).await?;
    Ok(Json(pair))
}

#[instrument(skip(state, payload))]
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let service = AuthService::from_ref(&state);
    let pair = service.refresh(&payload.refresh_token).await?;
    Ok(Json(pair))
}

#[instrument(skip_all)]
async fn me(CurrentUser(user): CurrentUser) -> Json<UserPublic> {
    Json(UserPublic::from(user))
}

#[instrument(skip(state, payload))]
async fn request_email_verification(
    State(state): State<AppState>,
    Json(mut payload): Json<EmailRequest>,
) -> Result<Json<Message>, AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    let service = VerificationService::from_ref(&state);
    service.request_email_verification(&payload.email).await?;
    Ok(Json(Message {
        message: VERIFICATION_REQUESTED.to_string(),
    }))
}

#[instrument(skip(state, token))]
async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Message>, AuthError> {
    let service = VerificationService::from_ref(&state);
    service.confirm_email(&token).await?;
    Ok(Json(Message {
        message: "Email verified successfully.".to_string(),
    }))
}

#[instrument(skip(state, payload))]
async fn request_password_reset(
    State(state): State<AppState>,
    Json(mut payload): Json<EmailRequest>,
) -> Result<Json<Message>, AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    let service = VerificationService::from_ref(&state);
    service.request_password_reset(&payload.email).await?;
    Ok(Json(Message {
        message: RESET_REQUESTED.to_string(),
    }))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Message>, AuthError> {
    if payload.new_password.len() < PASSWORD_MIN {
        warn!("password too short");
        return Err(AuthError::Validation("Password too short".into()));
    }

    let service = VerificationService::from_ref(&state);
    service
        .reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(Message {
        message: "Password has been reset successfully.".to_string(),
    }))
}
