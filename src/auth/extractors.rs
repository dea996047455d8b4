use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::service::AuthService;
use crate::error::AuthError;
use crate::store::User;

/// Extracts the active user behind the presented access token. Any failure
/// along the way (missing header, wrong scheme, bad token, missing subject)
/// rejects with the same invalid-token error.
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                warn!("missing Authorization header");
                AuthError::InvalidToken
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            warn!("Authorization header without Bearer scheme");
            AuthError::InvalidToken
        })?;

        let service = AuthService::from_ref(state);
        let user = service.current_active_user(token).await?;
        Ok(CurrentUser(user))
    }
}
