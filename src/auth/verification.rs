use std::sync::Arc;

use axum::extract::FromRef;
use time::{Duration, OffsetDateTime};
use tracing::{error, info};

use crate::auth::one_time_token;
use crate::auth::password::hash_password;
use crate::config::AppConfig;
use crate::error::AuthError;
use crate::mail::{self, MailContent, Mailer};
use crate::state::AppState;
use crate::store::{CredentialStore, User};

/// Issues and consumes the opaque one-time tokens for email verification and
/// password reset. Issuance overwrites any outstanding token for the same
/// slot; consumption is a conditional write so a token can be spent once.
#[derive(Clone)]
pub struct VerificationService {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn Mailer>,
    config: Arc<AppConfig>,
}

impl FromRef<AppState> for VerificationService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            mailer: state.mailer.clone(),
            config: state.config.clone(),
        }
    }
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// Puts a fresh verification token on the user record and dispatches the
    /// verification email. Also invoked right after registration.
    pub(crate) async fn issue_email_verification(&self, user: &User) -> Result<User, AuthError> {
        let token = one_time_token::generate();
        let mut updated = user.clone();
        updated.email_verification_token = Some(token.clone());
        let updated = self.store.update(&updated).await?;
        info!(user_id = updated.id, "email verification token issued");

        let content = mail::verification_email(&self.config.mail, &updated.username, &token);
        self.dispatch(updated.email.clone(), content);
        Ok(updated)
    }

    /// The response to this request must not depend on whether the address
    /// is registered, so the unknown-address path is a silent no-op. An
    /// already-verified account is re-issued a token for the same reason.
    pub async fn request_email_verification(&self, email: &str) -> Result<(), AuthError> {
        match self.store.find_by_email(email).await? {
            Some(user) => {
                self.issue_email_verification(&user).await?;
                Ok(())
            }
            None => {
                info!(email = %email, "email verification requested for unknown address");
                Ok(())
            }
        }
    }

    pub async fn confirm_email(&self, token: &str) -> Result<User, AuthError> {
        match self.store.verify_email_by_token(token).await? {
            Some(user) => {
                info!(user_id = user.id, "email verified");
                Ok(user)
            }
            None => Err(AuthError::VerificationTokenInvalid),
        }
    }

    /// Same anti-enumeration contract as `request_email_verification`.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let user = match self.store.find_by_email(email).await? {
            Some(u) => u,
            None => {
                info!(email = %email, "password reset requested for unknown address");
                return Ok(());
            }
        };

        let token = one_time_token::generate();
        let mut updated = user.clone();
        updated.password_reset_token = Some(token.clone());
        updated.password_reset_token_expiry = Some(
            OffsetDateTime::now_utc() + Duration::minutes(self.config.reset_token_ttl_minutes),
        );
        let updated = self.store.update(&updated).await?;
        info!(user_id = updated.id, "password reset token issued");

        let content = mail::password_reset_email(&self.config.mail, &updated.username, &token);
        self.dispatch(updated.email.clone(), content);
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<User, AuthError> {
        let user = match self.store.find_by_password_reset_token(token).await? {
            Some(u) => u,
            None => return Err(AuthError::ResetTokenInvalid),
        };

        let now = OffsetDateTime::now_utc();
        let expired = user
            .password_reset_token_expiry
            .map_or(true, |exp| exp <= now);
        if expired {
            // Retire the dead token so it cannot be retried.
            self.store.clear_password_reset(token).await?;
            info!(user_id = user.id, "expired password reset token cleared");
            return Err(AuthError::ResetTokenInvalid);
        }

        let hashed = hash_password(new_password)?;
        match self
            .store
            .reset_password_by_token(token, &hashed, now)
            .await?
        {
            Some(updated) => {
                info!(user_id = updated.id, "password reset");
                Ok(updated)
            }
            // Lost the race against a concurrent consumer.
            None => Err(AuthError::ResetTokenInvalid),
        }
    }

    /// Fire-and-forget: the request path never waits on delivery and a
    /// delivery failure only shows up in the log.
    fn dispatch(&self, to: String, content: MailContent) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &content.subject, &content.html_body).await {
                error!(error = %e, to = %to, "email dispatch failed");
            }
        });
    }
}
