use std::sync::Mutex;

use axum::async_trait;
use time::OffsetDateTime;

use crate::store::{CredentialStore, NewUser, StoreError, User};

/// Mutex-protected in-memory store. Backs the tests and `AppState::fake()`;
/// every trait method is a single lock section, which gives it the same
/// "conditional writes are atomic" behavior as the SQL implementation.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("user table mutex poisoned")
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.username == new_user.username) {
            return Err(StoreError::UsernameTaken);
        }
        if inner.users.iter().any(|u| u.email == new_user.email) {
            return Err(StoreError::EmailTaken);
        }
        inner.next_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: inner.next_id,
            username: new_user.username,
            email: new_user.email,
            hashed_password: new_user.hashed_password,
            is_active: true,
            is_verified_email: false,
            email_verification_token: None,
            password_reset_token: None,
            password_reset_token_expiry: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut inner = self.lock();
        let slot = inner
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        *slot = User {
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(slot.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_email_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email_verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_by_password_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.password_reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn verify_email_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let mut inner = self.lock();
        let slot = inner
            .users
            .iter_mut()
            .find(|u| u.email_verification_token.as_deref() == Some(token));
        Ok(slot.map(|u| {
            u.is_verified_email = true;
            u.email_verification_token = None;
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn reset_password_by_token(
        &self,
        token: &str,
        new_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let mut inner = self.lock();
        let slot = inner.users.iter_mut().find(|u| {
            u.password_reset_token.as_deref() == Some(token)
                && u.password_reset_token_expiry.map_or(false, |exp| exp > now)
        });
        Ok(slot.map(|u| {
            u.hashed_password = new_hash.to_string();
            u.password_reset_token = None;
            u.password_reset_token_expiry = None;
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn clear_password_reset(&self, token: &str) -> Result<Option<User>, StoreError> {
        let mut inner = self.lock();
        let slot = inner
            .users
            .iter_mut()
            .find(|u| u.password_reset_token.as_deref() == Some(token));
        Ok(slot.map(|u| {
            u.password_reset_token = None;
            u.password_reset_token_expiry = None;
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }
}
