#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum::Router;

use doorman::app::build_app;
use doorman::auth::service::AuthService;
use doorman::auth::verification::VerificationService;
use doorman::mail::{Mailer, RecordingMailer};
use doorman::state::AppState;
use doorman::store::memory::InMemoryCredentialStore;
use doorman::store::CredentialStore;

/// In-memory application wiring with handles onto the fake collaborators so
/// tests can inspect stored records and recorded mail.
pub struct Harness {
    pub state: AppState,
    pub store: Arc<InMemoryCredentialStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryCredentialStore::new());
    let mailer = Arc::new(RecordingMailer::new());
    let state = AppState::fake_with(
        store.clone() as Arc<dyn CredentialStore>,
        mailer.clone() as Arc<dyn Mailer>,
    );
    Harness {
        state,
        store,
        mailer,
    }
}

impl Harness {
    pub fn auth(&self) -> AuthService {
        AuthService::from_ref(&self.state)
    }

    pub fn verification(&self) -> VerificationService {
        VerificationService::from_ref(&self.state)
    }

    pub fn app(&self) -> Router {
        build_app(self.state.clone())
    }
}

/// Lets spawned background work (email dispatch) run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
