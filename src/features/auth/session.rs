use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use std::sync::Arc;
use tokio::sync::watch;

use super::revocation::RevocationList;
use super::validator::JwtValidator;
use crate::features::access::collaborators::{AuthCollaborator, AuthError};
use crate::features::access::model::SessionState;

/// Session of a single HTTP request, as the access core sees it.
///
/// Signing out revokes the subject's tokens issued before the current second,
/// so the caller's next request arrives without a session.
pub struct RequestSession {
    tx: watch::Sender<SessionState>,
    revocations: Arc<RevocationList>,
}

impl RequestSession {
    pub fn new(session: SessionState, revocations: Arc<RevocationList>) -> Self {
        let (tx, _) = watch::channel(session);
        Self { tx, revocations }
    }
}

#[async_trait]
impl AuthCollaborator for RequestSession {
    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let subject = self.tx.borrow().subject().map(str::to_string);
        if let Some(subject) = subject {
            self.revocations.revoke(&subject).await;
        }
        self.tx.send_replace(SessionState::Absent);
        Ok(())
    }
}

/// Session carried by the request's bearer token. Anything short of a valid,
/// unrevoked token reads as `Absent`.
pub async fn session_from_headers(validator: &JwtValidator, headers: &HeaderMap) -> SessionState {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return SessionState::Absent;
    };
    let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) else {
        tracing::debug!("Ignoring authorization header without a bearer token");
        return SessionState::Absent;
    };

    match validator.validate_token(token.trim()).await {
        Ok(identity) => SessionState::Present(identity.subject),
        Err(e) => {
            tracing::info!("Rejected bearer token: {}", e);
            SessionState::Absent
        }
    }
}
