use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Subjects whose sessions were invalidated, with the time of invalidation.
///
/// Token `iat` claims carry whole seconds, so the revocation time is kept at
/// second precision too. A token issued in an earlier second no longer yields
/// a session. Tokens minted in the revocation's own second or later (the user
/// signs in again right away) are unaffected, which leaves a one-second window
/// for a token issued just before the sign-out.
#[derive(Default)]
pub struct RevocationList {
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn revoke(&self, subject: &str) {
        self.revoke_at(subject, Utc::now()).await;
    }

    pub async fn revoke_at(&self, subject: &str, at: DateTime<Utc>) {
        let at = at.trunc_subsecs(0);
        tracing::info!("Revoking sessions of subject {} issued before {}", subject, at);
        self.revoked.write().await.insert(subject.to_string(), at);
    }

    pub async fn is_revoked(&self, subject: &str, issued_at: DateTime<Utc>) -> bool {
        self.revoked
            .read()
            .await
            .get(subject)
            .is_some_and(|revoked_at| issued_at < *revoked_at)
    }
}
