use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::collaborators::{DocumentStore, USERS_COLLECTION};
use super::model::{Profile, RoleLookup};

/// One-shot profile lookup at `users/{subject}`.
///
/// No subscription and no retry: each call is a single point read bounded by
/// `timeout`. Callers decide how often to call it.
pub struct RoleResolver {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn resolve(&self, subject: &str) -> RoleLookup {
        let read = self.store.get_document(USERS_COLLECTION, subject);

        match tokio::time::timeout(self.timeout, read).await {
            Ok(Ok(Some(document))) => match parse_profile(subject, document) {
                Ok(profile) => {
                    tracing::debug!("Resolved role '{}' for subject {}", profile.role, subject);
                    RoleLookup::Found(profile)
                }
                Err(reason) => {
                    tracing::warn!("Profile for subject {} is unusable: {}", subject, reason);
                    RoleLookup::NotFound
                }
            },
            Ok(Ok(None)) => {
                tracing::warn!(
                    "Subject {} is authenticated but has no profile document",
                    subject
                );
                RoleLookup::NotFound
            }
            Ok(Err(e)) => {
                tracing::error!("Profile lookup for subject {} failed: {:?}", subject, e);
                RoleLookup::Failed(e.to_string())
            }
            Err(_) => {
                tracing::error!(
                    "Profile lookup for subject {} timed out after {:?}",
                    subject,
                    self.timeout
                );
                RoleLookup::Failed(format!("timed out after {:?}", self.timeout))
            }
        }
    }
}

/// Validate a stored document as the profile of `subject`.
///
/// The document key is the subject; a stored `id` is optional but must agree
/// with it when present.
pub fn parse_profile(subject: &str, mut document: Value) -> Result<Profile, String> {
    let fields = document
        .as_object_mut()
        .ok_or_else(|| "document is not an object".to_string())?;

    let missing_id = match fields.get("id") {
        None | Some(Value::Null) => true,
        Some(Value::String(id)) if id == subject => false,
        Some(other) => return Err(format!("stored id {} does not match document key", other)),
    };
    if missing_id {
        fields.insert("id".to_string(), Value::String(subject.to_string()));
    }

    if matches!(fields.get("role"), None | Some(Value::Null)) {
        return Err("role is missing".to_string());
    }

    serde_json::from_value(document).map_err(|e| e.to_string())
}
