//! Capabilities the access core consumes. Implementations are injected as
//! `Arc<dyn ...>` so tests and the HTTP layer can supply their own.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::watch;

use super::model::SessionState;

/// Collection holding one profile document per subject.
pub const USERS_COLLECTION: &str = "users";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // Request sessions sign out in memory and cannot fail; providers with a
    // remote sign-out report through this.
    #[allow(dead_code)]
    #[error("Sign-out failed: {0}")]
    SignOut(String),
}

#[async_trait]
pub trait AuthCollaborator: Send + Sync {
    /// Current session plus every later change. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> watch::Receiver<SessionState>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document {collection}/{id} is not a JSON object")]
    NotAnObject { collection: String, id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole document.
    Replace,
    /// Top-level JSON merge-patch: keys overwrite, `null` removes the key.
    /// Creates the document when it does not exist.
    Merge,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Only documents whose top-level string field equals the value.
    pub field_equals: Option<(String, String)>,
    pub offset: i64,
    pub limit: i64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Page of documents ordered by id, plus the total matching count.
    async fn list_documents(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<(Vec<Value>, i64), StoreError>;

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    /// Returns whether a document was removed.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

/// Non-adding navigation (history replace).
pub trait Navigator: Send + Sync {
    fn replace(&self, path: &str);
}

/// Navigator that remembers the current location and drops requests to move
/// where it already is. Several guards can share one instance; whichever
/// decision lands last determines the location.
#[derive(Debug, Default)]
pub struct LocationTracker {
    state: Mutex<LocationState>,
}

#[derive(Debug, Default)]
struct LocationState {
    current: Option<String>,
    #[cfg(test)]
    history: Vec<String>,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn at(path: &str) -> Self {
        Self {
            state: Mutex::new(LocationState {
                current: Some(path.to_string()),
                history: Vec::new(),
            }),
        }
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<String> {
        self.lock().current.clone()
    }

    /// Navigations actually performed, oldest first.
    #[cfg(test)]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocationState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Navigator for LocationTracker {
    fn replace(&self, path: &str) {
        let mut state = self.lock();
        if state.current.as_deref() == Some(path) {
            tracing::debug!("Already at {}, skipping navigation", path);
            return;
        }
        tracing::debug!("Replacing location with {}", path);
        state.current = Some(path.to_string());
        #[cfg(test)]
        state.history.push(path.to_string());
    }
}
