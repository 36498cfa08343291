//! Fakes for the collaborators the access core and the user service depend on.

use async_trait::async_trait;
use axum::{extract::Request, middleware::Next, response::Response, Router};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::features::access::collaborators::{
    AuthCollaborator, AuthError, DocumentStore, ListQuery, StoreError, WriteMode,
};
use crate::features::access::model::{Profile, Role, SessionState};

pub fn test_profile(subject: &str, role: Role) -> Profile {
    Profile {
        id: subject.to_string(),
        name: Name().fake(),
        email: SafeEmail().fake(),
        role,
        avatar_url: None,
        last_login_at: None,
    }
}

pub fn profile_document(subject: &str, role: Role) -> Value {
    json!({
        "id": subject,
        "name": Name().fake::<String>(),
        "email": SafeEmail().fake::<String>(),
        "role": role,
    })
}

/// Auth provider whose session the test sets directly. Signing out moves the
/// session to `Absent`.
pub struct FakeAuth {
    tx: watch::Sender<SessionState>,
    sign_outs: AtomicUsize,
}

impl FakeAuth {
    pub fn new(session: SessionState) -> Self {
        let (tx, _) = watch::channel(session);
        Self {
            tx,
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, session: SessionState) {
        self.tx.send_replace(session);
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthCollaborator for FakeAuth {
    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(SessionState::Absent);
        Ok(())
    }
}

/// Document store kept in memory, with the same merge and listing semantics
/// as the Postgres store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<(String, String), Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), data);
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.documents
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get(collection, id))
    }

    async fn list_documents(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<(Vec<Value>, i64), StoreError> {
        let documents = self.documents.lock().unwrap();
        let matching: Vec<Value> = documents
            .iter()
            .filter(|((c, _), _)| c == collection)
            .filter(|(_, data)| match &query.field_equals {
                Some((field, value)) => data.get(field).and_then(Value::as_str) == Some(value.as_str()),
                None => true,
            })
            .map(|(_, data)| data.clone())
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let Value::Object(patch) = data else {
            return Err(StoreError::NotAnObject {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };

        let mut documents = self.documents.lock().unwrap();
        let key = (collection.to_string(), id.to_string());
        let mut merged = match (mode, documents.get(&key)) {
            (WriteMode::Merge, Some(Value::Object(existing))) => existing.clone(),
            _ => Map::new(),
        };
        for (field, value) in patch {
            if value.is_null() && mode == WriteMode::Merge {
                merged.remove(&field);
            } else {
                merged.insert(field, value);
            }
        }
        documents.insert(key, Value::Object(merged));
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .remove(&(collection.to_string(), id.to_string()))
            .is_some())
    }
}

/// Store that fails every call.
pub struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn get_document(&self, _: &str, _: &str) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn list_documents(&self, _: &str, _: &ListQuery) -> Result<(Vec<Value>, i64), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn set_document(&self, _: &str, _: &str, _: Value, _: WriteMode) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn delete_document(&self, _: &str, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

/// Store whose reads never complete.
pub struct StalledStore;

#[async_trait]
impl DocumentStore for StalledStore {
    async fn get_document(&self, _: &str, _: &str) -> Result<Option<Value>, StoreError> {
        std::future::pending().await
    }

    async fn list_documents(&self, _: &str, _: &ListQuery) -> Result<(Vec<Value>, i64), StoreError> {
        std::future::pending().await
    }

    async fn set_document(&self, _: &str, _: &str, _: Value, _: WriteMode) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn delete_document(&self, _: &str, _: &str) -> Result<bool, StoreError> {
        std::future::pending().await
    }
}

/// Wraps a store and parks each read of a document until the test releases
/// that document id, so tests can choose the order lookups complete in.
pub struct GatedStore {
    inner: Arc<dyn DocumentStore>,
    reads: watch::Sender<usize>,
    released: watch::Sender<HashSet<String>>,
}

impl GatedStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        let (reads, _) = watch::channel(0);
        let (released, _) = watch::channel(HashSet::new());
        Self {
            inner,
            reads,
            released,
        }
    }

    /// Wait until at least `count` reads have reached the gate.
    pub async fn wait_for_reads(&self, count: usize) {
        let mut rx = self.reads.subscribe();
        let _ = rx.wait_for(|reads| *reads >= count).await;
    }

    pub fn release(&self, id: &str) {
        self.released.send_modify(|ids| {
            ids.insert(id.to_string());
        });
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let mut released = self.released.subscribe();
        self.reads.send_modify(|reads| *reads += 1);
        let _ = released.wait_for(|ids| ids.contains(id)).await;
        self.inner.get_document(collection, id).await
    }

    async fn list_documents(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<(Vec<Value>, i64), StoreError> {
        self.inner.list_documents(collection, query).await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        self.inner.set_document(collection, id, data, mode).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_document(collection, id).await
    }
}

async fn inject_session(
    axum::extract::State(session): axum::extract::State<SessionState>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(session);
    next.run(request).await
}

/// Run every request of `router` as `session`, bypassing bearer tokens.
pub fn with_session(router: Router, session: SessionState) -> Router {
    router.layer(axum::middleware::from_fn_with_state(session, inject_session))
}

pub fn signed_in(subject: &str) -> SessionState {
    SessionState::Present(subject.to_string())
}
