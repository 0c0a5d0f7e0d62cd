use crate::domain::ports::{HistoryStore, SessionStore};
use crate::domain::transaction::{HistoryDocument, InternalId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A thread-safe in-memory history store.
///
/// Uses `Arc<RwLock<HashMap<InternalId, HistoryDocument>>>` to allow shared concurrent access.
/// Suitable for tests and single-process deployments that do not need to survive restarts.
#[derive(Default, Clone)]
pub struct InMemoryHistoryStore {
    documents: Arc<RwLock<HashMap<InternalId, HistoryDocument>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn read(&self, id: &InternalId) -> Result<Option<HistoryDocument>> {
        let documents = self.documents.read().await;
        Ok(documents.get(id).cloned())
    }

    async fn write(&self, id: &InternalId, document: &HistoryDocument) -> Result<()> {
        let mut documents = self.documents.write().await;
        documents.insert(id.clone(), document.clone());
        Ok(())
    }

    fn location(&self, id: &InternalId) -> String {
        format!("memory:{id}")
    }
}

struct SessionValue {
    value: String,
    expires_at: Option<Instant>,
}

impl SessionValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Session-scoped values held in memory, keyed by `(session, key)`.
///
/// Expired values are dropped when they are taken and swept on every `put`,
/// so abandoned checkouts do not pile up. Values without a TTL stay until taken.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    values: Arc<RwLock<HashMap<(String, String), SessionValue>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(
        &self,
        session: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let now = Instant::now();
        let mut values = self.values.write().await;
        values.retain(|_, entry| !entry.is_expired(now));
        values.insert(
            (session.to_string(), key.to_string()),
            SessionValue {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        Ok(())
    }

    async fn take(&self, session: &str, key: &str) -> Result<Option<String>> {
        let mut values = self.values.write().await;
        let Some(entry) = values.remove(&(session.to_string(), key.to_string())) else {
            return Ok(None);
        };
        if entry.is_expired(Instant::now()) {
            return Ok(None);
        }
        Ok(Some(entry.value))
    }
}
