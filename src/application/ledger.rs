use crate::domain::ports::HistoryStoreBox;
use crate::domain::transaction::{HistoryDocument, InternalId, merge};
use crate::error::{MerchantError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Per-transaction JSON history on top of a [`HistoryStore`](crate::domain::ports::HistoryStore).
///
/// `update` is a read-merge-write. Within one `HistoryLedger` updates to the
/// same id are serialized, so two callbacks racing for one transaction both
/// land. Separate processes sharing a store are not coordinated.
pub struct HistoryLedger {
    store: HistoryStoreBox,
    locks: Mutex<HashMap<InternalId, KeyLock>>,
}

impl HistoryLedger {
    pub fn new(store: HistoryStoreBox) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the stored document, or an empty one if nothing was written yet.
    pub async fn read(&self, id: &InternalId) -> Result<HistoryDocument> {
        Ok(self.store.read(id).await?.unwrap_or_default())
    }

    /// Replaces the stored document. Waits for any in-flight `update` of the same id.
    pub async fn write(&self, id: &InternalId, document: &HistoryDocument) -> Result<()> {
        let lock = self.acquire(id);
        let result = async {
            let _guard = lock.lock().await;
            self.store.write(id, document).await
        }
        .await;
        self.release(id, lock);
        result
    }

    /// Merges `partial` into the stored document and returns the result.
    pub async fn update(&self, id: &InternalId, partial: HistoryDocument) -> Result<HistoryDocument> {
        let lock = self.acquire(id);
        let result = async {
            let _guard = lock.lock().await;
            let mut document = self.read(id).await?;
            merge(&mut document, partial);
            self.store.write(id, &document).await?;
            Ok::<_, MerchantError>(document)
        }
        .await;
        self.release(id, lock);

        if result.is_ok() {
            debug!(internal_id = %id, "history updated");
        }
        result
    }

    pub fn location(&self, id: &InternalId) -> String {
        self.store.location(id)
    }

    fn acquire(&self, id: &InternalId) -> KeyLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id.clone()).or_default().clone()
    }

    fn release(&self, id: &InternalId, lock: KeyLock) {
        drop(lock);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = locks.get(id)
            && Arc::strong_count(entry) == 1
        {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
