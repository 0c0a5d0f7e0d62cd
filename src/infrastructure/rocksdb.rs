use crate::domain::ports::HistoryStore;
use crate::domain::transaction::{HistoryDocument, InternalId};
use crate::error::{MerchantError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Column Family holding one JSON history document per internal id.
pub const CF_HISTORY: &str = "history";

/// A persistent history store implementation using RocksDB.
///
/// Documents are stored as JSON bytes keyed by the internal id. No sharding
/// is needed since RocksDB does not keep one file per key.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBHistoryStore {
    db: Arc<DB>,
    path: PathBuf,
}

impl RocksDBHistoryStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// the `history` column family when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_history = ColumnFamilyDescriptor::new(CF_HISTORY, Options::default());
        let db = DB::open_cf_descriptors(&opts, path.as_ref(), vec![cf_history])
            .map_err(|e| MerchantError::StorageError(Box::new(e)))?;

        Ok(Self {
            db: Arc::new(db),
            path: path.as_ref().to_path_buf(),
        })
    }

    fn history_cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_HISTORY).ok_or_else(|| {
            MerchantError::StorageError(Box::new(std::io::Error::other(
                "History column family not found",
            )))
        })
    }
}

#[async_trait]
impl HistoryStore for RocksDBHistoryStore {
    async fn read(&self, id: &InternalId) -> Result<Option<HistoryDocument>> {
        let cf = self.history_cf()?;
        let result = self
            .db
            .get_cf(cf, id.as_str().as_bytes())
            .map_err(|e| MerchantError::StorageError(Box::new(e)))?;

        match result {
            Some(bytes) => {
                let document = serde_json::from_slice(&bytes).map_err(|source| {
                    MerchantError::CorruptData {
                        location: self.location(id),
                        source,
                    }
                })?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, id: &InternalId, document: &HistoryDocument) -> Result<()> {
        let cf = self.history_cf()?;
        let value = serde_json::to_vec(document)?;
        self.db
            .put_cf(cf, id.as_str().as_bytes(), value)
            .map_err(|e| MerchantError::StorageError(Box::new(e)))?;
        Ok(())
    }

    fn location(&self, id: &InternalId) -> String {
        format!("{}#{}/{}", self.path.display(), CF_HISTORY, id)
    }
}
