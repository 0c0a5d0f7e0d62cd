use crate::domain::ports::HistoryStore;
use crate::domain::transaction::{HistoryDocument, InternalId};
use crate::error::{MerchantError, Result};
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

/// Replaces `path` with `bytes` through a uniquely named temp file in the
/// same directory, so concurrent writers never share a temp path and readers
/// never see half a file.
pub(crate) async fn write_atomically(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).await?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&target)?;
        Ok(())
    })
    .await
    .map_err(|e| MerchantError::StorageError(Box::new(e)))??;
    Ok(())
}

/// Stores one JSON file per transaction under a data root.
///
/// Files are sharded by the first two characters of the internal id:
/// `<root>/ab/abcdef....json`. This keeps any single directory small even
/// with a large number of transactions.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    root: PathBuf,
}

impl FileHistoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, id: &InternalId) -> PathBuf {
        self.root
            .join(id.shard())
            .join(format!("{}.json", id.as_str()))
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn read(&self, id: &InternalId) -> Result<Option<HistoryDocument>> {
        let path = self.path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let document = serde_json::from_slice::<HistoryDocument>(&bytes).map_err(|source| {
            MerchantError::CorruptData {
                location: path.display().to_string(),
                source,
            }
        })?;
        Ok(Some(document))
    }

    async fn write(&self, id: &InternalId, document: &HistoryDocument) -> Result<()> {
        let path = self.path(id);
        let bytes = serde_json::to_vec(document)?;
        write_atomically(&path, bytes).await?;

        debug!(internal_id = %id, path = %path.display(), "history written");
        Ok(())
    }

    fn location(&self, id: &InternalId) -> String {
        self.path(id).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::tempdir;

    fn id(raw: &str) -> InternalId {
        InternalId::parse(raw).unwrap()
    }

    #[test]
    fn test_path_is_sharded_by_first_two_chars() {
        let store = FileHistoryStore::new("/var/data/merchant");
        let path = store.path(&id("abc123"));
        assert_eq!(path, PathBuf::from("/var/data/merchant/ab/abc123.json"));
        assert_eq!(
            path.parent().unwrap().file_name().unwrap().to_str(),
            Some("ab")
        );
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        assert!(store.read(&id("zz9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_creates_shard_and_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path().join("nested"));
        let doc = json!({"status": "paid", "amount": "10.00", "items": [1, 2]})
            .as_object()
            .cloned()
            .unwrap();

        store.write(&id("abc123"), &doc).await.unwrap();

        assert!(dir.path().join("nested/ab/abc123.json").is_file());
        let shard: Vec<_> = std::fs::read_dir(dir.path().join("nested/ab"))
            .unwrap()
            .collect();
        assert_eq!(shard.len(), 1, "no temp files are left behind");
        let back = store.read(&id("abc123")).await.unwrap().unwrap();
        assert_eq!(back, doc);
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let dir = tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let first = json!({"a": 1}).as_object().cloned().unwrap();
        let second = json!({"b": 2}).as_object().cloned().unwrap();

        store.write(&id("abc123"), &first).await.unwrap();
        store.write(&id("abc123"), &second).await.unwrap();

        let back = store.read(&id("abc123")).await.unwrap().unwrap();
        assert_eq!(Value::Object(back), json!({"b": 2}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_one_id_all_succeed() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(FileHistoryStore::new(dir.path()));

        for round in 0..20 {
            let handles: Vec<_> = (0..8)
                .map(|writer| {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let doc = json!({"round": round, "writer": writer})
                            .as_object()
                            .cloned()
                            .unwrap();
                        store.write(&id("abc123"), &doc).await
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let back = store.read(&id("abc123")).await.unwrap().unwrap();
            assert_eq!(back["round"], round);
        }

        let shard: Vec<_> = std::fs::read_dir(dir.path().join("ab")).unwrap().collect();
        assert_eq!(shard.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let target = store.path(&id("abc123"));
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();

        std::fs::write(&target, b"{not json").unwrap();
        let err = store.read(&id("abc123")).await.unwrap_err();
        assert!(matches!(err, MerchantError::CorruptData { .. }));

        // Valid JSON that is not an object is corrupt too.
        std::fs::write(&target, b"[1, 2, 3]").unwrap();
        let err = store.read(&id("abc123")).await.unwrap_err();
        assert!(matches!(err, MerchantError::CorruptData { .. }));
    }

    #[tokio::test]
    async fn test_unwritable_root_surfaces_io_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = FileHistoryStore::new(&blocker);

        let doc = HistoryDocument::new();
        let err = store.write(&id("abc123"), &doc).await.unwrap_err();
        assert!(matches!(err, MerchantError::IoError(_)));
    }
}
