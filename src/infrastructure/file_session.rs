use super::file_ledger::write_atomically;
use crate::domain::ports::SessionStore;
use crate::error::{MerchantError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;

/// Directory under the data root that holds session files.
pub const SESSION_DIR: &str = "sessions";

const MAX_SESSION_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<u64>,
}

impl StoredValue {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|deadline| now_ms >= deadline)
    }
}

type SessionFile = BTreeMap<String, StoredValue>;

/// Session values kept as one JSON file per session, `<root>/<session>.json`.
///
/// Lets separate processes (one CLI call per callback) hand a remembered URL
/// to each other. Expired values are swept whenever a session file is
/// rewritten, and a file is removed once it holds nothing.
#[derive(Debug)]
pub struct FileSessionStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, session: &str) -> Result<PathBuf> {
        let valid = !session.is_empty()
            && session.len() <= MAX_SESSION_LEN
            && session
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(MerchantError::ValidationError(format!(
                "invalid session id '{session}'"
            )));
        }
        Ok(self.root.join(format!("{session}.json")))
    }

    async fn load(&self, path: &Path) -> Result<SessionFile> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SessionFile::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|source| MerchantError::CorruptData {
            location: path.display().to_string(),
            source,
        })
    }

    async fn store(&self, path: &Path, values: &SessionFile) -> Result<()> {
        if values.is_empty() {
            return match fs::remove_file(path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        write_atomically(path, serde_json::to_vec(values)?).await
    }
}

fn now_ms() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn put(
        &self,
        session: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let path = self.path(session)?;
        let _guard = self.lock.lock().await;

        let now = now_ms();
        let mut values = self.load(&path).await?;
        values.retain(|_, stored| !stored.is_expired(now));
        let expires_at_ms = ttl.map(|ttl| {
            now.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
        });
        values.insert(key.to_string(), StoredValue { value, expires_at_ms });
        self.store(&path, &values).await
    }

    async fn take(&self, session: &str, key: &str) -> Result<Option<String>> {
        let path = self.path(session)?;
        let _guard = self.lock.lock().await;

        let now = now_ms();
        let mut values = self.load(&path).await?;
        let Some(taken) = values.remove(key) else {
            return Ok(None);
        };
        values.retain(|_, stored| !stored.is_expired(now));
        self.store(&path, &values).await?;

        if taken.is_expired(now) {
            return Ok(None);
        }
        Ok(Some(taken.value))
    }
}
