//! File-backed session store.
//!
//! Each record is one pretty-printed JSON file named
//! `<wallet>_<session_id>.key` inside the store directory, wallet in
//! lowercase hex. Files written under the checksummed wallet spelling are
//! still found by `load`, `list` and `delete`. Writes land in a temp file that
//! is renamed into place, so a reader never sees a half-written record.

use alloy_primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use litlayer_core::config::StorageConfig;
use litlayer_core::types::SessionRecord;
use litlayer_core::{Error, Result};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::{normalize_session_id, wallet_key, SessionStore};

const RECORD_EXTENSION: &str = "key";
const TEMP_EXTENSION: &str = "key.tmp";

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// A key's entry in the lock map, removed on drop once no other caller
/// shares it.
struct KeyLock<'a> {
    locks: &'a LockMap,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl KeyLock<'_> {
    fn mutex(&self) -> &Mutex<()> {
        &self.lock
    }
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        // One reference in the map, one here
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 2);
    }
}

/// Temp file removed on drop unless the rename into place completed.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed unfinished temp record"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove temp record"
            ),
        }
    }
}

/// Session store persisting one JSON file per session.
pub struct FileSessionStore {
    dir: PathBuf,
    timeout: Duration,
    /// Per-key locks; distinct keys never contend.
    locks: LockMap,
}

impl FileSessionStore {
    /// Open (creating if needed) the store directory described by `config`.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir).await?;
        info!(dir = %config.dir.display(), "Session store opened");
        Ok(Self {
            dir: config.dir.clone(),
            timeout: config.timeout,
            locks: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn record_key(wallet: &Address, session_id: &str) -> String {
        format!("{}_{}", wallet_key(wallet), session_id)
    }

    /// Key under the EIP-55 spelling of the wallet.
    fn checksummed_record_key(wallet: &Address, session_id: &str) -> String {
        format!("{}_{}", wallet.to_checksum(None), session_id)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    fn lock_key(&self, key: &str) -> KeyLock<'_> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        KeyLock {
            locks: &self.locks,
            key: key.to_string(),
            lock,
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Session store operation timed out"
                );
                Err(Error::StorageTimeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let temp = TempFile::new(path.with_extension(TEMP_EXTENSION));

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Records hold private keys
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(temp.path()).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(temp.path(), path).await?;
        temp.disarm();
        Ok(())
    }

    /// Read the first of `paths` that exists.
    async fn read_first(paths: &[PathBuf]) -> Result<Option<(Vec<u8>, &Path)>> {
        for path in paths {
            match fs::read(path).await {
                Ok(bytes) => return Ok(Some((bytes, path.as_path()))),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Remove every one of `paths` that exists, reporting whether any did.
    async fn remove_all(paths: &[PathBuf]) -> Result<bool> {
        let mut removed = false;
        for path in paths {
            match fs::remove_file(path).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// Canonical path first, then the checksummed spelling.
    fn candidate_paths(&self, wallet: &Address, session_id: &str) -> Vec<PathBuf> {
        let canonical = self.record_path(&Self::record_key(wallet, session_id));
        let checksummed = self.record_path(&Self::checksummed_record_key(wallet, session_id));
        if checksummed == canonical {
            vec![canonical]
        } else {
            vec![canonical, checksummed]
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, wallet: Address, session_id: &str, record: &SessionRecord) -> Result<()> {
        let session_id = normalize_session_id(session_id)?;
        let key = Self::record_key(&wallet, &session_id);
        let path = self.record_path(&key);
        let contents = serde_json::to_vec_pretty(record)?;
        let lock = self.lock_key(&key);

        self.bounded("save", async {
            let _guard = lock.mutex().lock().await;
            Self::write_atomic(&path, &contents).await
        })
        .await?;

        debug!(wallet = %wallet, session_id = %session_id, "Session record written");
        Ok(())
    }

    async fn load(&self, wallet: Address, session_id: &str) -> Result<Option<SessionRecord>> {
        let session_id = normalize_session_id(session_id)?;
        let key = Self::record_key(&wallet, &session_id);
        let paths = self.candidate_paths(&wallet, &session_id);
        let lock = self.lock_key(&key);

        self.bounded("load", async {
            let _guard = lock.mutex().lock().await;
            let Some((bytes, path)) = Self::read_first(&paths).await? else {
                return Ok(None);
            };

            match serde_json::from_slice(&bytes) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Corrupt session record"
                    );
                    Err(Error::Record(e))
                }
            }
        })
        .await
    }

    async fn delete(&self, wallet: Address, session_id: &str) -> Result<()> {
        let session_id = normalize_session_id(session_id)?;
        let key = Self::record_key(&wallet, &session_id);
        let paths = self.candidate_paths(&wallet, &session_id);
        let lock = self.lock_key(&key);

        let removed = self
            .bounded("delete", async {
                let _guard = lock.mutex().lock().await;
                Self::remove_all(&paths).await
            })
            .await?;

        if removed {
            debug!(wallet = %wallet, session_id = %session_id, "Session record removed");
        }
        Ok(())
    }

    async fn list(&self, wallet: Address) -> Result<Vec<String>> {
        let prefixes = [
            format!("{}_", wallet_key(&wallet)),
            format!("{}_", wallet.to_checksum(None)),
        ];
        let suffix = format!(".{RECORD_EXTENSION}");

        self.bounded("list", async {
            let mut entries = match fs::read_dir(&self.dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };

            let mut ids = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                let Some(id) = prefixes
                    .iter()
                    .find_map(|prefix| name.strip_prefix(prefix.as_str()))
                    .and_then(|rest| rest.strip_suffix(&suffix))
                else {
                    continue;
                };
                if let Ok(id) = normalize_session_id(id) {
                    ids.push(id);
                }
            }
            ids.sort();
            ids.dedup();
            Ok(ids)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::{record, WALLET};
    use tempfile::TempDir;

    fn wallet() -> Address {
        WALLET.parse().unwrap()
    }

    async fn open_store(dir: &TempDir) -> FileSessionStore {
        let config = StorageConfig {
            dir: dir.path().join("keys"),
            timeout: Duration::from_secs(5),
        };
        FileSessionStore::open(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let saved = record("aa01");

        store.save(wallet(), "aa01", &saved).await.unwrap();

        assert_eq!(store.load(wallet(), "aa01").await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let saved = record("aa01");

        store.save(wallet(), "aa01", &saved).await.unwrap();

        let path = store
            .dir()
            .join(format!("{}_aa01.key", WALLET.to_lowercase()));
        let contents = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(json["session_id"], "aa01");
        assert_eq!(json["trading_key"], saved.trading_key.as_str());

        // No temp file left behind
        let names: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_record_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        store.save(wallet(), "aa01", &record("aa01")).await.unwrap();

        let path = store
            .dir()
            .join(format!("{}_aa01.key", WALLET.to_lowercase()));
        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert_eq!(store.load(wallet(), "beef").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let second = record("aa01");

        store.save(wallet(), "aa01", &record("aa01")).await.unwrap();
        store.save(wallet(), "aa01", &second).await.unwrap();

        assert_eq!(store.load(wallet(), "aa01").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        store.save(wallet(), "aa01", &record("aa01")).await.unwrap();

        tokio_test::assert_ok!(store.delete(wallet(), "aa01").await);
        tokio_test::assert_ok!(store.delete(wallet(), "aa01").await);
        assert!(store.locks.is_empty());

        assert_eq!(store.load(wallet(), "aa01").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let path = store
            .dir()
            .join(format!("{}_aa01.key", WALLET.to_lowercase()));
        std::fs::write(&path, b"{ not json").unwrap();

        let result = store.load(wallet(), "aa01").await;
        assert!(matches!(result, Err(Error::Record(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let result = store.save(wallet(), "../../escape", &record("aa01")).await;
        assert!(matches!(result, Err(Error::InvalidSessionId(_))));
        let result = store.load(wallet(), "").await;
        assert!(matches!(result, Err(Error::InvalidSessionId(_))));
    }

    #[tokio::test]
    async fn test_list_ignores_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let other = Address::repeat_byte(0x11);

        store.save(wallet(), "bb02", &record("bb02")).await.unwrap();
        store.save(wallet(), "aa01", &record("aa01")).await.unwrap();
        store.save(other, "cc03", &record("cc03")).await.unwrap();
        std::fs::write(store.dir().join("notes.txt"), b"").unwrap();
        std::fs::write(
            store
                .dir()
                .join(format!("{}_dd04.key.tmp", WALLET.to_lowercase())),
            b"",
        )
        .unwrap();

        assert_eq!(store.list(wallet()).await.unwrap(), vec!["aa01", "bb02"]);
        assert_eq!(store.list(other).await.unwrap(), vec!["cc03"]);
    }

    #[tokio::test]
    async fn test_held_lock_times_out() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            dir: dir.path().to_path_buf(),
            timeout: Duration::from_millis(50),
        };
        let store = FileSessionStore::open(&config).await.unwrap();

        let key = FileSessionStore::record_key(&wallet(), "aa01");
        let held = store.lock_key(&key);
        let guard = held.mutex().lock().await;

        let result = store.load(wallet(), "aa01").await;
        assert!(matches!(
            result,
            Err(Error::StorageTimeout { operation: "load", .. })
        ));
        let result = store.save(wallet(), "aa01", &record("aa01")).await;
        assert!(matches!(
            result,
            Err(Error::StorageTimeout { operation: "save", .. })
        ));

        // Other keys are unaffected
        assert_eq!(store.load(wallet(), "bb02").await.unwrap(), None);

        drop(guard);
        drop(held);
        assert!(store.locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_each_operation() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        for i in 0..20 {
            let id = format!("{i:04x}");
            store.save(wallet(), &id, &record(&id)).await.unwrap();
            assert!(store.load(wallet(), &id).await.unwrap().is_some());
        }
        assert!(store.load(wallet(), "beef").await.unwrap().is_none());
        store.delete(wallet(), "0000").await.unwrap();
        assert_eq!(store.list(wallet()).await.unwrap().len(), 19);

        assert!(store.locks.is_empty());
    }

    #[test]
    fn test_temp_file_removed_unless_disarmed() {
        let dir = TempDir::new().unwrap();
        let dropped = dir.path().join("dropped.key.tmp");
        let kept = dir.path().join("kept.key.tmp");
        std::fs::write(&dropped, b"secret").unwrap();
        std::fs::write(&kept, b"secret").unwrap();

        drop(TempFile::new(dropped.clone()));
        TempFile::new(kept.clone()).disarm();

        assert!(!dropped.exists());
        assert!(kept.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        // A non-empty directory in the record's place makes the rename fail
        let path = store
            .dir()
            .join(format!("{}_aa01.key", WALLET.to_lowercase()));
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), b"").unwrap();

        let result = store.save(wallet(), "aa01", &record("aa01")).await;
        assert!(matches!(result, Err(Error::Storage(_))));

        assert!(!path.with_extension(TEMP_EXTENSION).exists());
        assert!(store.locks.is_empty());
    }

    #[tokio::test]
    async fn test_checksummed_file_names_are_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let saved = record("aa01");

        let checksummed = store.dir().join(format!("{WALLET}_aa01.key"));
        assert_ne!(WALLET, WALLET.to_lowercase());
        std::fs::write(&checksummed, serde_json::to_vec_pretty(&saved).unwrap()).unwrap();

        assert_eq!(store.load(wallet(), "aa01").await.unwrap(), Some(saved));
        assert_eq!(store.list(wallet()).await.unwrap(), vec!["aa01"]);

        store.delete(wallet(), "aa01").await.unwrap();
        assert!(!checksummed.exists());
        assert_eq!(store.load(wallet(), "aa01").await.unwrap(), None);
        assert!(store.list(wallet()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers_same_key() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&dir).await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let saved = record("aa01");
                store.save(wallet(), "aa01", &saved).await.unwrap();
                saved
            }));
        }

        let mut written = Vec::new();
        for handle in handles {
            written.push(handle.await.unwrap());
        }

        let loaded = store.load(wallet(), "aa01").await.unwrap().unwrap();
        assert!(written.contains(&loaded));
    }
}
