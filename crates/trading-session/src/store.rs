//! Session storage contract and the in-memory backend.

use alloy_primitives::Address;
use async_trait::async_trait;
use litlayer_core::types::SessionRecord;
use litlayer_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Longest session id accepted by the stores.
const MAX_SESSION_ID_LEN: usize = 128;

/// Durable home for session records, keyed by `(wallet, session_id)`.
///
/// Absent records are `Ok(None)`, never an error. Implementations
/// serialize operations on the same key; distinct keys are independent.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write the full record, replacing whatever was stored at the key.
    async fn save(&self, wallet: Address, session_id: &str, record: &SessionRecord) -> Result<()>;

    /// Read the record at the key, if any.
    async fn load(&self, wallet: Address, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Remove the record at the key. Removing an absent key succeeds.
    async fn delete(&self, wallet: Address, session_id: &str) -> Result<()>;

    /// Session ids stored for a wallet, sorted.
    async fn list(&self, wallet: Address) -> Result<Vec<String>>;
}

/// Validate a session id and return its canonical (lowercase) form.
///
/// Ids are hex strings; anything else could escape the storage directory.
pub fn normalize_session_id(session_id: &str) -> Result<String> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id.bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(Error::InvalidSessionId(session_id.to_string()));
    }
    Ok(session_id.to_ascii_lowercase())
}

/// Canonical wallet key: 0x-prefixed lowercase hex.
pub fn wallet_key(wallet: &Address) -> String {
    format!("0x{}", hex::encode(wallet))
}

/// In-memory session store (testing and ephemeral use).
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<HashMap<(Address, String), SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all wallets.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, wallet: Address, session_id: &str, record: &SessionRecord) -> Result<()> {
        let session_id = normalize_session_id(session_id)?;
        let mut records = self.records.write().await;
        records.insert((wallet, session_id), record.clone());
        debug!(wallet = %wallet, "Session stored in memory");
        Ok(())
    }

    async fn load(&self, wallet: Address, session_id: &str) -> Result<Option<SessionRecord>> {
        let session_id = normalize_session_id(session_id)?;
        let records = self.records.read().await;
        Ok(records.get(&(wallet, session_id)).cloned())
    }

    async fn delete(&self, wallet: Address, session_id: &str) -> Result<()> {
        let session_id = normalize_session_id(session_id)?;
        let mut records = self.records.write().await;
        records.remove(&(wallet, session_id));
        Ok(())
    }

    async fn list(&self, wallet: Address) -> Result<Vec<String>> {
        let records = self.records.read().await;
        let mut ids: Vec<String> = records
            .keys()
            .filter(|(owner, _)| *owner == wallet)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
