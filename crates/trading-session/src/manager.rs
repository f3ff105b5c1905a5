//! Session creation and retrieval.

use alloy_primitives::Address;
use litlayer_core::config::{Config, SessionConfig};
use litlayer_core::signing::{AgentMessage, Eip712Domain, Environment, Types};
use litlayer_core::types::SessionRecord;
use litlayer_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::lifecycle::{create_signed_session, SessionState};
use crate::store::SessionStore;

/// Parse a wallet or agent address.
///
/// Lowercase and uppercase hex are accepted as-is; mixed case must carry a
/// valid EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address> {
    let input = input.trim();
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    let mixed_case = digits.bytes().any(|b| b.is_ascii_lowercase())
        && digits.bytes().any(|b| b.is_ascii_uppercase());

    if mixed_case {
        Address::parse_checksummed(format!("0x{digits}"), None)
            .map_err(|e| Error::InvalidAddress(format!("{input}: {e}")))
    } else {
        digits
            .parse::<Address>()
            .map_err(|e| Error::InvalidAddress(format!("{input}: {e}")))
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Creates, signs and stores trading sessions.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    domain: Eip712Domain,
    types: Types,
    config: SessionConfig,
}

impl SessionManager {
    /// Manager using the standard `Agent` schema.
    pub fn new(store: Arc<dyn SessionStore>, domain: Eip712Domain, config: SessionConfig) -> Self {
        Self {
            store,
            domain,
            types: AgentMessage::types(),
            config,
        }
    }

    pub fn from_config(store: Arc<dyn SessionStore>, config: &Config) -> Self {
        Self::new(store, config.domain.clone(), config.session.clone())
    }

    /// Replace the type schema (deployments may declare their own).
    pub fn with_types(mut self, types: Types) -> Self {
        self.types = types;
        self
    }

    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session with the configured platform and environment.
    pub fn create_default_session(&self, wallet: Address, agent: Address) -> Result<SessionRecord> {
        self.create_session(
            wallet,
            agent,
            &self.config.platform,
            self.config.environment,
        )
    }

    /// Create a signed session expiring one validity window from now.
    ///
    /// Nothing is stored; call [`SessionManager::persist`] to keep it.
    pub fn create_session(
        &self,
        wallet: Address,
        agent: Address,
        platform: &str,
        environment: Environment,
    ) -> Result<SessionRecord> {
        self.create_session_at(unix_now(), wallet, agent, platform, environment)
    }

    /// Create a signed session relative to an explicit clock value.
    pub fn create_session_at(
        &self,
        now: u64,
        wallet: Address,
        agent: Address,
        platform: &str,
        environment: Environment,
    ) -> Result<SessionRecord> {
        let message = AgentMessage::expiring_after(
            environment,
            agent,
            platform,
            now,
            self.config.validity_secs,
        )?;
        let expiry_time = message.expiry_time;

        let record = create_signed_session(
            self.domain.clone(),
            self.types.clone(),
            message,
            wallet,
            now,
        )?;

        info!(
            session_id = %record.session_id,
            wallet = %wallet,
            agent = %agent,
            expiry_time,
            "Trading session created"
        );
        Ok(record)
    }

    /// Save a record under its wallet and session id.
    pub async fn persist(&self, record: &SessionRecord) -> Result<()> {
        self.store
            .save(record.wallet_address, &record.session_id, record)
            .await?;
        debug!(state = %SessionState::Persisted, session_id = %record.session_id, "Session stage");
        info!(
            session_id = %record.session_id,
            wallet = %record.wallet_address,
            "Trading session persisted"
        );
        Ok(())
    }

    pub async fn load(&self, wallet: Address, session_id: &str) -> Result<Option<SessionRecord>> {
        self.store.load(wallet, session_id).await
    }

    /// Load a record that is still usable at `now`.
    ///
    /// Expired records are reported as [`Error::SessionExpired`] rather than
    /// returned.
    pub async fn load_active(
        &self,
        wallet: Address,
        session_id: &str,
        now: u64,
    ) -> Result<Option<SessionRecord>> {
        let Some(record) = self.store.load(wallet, session_id).await? else {
            return Ok(None);
        };

        let expiry_time = record.expiry_time()?;
        if expiry_time <= now {
            debug!(session_id = %record.session_id, expiry_time, "Session expired");
            return Err(Error::SessionExpired {
                session_id: record.session_id,
                expiry_time,
            });
        }
        Ok(Some(record))
    }

    pub async fn delete(&self, wallet: Address, session_id: &str) -> Result<()> {
        self.store.delete(wallet, session_id).await?;
        info!(session_id = %session_id, wallet = %wallet, "Trading session deleted");
        Ok(())
    }

    pub async fn list_sessions(&self, wallet: Address) -> Result<Vec<String>> {
        self.store.list(wallet).await
    }
}
