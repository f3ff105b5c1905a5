//! Configuration management for LitLayer trading sessions.

use crate::signing::{Eip712Domain, Environment, DEFAULT_PLATFORM, DEFAULT_VALIDITY_SECS};
use crate::{Error, Result};
use alloy_primitives::{Address, B256};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub domain: Eip712Domain,
    pub session: SessionConfig,
    pub storage: StorageConfig,
}

/// Defaults applied to newly created sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Platform identifier placed in the agent message.
    pub platform: String,
    /// Environment tag placed in the agent message.
    pub environment: Environment,
    /// Seconds between creation and expiry.
    pub validity_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            platform: DEFAULT_PLATFORM.to_string(),
            environment: Environment::Devnet,
            validity_secs: DEFAULT_VALIDITY_SECS,
        }
    }
}

/// Location and limits of the session store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one file per session.
    pub dir: PathBuf,
    /// Upper bound on a single storage operation.
    pub timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".keys"),
            timeout: Duration::from_millis(5_000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset variables fall back to the LitLayer deployment defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let domain = Eip712Domain {
            name: lookup("LITLAYER_DOMAIN_NAME").unwrap_or(defaults.domain.name),
            version: lookup("LITLAYER_DOMAIN_VERSION").unwrap_or(defaults.domain.version),
            chain_id: parse_var(&lookup, "LITLAYER_CHAIN_ID")?.unwrap_or(defaults.domain.chain_id),
            verifying_contract: parse_var::<Address, _>(&lookup, "LITLAYER_VERIFYING_CONTRACT")?
                .unwrap_or(defaults.domain.verifying_contract),
            salt: parse_var::<B256, _>(&lookup, "LITLAYER_DOMAIN_SALT")?
                .unwrap_or(defaults.domain.salt),
        };

        let session = SessionConfig {
            platform: lookup("LITLAYER_PLATFORM").unwrap_or(defaults.session.platform),
            environment: parse_var(&lookup, "LITLAYER_ENVIRONMENT")?
                .unwrap_or(defaults.session.environment),
            validity_secs: parse_var(&lookup, "SESSION_VALIDITY_SECS")?
                .unwrap_or(defaults.session.validity_secs),
        };
        if session.validity_secs == 0 {
            return Err(Error::Config {
                message: "SESSION_VALIDITY_SECS must be greater than zero".to_string(),
            });
        }

        let storage = StorageConfig {
            dir: lookup("SESSION_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.dir),
            timeout: parse_var::<u64, _>(&lookup, "SESSION_STORE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.storage.timeout),
        };

        Ok(Self {
            domain,
            session,
            storage,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| Error::Config {
            message: format!("{key}={raw:?} is invalid: {e}"),
        }),
        None => Ok(None),
    }
}
