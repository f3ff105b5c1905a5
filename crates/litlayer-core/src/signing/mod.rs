//! EIP-712 signing for LitLayer agent registration.
//!
//! # Architecture
//!
//! ```text
//! TradingKey ──────────────┐
//!                          ▼
//! AgentMessage ─► TypedData ─► digest ─► sign_digest ─► Signature
//!                    ▲                                     │
//! Eip712Domain ──────┘                                     ▼
//!                                              recover_address / verify
//! ```
//!
//! # Example
//!
//! ```ignore
//! use litlayer_core::signing::{AgentMessage, Eip712Domain, Environment, TradingKey, AGENT_TYPE};
//!
//! let key = TradingKey::generate()?;
//! let message = AgentMessage::expiring_after(Environment::Devnet, agent, "turbox", now, 86_400)?;
//! let data = message.to_typed_data(Eip712Domain::litlayer(), AgentMessage::types())?;
//! let (digest, signature) = litlayer_core::signing::sign_typed_data(&data, AGENT_TYPE, &key)?;
//! assert!(litlayer_core::signing::verify(&digest, &signature, key.address())?);
//! ```

pub mod agent;
pub mod domain;
pub mod keys;
pub mod signature;
pub mod signer;
pub mod typed_data;

pub use agent::{AgentMessage, AGENT_TYPE, DEFAULT_PLATFORM, DEFAULT_VALIDITY_SECS};

pub use domain::{
    Eip712Domain, Environment, ARBITRUM_CHAIN_ID, EIP712_DOMAIN_TYPE, LITLAYER_DOMAIN_NAME,
    LITLAYER_DOMAIN_VERSION,
};

pub use keys::TradingKey;

pub use signature::{Signature, SIGNATURE_LENGTH};

pub use signer::{recover_address, sign_digest, sign_typed_data, verify};

pub use typed_data::{
    encode_data, encode_type, encode_value, hash_struct, type_hash, typed_data_hash,
    Eip712Field, TypedData, Types,
};
