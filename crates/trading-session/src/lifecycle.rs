//! Typestate stages of session creation.
//!
//! ```text
//! NewSession ─prepare─► PreparedSession ─sign─► SignedSession ─into_record─► SessionRecord
//! (KeyGenerated)        (MessagePrepared)       (Signed)                     (Persisted once saved)
//! ```
//!
//! Each stage owns the trading key, so a stage can only be reached by
//! completing the one before it.

use alloy_primitives::{Address, B256};
use litlayer_core::signing::{
    recover_address, sign_typed_data, AgentMessage, Eip712Domain, Signature, TradingKey,
    TypedData, Types, AGENT_TYPE,
};
use litlayer_core::types::SessionRecord;
use litlayer_core::{Error, Result};
use rand::Rng;
use std::fmt;
use tracing::debug;

/// Random bytes in a session id.
const SESSION_ID_BYTES: usize = 16;

/// Fresh random session id, lowercase hex.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Run every stage for one agent message under an explicit domain and schema,
/// signing at `now` (unix seconds).
///
/// Returns the record with a fresh session id; nothing is stored.
pub fn create_signed_session(
    domain: Eip712Domain,
    types: Types,
    message: AgentMessage,
    wallet: Address,
    now: u64,
) -> Result<SessionRecord> {
    NewSession::generate()?
        .prepare(domain, types, message, now)?
        .sign()?
        .into_record(generate_session_id(), wallet)
}

/// Named stages, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    KeyGenerated,
    MessagePrepared,
    Signed,
    Persisted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::KeyGenerated => "key_generated",
            SessionState::MessagePrepared => "message_prepared",
            SessionState::Signed => "signed",
            SessionState::Persisted => "persisted",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly generated trading key.
pub struct NewSession {
    key: TradingKey,
}

impl NewSession {
    pub fn generate() -> Result<Self> {
        Ok(Self::with_key(TradingKey::generate()?))
    }

    pub fn with_key(key: TradingKey) -> Self {
        debug!(state = %SessionState::KeyGenerated, key_address = %key.address(), "Session stage");
        Self { key }
    }

    pub fn key_address(&self) -> Address {
        self.key.address()
    }

    /// Wrap the agent message into the typed-data payload to be signed.
    ///
    /// The message must still be valid at `now`, the signing time.
    pub fn prepare(
        self,
        domain: Eip712Domain,
        types: Types,
        message: AgentMessage,
        now: u64,
    ) -> Result<PreparedSession> {
        if message.is_expired_at(now) {
            return Err(Error::InvalidExpiry {
                expiry_time: message.expiry_time,
                now,
            });
        }

        let typed_data = message.to_typed_data(domain, types)?;
        let digest = typed_data.digest(AGENT_TYPE)?;
        debug!(
            state = %SessionState::MessagePrepared,
            agent = %message.agent_address,
            expiry_time = message.expiry_time,
            "Session stage"
        );
        Ok(PreparedSession {
            key: self.key,
            typed_data,
            digest,
        })
    }
}

/// A key together with the encoded message and its digest.
pub struct PreparedSession {
    key: TradingKey,
    typed_data: TypedData,
    digest: B256,
}

impl PreparedSession {
    pub fn digest(&self) -> B256 {
        self.digest
    }

    pub fn typed_data(&self) -> &TypedData {
        &self.typed_data
    }

    /// Sign the digest and confirm the signature recovers to the key.
    pub fn sign(self) -> Result<SignedSession> {
        let (digest, signature) = sign_typed_data(&self.typed_data, AGENT_TYPE, &self.key)?;

        let expected = self.key.address();
        let recovered = recover_address(&digest, &signature)?;
        if recovered != expected {
            return Err(Error::InvalidSignature {
                message: format!("signature recovers to {recovered}, expected {expected}"),
            });
        }

        debug!(state = %SessionState::Signed, digest = %digest, "Session stage");
        Ok(SignedSession {
            key: self.key,
            typed_data: self.typed_data,
            digest,
            signature,
        })
    }
}

/// A verified signature over the agent message.
pub struct SignedSession {
    key: TradingKey,
    typed_data: TypedData,
    digest: B256,
    signature: Signature,
}

impl SignedSession {
    pub fn digest(&self) -> B256 {
        self.digest
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Assemble the storable record.
    pub fn into_record(self, session_id: String, wallet: Address) -> Result<SessionRecord> {
        let agent_address = serde_json::from_value::<AgentMessage>(self.typed_data.message.clone())?
            .agent_address;

        Ok(SessionRecord {
            session_id,
            wallet_address: wallet,
            agent_address,
            trading_key: self.key.to_hex(),
            eip712_data: self.typed_data,
            signature: self.signature,
            exchange_response: None,
        })
    }
}
