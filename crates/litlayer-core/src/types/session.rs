//! Persisted session records.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::exchange::ExchangeRequest;
use crate::signing::{self, AgentMessage, Signature, TradingKey, TypedData, AGENT_TYPE};
use crate::Result;

/// A signed trading session.
///
/// The JSON layout (field names and order) is the on-disk format of stored
/// sessions and must stay stable.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Random 16-byte session id, lowercase hex.
    pub session_id: String,
    /// Wallet that delegated authority.
    pub wallet_address: Address,
    /// Agent authorized by the signed message.
    pub agent_address: Address,
    /// Private trading key, 0x-prefixed hex.
    pub trading_key: String,
    /// Domain, types and message that were signed.
    pub eip712_data: TypedData,
    /// Signature over the typed-data digest.
    pub signature: Signature,
    /// Acknowledgement returned by the exchange, once submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_response: Option<Value>,
}

impl SessionRecord {
    /// Decode the signed agent message.
    pub fn agent_message(&self) -> Result<AgentMessage> {
        Ok(serde_json::from_value(self.eip712_data.message.clone())?)
    }

    pub fn expiry_time(&self) -> Result<u64> {
        Ok(self.agent_message()?.expiry_time)
    }

    /// Whether the authorization has lapsed at `now` (unix seconds).
    ///
    /// Stores never purge expired sessions; readers must check this.
    pub fn is_expired_at(&self, now: u64) -> Result<bool> {
        Ok(self.agent_message()?.is_expired_at(now))
    }

    /// Recompute the digest that was signed.
    pub fn digest(&self) -> Result<B256> {
        self.eip712_data.digest(AGENT_TYPE)
    }

    /// Rebuild the trading key from its stored hex form.
    pub fn signing_key(&self) -> Result<TradingKey> {
        TradingKey::from_hex(&self.trading_key)
    }

    /// Check that the stored signature recovers to the stored trading key.
    pub fn verify_signature(&self) -> Result<bool> {
        let expected = self.signing_key()?.address();
        signing::verify(&self.digest()?, &self.signature, expected)
    }

    /// The registration request for the exchange transport.
    pub fn exchange_request(&self) -> Result<ExchangeRequest> {
        let message = self.agent_message()?;
        Ok(ExchangeRequest {
            proxy_address: message.agent_address,
            platform: message.platform,
            chain_id: self.eip712_data.domain.chain_id,
            expiry_time: message.expiry_time,
            signature: self.signature,
        })
    }

    /// Attach the session signature to an outgoing request payload.
    pub fn authorize_payload(&self, payload: &mut Map<String, Value>) {
        payload.insert(
            "signature".to_string(),
            Value::String(self.signature.to_hex()),
        );
    }

    /// Record the exchange's acknowledgement.
    pub fn with_exchange_response(mut self, response: Value) -> Self {
        self.exchange_response = Some(response);
        self
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the private key in debug output
        f.debug_struct("SessionRecord")
            .field("session_id", &self.session_id)
            .field("wallet_address", &self.wallet_address)
            .field("agent_address", &self.agent_address)
            .field("trading_key", &"<redacted>")
            .field("eip712_data", &self.eip712_data)
            .field("signature", &self.signature)
            .field("exchange_response", &self.exchange_response)
            .finish()
    }
}
