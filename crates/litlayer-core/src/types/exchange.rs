//! Payloads handed to the exchange transport.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::signing::Signature;

/// Agent registration request for the exchange's `/v1/exchange` endpoint.
///
/// Carries exactly what the exchange needs to rebuild the signed digest:
/// the agent (proxy) address, platform, chain id and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// Agent address being registered.
    pub proxy_address: Address,
    /// Platform identifier.
    pub platform: String,
    /// Chain ID of the signing domain.
    pub chain_id: u64,
    /// Expiry timestamp (unix seconds).
    pub expiry_time: u64,
    /// EIP-712 signature as hex string.
    pub signature: Signature,
}
