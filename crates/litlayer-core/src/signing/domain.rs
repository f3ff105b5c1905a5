//! EIP-712 domain for LitLayer agent registration.
//!
//! LitLayer binds every agent signature to a fixed domain. The domain
//! carries all five optional EIP-712 fields, including `salt`, so the
//! separator here differs from the common four-field variant.

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::typed_data::Eip712Field;
use crate::{Error, Result};

/// Chain ID for Arbitrum One.
pub const ARBITRUM_CHAIN_ID: u64 = 42161;

/// Domain name used by the LitLayer exchange.
pub const LITLAYER_DOMAIN_NAME: &str = "LitLayer";

/// Domain version used by the LitLayer exchange.
pub const LITLAYER_DOMAIN_VERSION: &str = "v1";

/// Struct name reserved for the domain in a type schema.
pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain";

const EIP712_DOMAIN_SIGNATURE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract,bytes32 salt)";

/// EIP-712 domain separator input.
///
/// Field names serialize with their EIP-712 JSON spelling so a persisted
/// payload can be handed to any standard typed-data verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
    /// Chain ID. Encoded as `uint256`; held as `u64` so records keep the
    /// plain JSON number form (`"chainId": 42161`). Larger values fail to
    /// deserialize rather than truncate.
    pub chain_id: u64,
    /// Verifying contract address.
    pub verifying_contract: Address,
    /// Disambiguating salt.
    pub salt: B256,
}

impl Eip712Domain {
    /// The LitLayer deployment domain on Arbitrum One.
    pub fn litlayer() -> Self {
        Self {
            name: LITLAYER_DOMAIN_NAME.to_string(),
            version: LITLAYER_DOMAIN_VERSION.to_string(),
            chain_id: ARBITRUM_CHAIN_ID,
            verifying_contract: Address::ZERO,
            salt: B256::ZERO,
        }
    }

    /// Create domain with custom parameters.
    pub fn custom(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
        salt: B256,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
            salt,
        }
    }

    /// The canonical `EIP712Domain` field list, in declaration order.
    pub fn schema() -> Vec<Eip712Field> {
        vec![
            Eip712Field::new("name", "string"),
            Eip712Field::new("version", "string"),
            Eip712Field::new("chainId", "uint256"),
            Eip712Field::new("verifyingContract", "address"),
            Eip712Field::new("salt", "bytes32"),
        ]
    }

    /// Compute the EIP-712 domain separator hash.
    pub fn separator(&self) -> B256 {
        let mut encoded = Vec::with_capacity(6 * 32);
        encoded.extend_from_slice(keccak256(EIP712_DOMAIN_SIGNATURE).as_slice());
        encoded.extend_from_slice(keccak256(self.name.as_bytes()).as_slice());
        encoded.extend_from_slice(keccak256(self.version.as_bytes()).as_slice());
        encoded.extend_from_slice(&U256::from(self.chain_id).to_be_bytes::<32>());
        encoded.extend_from_slice(B256::left_padding_from(self.verifying_contract.as_slice()).as_slice());
        encoded.extend_from_slice(self.salt.as_slice());

        keccak256(&encoded)
    }
}

impl Default for Eip712Domain {
    fn default() -> Self {
        Self::litlayer()
    }
}

/// LitLayer environment tag carried in the `litLayer` field of the agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    Devnet,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Devnet => "Devnet",
            Environment::Testnet => "Testnet",
            Environment::Mainnet => "Mainnet",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "devnet" => Ok(Environment::Devnet),
            "testnet" => Ok(Environment::Testnet),
            "mainnet" => Ok(Environment::Mainnet),
            other => Err(Error::Config {
                message: format!("unknown environment `{other}` (expected Devnet, Testnet or Mainnet)"),
            }),
        }
    }
}
