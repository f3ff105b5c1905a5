//! The `Agent` registration message.
//!
//! The wallet's trading key signs this message to tell LitLayer that the
//! agent address may trade on its behalf until `expiryTime`.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::domain::{Eip712Domain, Environment, EIP712_DOMAIN_TYPE};
use super::typed_data::{Eip712Field, TypedData, Types};
use crate::{Error, Result};

/// Struct name of the agent message in the type schema.
pub const AGENT_TYPE: &str = "Agent";

/// Default platform identifier.
pub const DEFAULT_PLATFORM: &str = "turbox";

/// Default validity window of an agent registration (24 hours).
pub const DEFAULT_VALIDITY_SECS: u64 = 86_400;

/// Agent registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// Environment tag.
    pub lit_layer: Environment,
    /// Address being authorized.
    pub agent_address: Address,
    /// Platform identifier.
    pub platform: String,
    /// Unix timestamp (seconds) after which the authorization lapses.
    pub expiry_time: u64,
}

impl AgentMessage {
    pub fn new(
        environment: Environment,
        agent_address: Address,
        platform: impl Into<String>,
        expiry_time: u64,
    ) -> Self {
        Self {
            lit_layer: environment,
            agent_address,
            platform: platform.into(),
            expiry_time,
        }
    }

    /// Build a message that expires `validity_secs` after `now`.
    pub fn expiring_after(
        environment: Environment,
        agent_address: Address,
        platform: impl Into<String>,
        now: u64,
        validity_secs: u64,
    ) -> Result<Self> {
        if validity_secs == 0 {
            return Err(Error::Config {
                message: "session validity must be greater than zero".to_string(),
            });
        }
        let expiry_time = now.checked_add(validity_secs).ok_or_else(|| Error::Config {
            message: format!("expiry overflows: {now} + {validity_secs}"),
        })?;

        Ok(Self::new(environment, agent_address, platform, expiry_time))
    }

    /// The LitLayer schema: `Agent` plus the five-field `EIP712Domain`.
    pub fn types() -> Types {
        Types::new()
            .with_struct(
                AGENT_TYPE,
                vec![
                    Eip712Field::new("litLayer", "string"),
                    Eip712Field::new("agentAddress", "address"),
                    Eip712Field::new("platform", "string"),
                    Eip712Field::new("expiryTime", "uint256"),
                ],
            )
            .with_struct(EIP712_DOMAIN_TYPE, Eip712Domain::schema())
    }

    /// Wrap this message into a typed-data payload.
    pub fn to_typed_data(&self, domain: Eip712Domain, types: Types) -> Result<TypedData> {
        Ok(TypedData::new(domain, types, serde_json::to_value(self)?))
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry_time <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::typed_data::type_hash;
    use alloy_primitives::B256;

    const AGENT: &str = "0xd28ac95d6D5Ba255816043200DD502A8EE5dD03C";

    #[test]
    fn test_default_expiry_window() {
        let now = 1_700_000_000;
        let message = AgentMessage::expiring_after(
            Environment::Devnet,
            AGENT.parse().unwrap(),
            DEFAULT_PLATFORM,
            now,
            DEFAULT_VALIDITY_SECS,
        )
        .unwrap();

        assert_eq!(message.expiry_time, now + 86_400);
        assert!(!message.is_expired_at(now));
        assert!(!message.is_expired_at(now + 86_399));
        assert!(message.is_expired_at(now + 86_400));
    }

    #[test]
    fn test_zero_or_overflowing_validity_rejected() {
        let agent: Address = AGENT.parse().unwrap();
        assert!(AgentMessage::expiring_after(Environment::Devnet, agent, "turbox", 1, 0).is_err());
        assert!(
            AgentMessage::expiring_after(Environment::Devnet, agent, "turbox", u64::MAX, 1).is_err()
        );
    }

    #[test]
    fn test_agent_type_hash() {
        let expected: B256 = "0x16510888cd89b08d40cc8919a0d2569860bc4bc2340c0ee6030b83b7b634b0bd"
            .parse()
            .unwrap();
        assert_eq!(type_hash(AGENT_TYPE, &AgentMessage::types()).unwrap(), expected);
    }

    #[test]
    fn test_message_json_layout() {
        let message = AgentMessage::new(Environment::Devnet, AGENT.parse().unwrap(), "turbox", 1_700_086_400);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["litLayer"], "Devnet");
        assert_eq!(json["platform"], "turbox");
        assert_eq!(json["expiryTime"], 1_700_086_400u64);
        assert_eq!(
            json["agentAddress"].as_str().unwrap().to_lowercase(),
            AGENT.to_lowercase()
        );
    }
}
