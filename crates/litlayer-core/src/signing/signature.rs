//! Recoverable secp256k1 signatures in `r || s || v` form.

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Length of a serialized signature in bytes.
pub const SIGNATURE_LENGTH: usize = 65;

/// secp256k1 group order `n`.
const SECP256K1_ORDER: U256 = U256::from_limbs([
    0xbfd25e8cd0364141,
    0xbaaedce6af48a03b,
    0xfffffffffffffffe,
    0xffffffffffffffff,
]);

/// An ECDSA signature with its recovery id.
///
/// Serialized as `0x` + 130 hex characters. The trailing byte is the raw
/// recovery id (`0` or `1`); the legacy `27`/`28` form is accepted when
/// parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    r: B256,
    s: B256,
    v: u8,
}

impl Signature {
    /// Build a signature from its components, validating ranges.
    pub fn new(r: B256, s: B256, v: u8) -> Result<Self> {
        let v = match v {
            0 | 27 => 0,
            1 | 28 => 1,
            other => {
                return Err(Error::invalid_signature(format!(
                    "invalid recovery id {other}"
                )))
            }
        };

        for (label, component) in [("r", r), ("s", s)] {
            let value = U256::from_be_bytes(component.0);
            if value.is_zero() || value >= SECP256K1_ORDER {
                return Err(Error::invalid_signature(format!("{label} is out of range")));
            }
        }

        Ok(Self { r, s, v })
    }

    /// Parse the 65-byte `r || s || v` form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(Error::invalid_signature(format!(
                "expected {SIGNATURE_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        Self::new(
            B256::from_slice(&bytes[..32]),
            B256::from_slice(&bytes[32..64]),
            bytes[64],
        )
    }

    /// Parse a hex signature, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| Error::invalid_signature(format!("signature is not hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn r(&self) -> B256 {
        self.r
    }

    pub fn s(&self) -> B256 {
        self.s
    }

    /// Recovery id, `0` or `1`.
    pub fn v(&self) -> u8 {
        self.v
    }

    pub fn as_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes[..32].copy_from_slice(self.r.as_slice());
        bytes[32..64].copy_from_slice(self.s.as_slice());
        bytes[64] = self.v;
        bytes
    }

    /// `0x`-prefixed 130-character hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.as_bytes()))
    }

    pub(crate) fn to_primitive(self) -> alloy_primitives::Signature {
        alloy_primitives::Signature::new(
            U256::from_be_bytes(self.r.0),
            U256::from_be_bytes(self.s.0),
            self.v == 1,
        )
    }
}

impl From<alloy_primitives::Signature> for Signature {
    fn from(signature: alloy_primitives::Signature) -> Self {
        Self {
            r: B256::from(signature.r().to_be_bytes::<32>()),
            s: B256::from(signature.s().to_be_bytes::<32>()),
            v: u8::from(signature.v()),
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
