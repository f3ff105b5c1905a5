//! Ephemeral trading keys.
//!
//! A trading key is a fresh secp256k1 key generated per agent session. It
//! signs the agent registration message and is then handed to the session
//! record; it is never reused for another session.

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use rand::rngs::OsRng;
use rand::{TryCryptoRng, TryRngCore};
use tracing::warn;

use crate::{Error, Result};

/// secp256k1 group order `n`, big-endian.
const SECP256K1_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b,
    0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Upper bound on rejection-sampling draws before giving up.
///
/// A uniformly random 32-byte value falls outside `[1, n-1]` with
/// probability below 2^-127, so hitting this bound means the entropy
/// source is broken.
const MAX_GENERATION_ATTEMPTS: usize = 8;

/// An ephemeral secp256k1 keypair used to sign on behalf of an agent.
///
/// The secret scalar is held by the `k256` signing key, which zeroizes its
/// memory on drop.
#[derive(Clone)]
pub struct TradingKey {
    signer: PrivateKeySigner,
}

impl TradingKey {
    /// Generate a fresh key from the operating system's CSPRNG.
    pub fn generate() -> Result<Self> {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a key from a caller-supplied cryptographic RNG.
    ///
    /// Draws 32 bytes and redraws while the value is not a valid scalar.
    pub fn generate_with<R>(rng: &mut R) -> Result<Self>
    where
        R: TryRngCore + TryCryptoRng + ?Sized,
    {
        let mut candidate = [0u8; 32];

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            rng.try_fill_bytes(&mut candidate).map_err(|e| Error::KeyGeneration {
                message: format!("entropy source unavailable: {e}"),
            })?;

            if is_valid_scalar(&candidate) {
                let signer = PrivateKeySigner::from_bytes(&B256::from(candidate));
                candidate.fill(0);
                return signer.map(|signer| Self { signer }).map_err(|e| {
                    Error::KeyGeneration {
                        message: format!("rejected scalar: {e}"),
                    }
                });
            }

            warn!(attempt, "Drew out-of-range secp256k1 scalar, retrying");
        }

        candidate.fill(0);
        Err(Error::KeyGeneration {
            message: format!("no valid scalar after {MAX_GENERATION_ATTEMPTS} draws"),
        })
    }

    /// Load a key from a hex-encoded private key.
    ///
    /// Accepts 64 hex characters, optionally prefixed with "0x" and
    /// surrounded by whitespace.
    pub fn from_hex(key: &str) -> Result<Self> {
        let key_clean = key.trim().trim_start_matches("0x");
        let bytes = hex::decode(key_clean)
            .map_err(|e| Error::invalid_key(format!("private key is not hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Load a key from its raw 32-byte big-endian scalar.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let scalar: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::invalid_key(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        if !is_valid_scalar(&scalar) {
            return Err(Error::invalid_key("scalar outside [1, n-1]"));
        }

        let signer = PrivateKeySigner::from_bytes(&B256::from(scalar))
            .map_err(|e| Error::invalid_key(e.to_string()))?;
        Ok(Self { signer })
    }

    /// The Ethereum address of this key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The private key as 0x-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signer.to_bytes()))
    }

    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl std::fmt::Debug for TradingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the private key in debug output
        f.debug_struct("TradingKey")
            .field("address", &format!("{:?}", self.address()))
            .finish()
    }
}

fn is_valid_scalar(bytes: &[u8; 32]) -> bool {
    // Big-endian arrays of equal length compare numerically.
    bytes.iter().any(|b| *b != 0) && *bytes < SECP256K1_ORDER
}
