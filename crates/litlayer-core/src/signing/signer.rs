//! Digest signing, address recovery and verification.
//!
//! Signatures are produced with RFC 6979 deterministic nonces, so the same
//! digest and key always yield the same signature.

use alloy_primitives::{Address, B256};
use alloy_signer::SignerSync;

use super::keys::TradingKey;
use super::signature::Signature;
use super::typed_data::TypedData;
use crate::{Error, Result};

/// Sign a 32-byte digest with a trading key.
pub fn sign_digest(digest: &B256, key: &TradingKey) -> Result<Signature> {
    let signature = key
        .signer()
        .sign_hash_sync(digest)
        .map_err(|e| Error::invalid_key(format!("failed to sign digest: {e}")))?;

    Ok(Signature::from(signature))
}

/// Compute the typed-data digest for `primary_type` and sign it.
///
/// Returns the digest alongside the signature so callers can verify
/// without re-encoding.
pub fn sign_typed_data(
    data: &TypedData,
    primary_type: &str,
    key: &TradingKey,
) -> Result<(B256, Signature)> {
    let digest = data.digest(primary_type)?;
    let signature = sign_digest(&digest, key)?;
    Ok((digest, signature))
}

/// Recover the signer address from a digest and signature.
pub fn recover_address(digest: &B256, signature: &Signature) -> Result<Address> {
    signature
        .to_primitive()
        .recover_address_from_prehash(digest)
        .map_err(|e| Error::invalid_signature(format!("recovery failed: {e}")))
}

/// Whether `signature` over `digest` was produced by `expected`.
pub fn verify(digest: &B256, signature: &Signature, expected: Address) -> Result<bool> {
    Ok(recover_address(digest, signature)? == expected)
}
