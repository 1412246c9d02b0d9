//! Bounded deserialization for untrusted attestation seals.
//!
//! # Security
//!
//! Unbounded `bincode::deserialize` is a DoS vector: attacker-controlled
//! bytes can claim huge length prefixes and trigger large allocations.
//! Seals arriving from outside the process MUST go through
//! [`deserialize_receipt`].

use bincode::Options;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum size for Risc0 receipts (16 MiB).
///
/// Receipts can be large due to STARK proofs; 16 MiB is generous but
/// bounded.
pub const MAX_RECEIPT_BYTES: u64 = 16 * 1024 * 1024;

/// Bounded deserialization error.
#[derive(Debug, Error)]
pub enum BoundedDeserError {
    #[error("input size {len} exceeds maximum {max} bytes")]
    InputTooLarge { len: u64, max: u64 },
    #[error("bincode error: {0}")]
    Bincode(String),
}

/// Deserialize with a size limit (fail-closed on oversized input).
///
/// Rejects inputs larger than `max_bytes` before parsing, and applies
/// bincode's internal limit so length-prefixed buffers inside the payload
/// cannot allocate past the cap either.
pub fn deserialize_bounded<T: DeserializeOwned>(
    bytes: &[u8],
    max_bytes: u64,
) -> Result<T, BoundedDeserError> {
    if bytes.len() as u64 > max_bytes {
        return Err(BoundedDeserError::InputTooLarge {
            len: bytes.len() as u64,
            max: max_bytes,
        });
    }

    // Match the configuration used by `bincode::serialize`: fixint
    // encoding, trailing bytes allowed, plus a hard read limit.
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(max_bytes)
        .deserialize(bytes)
        .map_err(|e| BoundedDeserError::Bincode(e.to_string()))
}

/// Deserialize a Risc0 receipt from seal bytes with the receipt cap.
pub fn deserialize_receipt<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, BoundedDeserError> {
    deserialize_bounded(bytes, MAX_RECEIPT_BYTES)
}
