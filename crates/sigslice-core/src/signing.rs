//! Signature creation and verification over concatenation buffers.
//!
//! The protocol pins one signing mode: EIP-191 personal messages
//! ([`MessageMode::Personal`]). Signer and attestation engine must agree on
//! the mode out of band; there is no in-band negotiation, and a mode
//! mismatch surfaces as [`CoreError::SignatureInvalid`] at attestation
//! time, never as silent acceptance.

use alloy_primitives::{keccak256, Address, Signature, B256};

use crate::{CoreError, Result};

#[cfg(feature = "signer")]
use crate::concat::{Concatenation, SignedConcatenation};
#[cfg(feature = "signer")]
use alloy_signer::SignerSync;
#[cfg(feature = "signer")]
use alloy_signer_local::PrivateKeySigner;

/// How to derive the 32-byte prehash a signature is recovered against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageMode {
    /// The message already is a 32-byte prehash; use it as-is.
    Raw32,
    /// Hash arbitrary bytes with `keccak256(message)`.
    Keccak,
    /// EIP-191: `keccak256("\x19Ethereum Signed Message:\n{len}" ∥ message)`.
    Personal,
}

/// The fixed mode the attestation protocol signs and verifies under.
pub const ATTESTATION_MODE: MessageMode = MessageMode::Personal;

const EIP191_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Build the prehash for `message` under `mode`.
pub fn signing_prehash(message: &[u8], mode: MessageMode) -> Result<B256> {
    match mode {
        MessageMode::Raw32 => {
            if message.len() != 32 {
                return Err(CoreError::InvalidInput(format!(
                    "Raw32 mode requires a 32-byte prehash, got {} bytes",
                    message.len()
                )));
            }
            Ok(B256::from_slice(message))
        }
        MessageMode::Keccak => Ok(keccak256(message)),
        MessageMode::Personal => {
            let prefix = format!("{EIP191_PREFIX}{}", message.len());
            let mut buf = Vec::with_capacity(prefix.len() + message.len());
            buf.extend_from_slice(prefix.as_bytes());
            buf.extend_from_slice(message);
            Ok(keccak256(&buf))
        }
    }
}

/// Verify an ECDSA signature against an expected signer address.
///
/// Recovery-based: the signature must resolve to exactly `expected` over
/// the prehash of `message` under `mode`. Any other outcome is
/// [`CoreError::SignatureInvalid`].
pub fn verify_signature(
    message: &[u8],
    signature: &Signature,
    expected: Address,
    mode: MessageMode,
) -> Result<()> {
    let prehash = signing_prehash(message, mode)?;
    let recovered = signature
        .recover_address_from_prehash(&prehash)
        .map_err(|e| CoreError::SignatureInvalid(format!("recovery failed: {e}")))?;
    if recovered != expected {
        return Err(CoreError::SignatureInvalid(format!(
            "recovered address {recovered:#x} does not match expected address {expected:#x}"
        )));
    }
    Ok(())
}

/// Sign a concatenation buffer once under the fixed attestation mode.
///
/// Signs whatever bytes the buffer holds; ranges are neither inspected nor
/// validated here. Key storage and wallet integration are the caller's
/// concern.
#[cfg(feature = "signer")]
pub fn sign_concatenation(
    concat: Concatenation,
    key: &PrivateKeySigner,
) -> Result<SignedConcatenation> {
    let signature = key
        .sign_message_sync(concat.buffer())
        .map_err(|e| CoreError::Crypto(format!("signing failed: {e}")))?;
    Ok(SignedConcatenation {
        signer: key.address(),
        signature,
        concat,
    })
}
