//! sigslice Risc0 methods.
//!
//! This crate provides the compiled guest ELF binary and image ID.
//!
//! The guest program proves a single slice attestation:
//! - verifies the one signature over the full concatenation buffer
//! - re-derives the EIP-712 digest of the canonical slice at the range
//! - commits the 52-byte `(signer, digest)` journal
//!
//! # Usage
//!
//! ```rust,ignore
//! use sigslice_risc0_methods::{SIGSLICE_GUEST_ELF, SIGSLICE_GUEST_ID};
//!
//! // Use the ELF for proving
//! let attestation = attestor.attest(&request)?;
//!
//! // Use the ID for verification
//! receipt.verify(SIGSLICE_GUEST_ID)?;
//! ```

// Include the generated methods
include!(concat!(env!("OUT_DIR"), "/methods.rs"));
