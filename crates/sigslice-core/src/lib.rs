//! Core primitives for the sigslice protocol.
//!
//! sigslice lets a signer authorize many structured-data messages with a
//! single signature: each message is canonicalized to a deterministic byte
//! string, the byte strings are concatenated with recorded ranges, and the
//! concatenation is signed once. Per range, an attestation engine later
//! re-verifies the signature and re-derives the message digest inside a
//! proof-producing computation (see `sigslice-risc0-shared` and
//! `sigslice-zk`).
//!
//! This crate holds the parts both sides of that protocol must agree on
//! byte-for-byte: the canonicalizer and digester ([`typed_data`]), the
//! concatenation builder ([`concat`]), and signature creation and
//! verification ([`signing`]).

use thiserror::Error;

pub mod concat;
pub mod signing;
pub mod typed_data;

pub use concat::{ByteRange, Concatenation, SignedConcatenation};
pub use typed_data::{Eip712Domain, FieldDef, FieldType, TypeSchema, TypedMessage};

/// Unified error type for sigslice core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The type schema itself is malformed: unknown or unparsable field
    /// type, unresolved struct reference, reserved or duplicate name.
    #[error("schema error: {0}")]
    Schema(String),

    /// The document does not fit its schema: missing or extra field, value
    /// not coercible to the declared type. Raised at message construction
    /// time; a `TypedMessage` is never partially canonicalized.
    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    /// Signature does not verify against the expected signer and buffer.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// A `[start, end)` range does not fit inside the buffer it indexes.
    #[error("range [{start}, {end}) out of bounds for buffer of {len} bytes")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        len: usize,
    },

    /// Bytes at a claimed range do not parse and re-canonicalize to the
    /// exact same bytes. Deliberately not auto-corrected.
    #[error("slice not canonical: {0}")]
    SliceNotCanonical(String),

    /// Key material or signing backend failure.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Structurally invalid input outside the categories above.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
