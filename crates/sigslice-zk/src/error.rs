//! Error types for host-side proving and verification.

use thiserror::Error;

use sigslice_core::CoreError;

/// Errors raised while producing or handling attestations on the host.
#[derive(Debug, Error)]
pub enum ProverError {
    /// A protocol-level failure surfaced by the core engine (invalid
    /// signature, bad range, non-canonical slice, ...). Not retryable:
    /// the request itself is wrong.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The proving backend failed (resource exhaustion, executor error).
    /// Retryable: requests are deterministic, so identical retries are
    /// safe and idempotent.
    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    /// The journal committed by the guest does not match the host's own
    /// re-execution of the request. Indicates guest/host ABI drift.
    #[error("journal mismatch: {0}")]
    JournalMismatch(String),

    /// The guest ELF or image ID is missing (methods were not embedded at
    /// build time).
    #[error("guest methods not embedded: {0}")]
    MethodsNotEmbedded(String),

    /// Receipt (de)serialization failure.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Invalid or unusable prover configuration.
    #[error("invalid prover configuration: {0}")]
    Config(String),
}

/// Result type for host-side proving operations.
pub type ProverResult<T> = std::result::Result<T, ProverError>;
