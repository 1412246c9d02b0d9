//! Host-side proving and verification for the sigslice protocol.
//!
//! This crate wraps the pure attestation engine
//! ([`sigslice_risc0_shared::execute`]) in a Risc0 proving harness and
//! provides the matching verifier. The engine itself stays testable with
//! no proving backend at all; everything here is a thin adapter around
//! request-in, committed-output-or-error-out.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sigslice_risc0_methods::{SIGSLICE_GUEST_ELF, SIGSLICE_GUEST_ID};
//! use sigslice_zk::{image_id_bytes, AttestationVerifier, SliceAttestor};
//!
//! let image_id = image_id_bytes(SIGSLICE_GUEST_ID);
//! let attestor = SliceAttestor::new(SIGSLICE_GUEST_ELF, image_id);
//! let attestation = attestor.attest(&request)?;
//!
//! let verifier = AttestationVerifier::new(image_id);
//! assert!(verifier.verify(&attestation, signer, digest));
//! ```
//!
//! Requests are independent and order-insensitive: multiple ranges of one
//! signed concatenation may be attested in parallel with no shared mutable
//! state, and abandoned or retried freely (identical requests produce
//! identical attestations).

pub mod bounded_deser;
pub mod error;
pub mod risc0_host;
pub mod verifier;

pub use error::{ProverError, ProverResult};
pub use risc0_host::{image_id_bytes, SealKind, SliceAttestor};
pub use verifier::{AttestationVerifier, VerificationStatus};

use serde::{Deserialize, Serialize};

use sigslice_risc0_shared::{Attestation, AttestationRequest};

// =============================================================================
// Prover configuration
// =============================================================================

/// Credentials and endpoint for a remote proving service.
///
/// Passed explicitly into the adapter; the library never reads ambient
/// environment state, so the pure core stays unit-testable without any
/// backend configured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProverConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl RemoteProverConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> ProverResult<Self> {
        let config = Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        };
        if config.endpoint.is_empty() {
            return Err(ProverError::Config("remote endpoint must not be empty".into()));
        }
        if config.api_key.is_empty() {
            return Err(ProverError::Config("remote API key must not be empty".into()));
        }
        Ok(config)
    }
}

/// Proving backend selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ProverBackend {
    /// Prove locally with the in-process Risc0 prover.
    #[default]
    Local,
    /// Dispatch requests to a remote proving service.
    Remote(RemoteProverConfig),
}

/// Configuration for creating an attestation backend.
#[derive(Clone, Debug, Default)]
pub struct ProverConfig {
    pub backend: ProverBackend,
    pub seal: SealKind,
}

impl ProverConfig {
    /// Local proving with composite receipts.
    pub fn local() -> Self {
        Self::default()
    }

    /// Remote proving against the given service.
    pub fn remote(config: RemoteProverConfig) -> Self {
        Self {
            backend: ProverBackend::Remote(config),
            seal: SealKind::default(),
        }
    }

    pub fn with_seal(mut self, seal: SealKind) -> Self {
        self.seal = seal;
        self
    }
}

/// Seam for dispatching attestation requests to a proving backend.
///
/// Implementations must be stateless across calls: each request is
/// self-contained, retryable, and safe to run concurrently with others.
pub trait AttestationBackend: Send + Sync {
    fn attest(&self, request: &AttestationRequest) -> ProverResult<Attestation>;
}

impl AttestationBackend for SliceAttestor {
    fn attest(&self, request: &AttestationRequest) -> ProverResult<Attestation> {
        SliceAttestor::attest(self, request)
    }
}

/// Create an attestation backend from configuration.
///
/// The remote variant is configuration-complete but deliberately returns an
/// explicit error until a transport is wired in, instead of silently
/// proving locally with remote credentials in hand.
pub fn create_attestor(
    config: &ProverConfig,
    guest_elf: &'static [u8],
    image_id: [u8; 32],
) -> ProverResult<Box<dyn AttestationBackend>> {
    match &config.backend {
        ProverBackend::Local => Ok(Box::new(
            SliceAttestor::new(guest_elf, image_id).with_seal(config.seal),
        )),
        ProverBackend::Remote(remote) => {
            tracing::warn!(endpoint = %remote.endpoint, "remote proving requested but no transport is wired");
            Err(ProverError::Config(
                "remote proving backend not wired; dispatch requests through your proving \
                 service client and retry transport failures caller-side"
                    .into(),
            ))
        }
    }
}
