//! Risc0 host integration: proving slice attestations.
//!
//! This module bridges the pure attestation engine with the Risc0 zkVM.
//!
//! ```text
//! ┌──────────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  AttestationRequest  │ --> │  Risc0 Prover   │ --> │   Attestation   │
//! │  (host witness)      │     │  (guest in VM)  │     │  (verifiable)   │
//! └──────────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Security Model
//!
//! - The guest program is compiled to RISC-V and has a fixed image ID
//! - The image ID must match during verification (no code substitution)
//! - The journal (public output) is cryptographically bound to the proof
//! - The host re-executes the engine before and after proving; any
//!   divergence between host and guest results fails closed

use risc0_zkvm::{default_prover, ExecutorEnv, ProverOpts};
use tracing::{debug, info};

use sigslice_risc0_shared::{execute, Attestation, AttestationRequest};

use crate::error::{ProverError, ProverResult};

/// Which receipt kind the prover should produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SealKind {
    /// Composite STARK receipt (local verification).
    #[default]
    Composite,
    /// Groth16 receipt, the seal format on-chain verifiers consume.
    Groth16,
}

fn validate_embedded_methods(guest_elf: &[u8], image_id: [u8; 32]) -> ProverResult<()> {
    if guest_elf.is_empty() {
        return Err(ProverError::MethodsNotEmbedded(
            "guest ELF is empty; rebuild without RISC0_SKIP_BUILD=1 and ensure the Risc0 \
             toolchain is installed"
                .into(),
        ));
    }
    if image_id == [0u8; 32] {
        return Err(ProverError::MethodsNotEmbedded(
            "image ID is all-zero; rebuild without RISC0_SKIP_BUILD=1 and ensure the Risc0 \
             toolchain is installed"
                .into(),
        ));
    }
    Ok(())
}

/// Convert a generated `[u32; 8]` image ID into its 32-byte form.
pub fn image_id_bytes(words: [u32; 8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (chunk, word) in out.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    out
}

/// Attestor that proves slice attestations with the Risc0 zkVM.
///
/// Holds no mutable state: every request is independent, so arbitrarily
/// many attestors (or calls on one attestor) may run concurrently, and the
/// completion order of parallel requests carries no meaning.
///
/// # Usage
///
/// ```rust,ignore
/// use sigslice_risc0_methods::{SIGSLICE_GUEST_ELF, SIGSLICE_GUEST_ID};
/// use sigslice_zk::{image_id_bytes, SliceAttestor};
///
/// let attestor = SliceAttestor::new(SIGSLICE_GUEST_ELF, image_id_bytes(SIGSLICE_GUEST_ID));
/// let attestation = attestor.attest(&request)?;
/// ```
pub struct SliceAttestor {
    guest_elf: &'static [u8],
    image_id: [u8; 32],
    seal: SealKind,
}

impl SliceAttestor {
    /// Create an attestor with the guest ELF and its image ID.
    pub fn new(guest_elf: &'static [u8], image_id: [u8; 32]) -> Self {
        Self {
            guest_elf,
            image_id,
            seal: SealKind::default(),
        }
    }

    /// Select the receipt kind to produce.
    pub fn with_seal(mut self, seal: SealKind) -> Self {
        self.seal = seal;
        self
    }

    /// The program identifier attestations from this attestor carry.
    pub fn program_id(&self) -> [u8; 32] {
        self.image_id
    }

    /// Prove one attestation request.
    ///
    /// The request is re-executed on the host first, so protocol failures
    /// (`SignatureInvalid`, `RangeOutOfBounds`, `SliceNotCanonical`)
    /// surface as [`CoreError`](sigslice_core::CoreError)s without paying
    /// for proving; no attestation is ever emitted for them.
    pub fn attest(&self, request: &AttestationRequest) -> ProverResult<Attestation> {
        validate_embedded_methods(self.guest_elf, self.image_id)?;

        // Fail-closed pre-flight: the guest runs this exact function.
        let expected = execute(request)?;
        debug!(
            start = request.range.start,
            end = request.range.end,
            "attestation request passed host pre-flight"
        );

        let env = ExecutorEnv::builder()
            .write(request)
            .map_err(|e| ProverError::ProofGeneration(format!("failed to write input: {e}")))?
            .build()
            .map_err(|e| ProverError::ProofGeneration(format!("failed to build env: {e}")))?;

        let opts = match self.seal {
            SealKind::Composite => ProverOpts::default(),
            SealKind::Groth16 => ProverOpts::groth16(),
        };

        let prover = default_prover();
        let prove_info = prover
            .prove_with_opts(env, self.guest_elf, &opts)
            .map_err(|e| ProverError::ProofGeneration(format!("proving failed: {e}")))?;
        let receipt = prove_info.receipt;

        // The guest must have committed exactly what the host derived;
        // anything else is guest/host ABI drift and must not ship.
        let journal = receipt.journal.bytes.clone();
        if journal != expected.encode() {
            return Err(ProverError::JournalMismatch(format!(
                "guest committed {} but host derived {}",
                hex::encode(&journal),
                hex::encode(expected.encode())
            )));
        }

        let image_id = risc0_zkvm::sha::Digest::from_bytes(self.image_id);
        receipt.verify(image_id).map_err(|e| {
            ProverError::ProofGeneration(format!("receipt failed self-verification: {e}"))
        })?;

        let seal = bincode::serialize(&receipt)
            .map_err(|e| ProverError::Serialization(format!("failed to serialize receipt: {e}")))?;

        info!(
            signer = %expected.signer,
            digest = %expected.digest,
            seal_bytes = seal.len(),
            "slice attestation proven"
        );

        Ok(Attestation {
            program_id: self.image_id,
            journal,
            seal,
        })
    }
}
