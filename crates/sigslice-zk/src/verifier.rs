//! Attestation verification.
//!
//! Anyone holding the expected program identifier can check an attestation
//! any number of times; verification is a pure predicate with no shared
//! state. A mismatch is a normal negative result (`false`), not an error —
//! including malformed seal bytes.

use risc0_zkvm::Receipt;
use tracing::debug;

use alloy_primitives::{Address, B256};
use sigslice_risc0_shared::{Attestation, Journal};

use crate::bounded_deser;

/// Detailed verification outcome; [`AttestationVerifier::verify`] is the
/// boolean view of this.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    Failure(String),
}

impl VerificationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationStatus::Success)
    }
}

/// Verifies attestations against a fixed expected program identifier.
pub struct AttestationVerifier {
    image_id: [u8; 32],
}

impl AttestationVerifier {
    /// Create a verifier for the given guest image ID.
    pub fn new(image_id: [u8; 32]) -> Self {
        Self { image_id }
    }

    /// Pure predicate: `true` iff the proof is valid for the expected
    /// program identifier and commits exactly `(expected_signer,
    /// expected_digest)`.
    pub fn verify(
        &self,
        attestation: &Attestation,
        expected_signer: Address,
        expected_digest: B256,
    ) -> bool {
        match self.check(attestation, expected_signer, expected_digest) {
            VerificationStatus::Success => true,
            VerificationStatus::Failure(reason) => {
                debug!(%reason, "attestation rejected");
                false
            }
        }
    }

    /// Like [`Self::verify`] but reports why verification failed.
    pub fn check(
        &self,
        attestation: &Attestation,
        expected_signer: Address,
        expected_digest: B256,
    ) -> VerificationStatus {
        if self.image_id == [0u8; 32] {
            return VerificationStatus::Failure(
                "all-zero image ID: refusing to verify proofs for an unspecified guest".into(),
            );
        }
        if attestation.program_id != self.image_id {
            return VerificationStatus::Failure(format!(
                "program identifier mismatch: attestation carries {}, expected {}",
                hex::encode(attestation.program_id),
                hex::encode(self.image_id)
            ));
        }

        // Opaque seal bytes are untrusted input: bounded deserialization.
        let receipt: Receipt = match bounded_deser::deserialize_receipt(&attestation.seal) {
            Ok(receipt) => receipt,
            Err(e) => {
                return VerificationStatus::Failure(format!("failed to deserialize seal: {e}"))
            }
        };

        let image_id = risc0_zkvm::sha::Digest::from_bytes(self.image_id);
        if let Err(e) = receipt.verify(image_id) {
            return VerificationStatus::Failure(format!("receipt verification failed: {e}"));
        }

        // The attestation's journal must be the one the proof binds.
        if receipt.journal.bytes != attestation.journal {
            return VerificationStatus::Failure(
                "attestation journal differs from the receipt journal".into(),
            );
        }

        let expected = Journal {
            signer: expected_signer,
            digest: expected_digest,
        };
        if attestation.journal != expected.encode() {
            return VerificationStatus::Failure(
                "committed output does not match the expected (signer, digest) pair".into(),
            );
        }

        VerificationStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_attestation(program_id: [u8; 32]) -> Attestation {
        Attestation {
            program_id,
            journal: vec![0u8; 52],
            seal: vec![0xde, 0xad, 0xbe, 0xef],
        }
    }

    #[test]
    fn program_id_mismatch_is_false() {
        let verifier = AttestationVerifier::new([1u8; 32]);
        let attestation = dummy_attestation([2u8; 32]);
        let status = verifier.check(&attestation, Address::ZERO, B256::ZERO);
        assert!(matches!(status, VerificationStatus::Failure(_)));
        assert!(!verifier.verify(&attestation, Address::ZERO, B256::ZERO));
    }

    #[test]
    fn all_zero_image_id_is_refused() {
        let verifier = AttestationVerifier::new([0u8; 32]);
        let attestation = dummy_attestation([0u8; 32]);
        assert!(!verifier.verify(&attestation, Address::ZERO, B256::ZERO));
    }

    #[test]
    fn malformed_seal_is_false_not_an_error() {
        let verifier = AttestationVerifier::new([1u8; 32]);
        let attestation = dummy_attestation([1u8; 32]);
        let status = verifier.check(&attestation, Address::ZERO, B256::ZERO);
        match status {
            VerificationStatus::Failure(reason) => {
                assert!(reason.contains("seal"), "{reason}")
            }
            VerificationStatus::Success => panic!("garbage seal must not verify"),
        }
    }

    #[test]
    fn oversized_seal_is_false() {
        let verifier = AttestationVerifier::new([1u8; 32]);
        let mut attestation = dummy_attestation([1u8; 32]);
        attestation.seal = vec![0u8; (bounded_deser::MAX_RECEIPT_BYTES as usize) + 1];
        assert!(!verifier.verify(&attestation, Address::ZERO, B256::ZERO));
    }
}
