//! End-to-end tests for the sign-once / attest-per-slice flow.
//!
//! The pure engine paths run everywhere. Proving tests follow the embedded
//! guest and skip when the Risc0 methods are not built into the test
//! binary.

use alloy_primitives::{Address, Bytes};
use alloy_signer_local::PrivateKeySigner;
use serde_json::{json, Map};

use sigslice_core::concat::{ByteRange, Concatenation, SignedConcatenation};
use sigslice_core::signing::sign_concatenation;
use sigslice_core::typed_data::{Eip712Domain, FieldDef, TypeSchema, TypedMessage};
use sigslice_core::CoreError;
use sigslice_risc0_methods::{SIGSLICE_GUEST_ELF, SIGSLICE_GUEST_ID};
use sigslice_risc0_shared::{execute, Attestation, AttestationRequest, Journal};
use sigslice_zk::{image_id_bytes, AttestationVerifier, ProverError, SliceAttestor};

// =============================================================================
// Helpers
// =============================================================================

fn transfer(recipient: [u8; 20], amount: u64, nonce: u64) -> TypedMessage {
    let mut schema = TypeSchema::new();
    schema
        .define(
            "Transfer",
            vec![
                FieldDef::new("recipient", "address").unwrap(),
                FieldDef::new("amount", "uint256").unwrap(),
                FieldDef::new("nonce", "uint256").unwrap(),
            ],
        )
        .unwrap();
    let domain = Eip712Domain {
        name: Some("sigslice-test".into()),
        version: Some("1".into()),
        chain_id: Some(alloy_primitives::U256::from(1u64)),
        ..Default::default()
    };
    let mut map = Map::new();
    map.insert(
        "recipient".into(),
        json!(format!("0x{}", hex::encode(recipient))),
    );
    map.insert("amount".into(), json!(amount));
    map.insert("nonce".into(), json!(nonce));
    TypedMessage::new(schema, "Transfer", domain, map).unwrap()
}

fn signed_transfers(count: u64) -> (SignedConcatenation, Vec<TypedMessage>) {
    let messages: Vec<TypedMessage> = (0..count)
        .map(|i| transfer([i as u8 + 1; 20], 1_000 * (i + 1), i))
        .collect();
    let concat = Concatenation::build(&messages).unwrap();
    let key = PrivateKeySigner::random();
    (sign_concatenation(concat, &key).unwrap(), messages)
}

fn should_skip_due_to_missing_methods() -> bool {
    if !SIGSLICE_GUEST_ELF.is_empty() {
        return false;
    }
    eprintln!("Skipping: Risc0 guest ELF is empty (methods not embedded)");
    true
}

fn should_skip_due_to_r0vm_mismatch(err: &dyn std::fmt::Display) -> bool {
    let msg = err.to_string();
    msg.contains("r0vm") && msg.contains("not compatible")
}

// =============================================================================
// Engine flow (no proving)
// =============================================================================

#[test]
fn every_segment_attests_to_its_own_digest() {
    let (signed, messages) = signed_transfers(3);
    for (i, message) in messages.iter().enumerate() {
        let request = AttestationRequest::for_segment(&signed, i).unwrap();
        let journal = execute(&request).unwrap();
        assert_eq!(journal.signer, signed.signer);
        assert_eq!(journal.digest, message.digest());
    }
}

#[test]
fn requests_are_independent_and_repeatable() {
    let (signed, _) = signed_transfers(2);
    let request = AttestationRequest::for_segment(&signed, 1).unwrap();
    let first = execute(&request).unwrap();
    let second = execute(&request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn foreign_signature_never_yields_a_journal() {
    let (signed, _) = signed_transfers(2);
    let (foreign, _) = signed_transfers(2);
    let request = AttestationRequest {
        signer: signed.signer,
        signature: foreign.signature,
        buffer: signed.concat.buffer().clone(),
        range: signed.concat.ranges()[0],
    };
    assert!(matches!(
        execute(&request).unwrap_err(),
        CoreError::SignatureInvalid(_)
    ));
}

#[test]
fn attestor_rejects_doomed_requests_before_proving() {
    // Pre-flight runs even though the ELF here may be a placeholder; the
    // request fails on range validation before any prover is contacted.
    if should_skip_due_to_missing_methods() {
        return;
    }
    let (signed, _) = signed_transfers(1);
    let mut request = AttestationRequest::for_segment(&signed, 0).unwrap();
    request.range = ByteRange {
        start: 0,
        end: signed.concat.len() + 10,
    };
    let attestor = SliceAttestor::new(SIGSLICE_GUEST_ELF, image_id_bytes(SIGSLICE_GUEST_ID));
    let err = attestor.attest(&request).unwrap_err();
    assert!(
        matches!(
            err,
            ProverError::Core(CoreError::RangeOutOfBounds { .. })
                | ProverError::MethodsNotEmbedded(_)
        ),
        "{err}"
    );
}

// =============================================================================
// Verifier negative paths (no proving)
// =============================================================================

#[test]
fn verifier_rejects_fabricated_attestations() {
    let verifier = AttestationVerifier::new([3u8; 32]);
    let journal = Journal {
        signer: Address::from([0xaa; 20]),
        digest: alloy_primitives::B256::from([0xbb; 32]),
    };
    let fabricated = Attestation {
        program_id: [3u8; 32],
        journal: journal.encode().to_vec(),
        seal: b"not a receipt".to_vec(),
    };
    assert!(!verifier.verify(&fabricated, journal.signer, journal.digest));
}

#[test]
fn verifier_rejects_wrong_program_id_before_touching_the_seal() {
    let verifier = AttestationVerifier::new([3u8; 32]);
    let fabricated = Attestation {
        program_id: [4u8; 32],
        journal: vec![0u8; 52],
        seal: Vec::new(),
    };
    assert!(!verifier.verify(&fabricated, Address::ZERO, alloy_primitives::B256::ZERO));
}

// =============================================================================
// Proving end-to-end (requires embedded methods)
// =============================================================================

#[test]
fn proven_attestation_verifies_and_tampering_fails() {
    if should_skip_due_to_missing_methods() {
        return;
    }

    let (signed, messages) = signed_transfers(2);
    let image_id = image_id_bytes(SIGSLICE_GUEST_ID);
    let attestor = SliceAttestor::new(SIGSLICE_GUEST_ELF, image_id);
    let request = AttestationRequest::for_segment(&signed, 1).unwrap();

    let attestation = match attestor.attest(&request) {
        Ok(attestation) => attestation,
        Err(e) if should_skip_due_to_r0vm_mismatch(&e) => {
            eprintln!("Skipping: {e}");
            return;
        }
        Err(e) => panic!("attestation failed: {e}"),
    };
    assert_eq!(attestation.program_id, image_id);
    assert_eq!(attestation.journal.len(), 52);

    let verifier = AttestationVerifier::new(image_id);
    assert!(verifier.verify(&attestation, signed.signer, messages[1].digest()));

    // Wrong expected digest: the other message's.
    assert!(!verifier.verify(&attestation, signed.signer, messages[0].digest()));

    // Wrong expected signer.
    assert!(!verifier.verify(&attestation, Address::from([9u8; 20]), messages[1].digest()));

    // Tampered journal bytes no longer match the receipt.
    let mut tampered = attestation.clone();
    tampered.journal[0] ^= 0x01;
    assert!(!verifier.verify(&tampered, signed.signer, messages[1].digest()));

    // A verifier expecting a different program rejects outright.
    let other_verifier = AttestationVerifier::new([7u8; 32]);
    assert!(!other_verifier.verify(&attestation, signed.signer, messages[1].digest()));
}

#[test]
fn off_by_one_range_never_becomes_an_attestation() {
    if should_skip_due_to_missing_methods() {
        return;
    }

    let (signed, _) = signed_transfers(2);
    let attestor = SliceAttestor::new(SIGSLICE_GUEST_ELF, image_id_bytes(SIGSLICE_GUEST_ID));
    let mut request = AttestationRequest::for_segment(&signed, 1).unwrap();
    request.range.start += 1;

    let err = attestor.attest(&request).unwrap_err();
    assert!(
        matches!(err, ProverError::Core(CoreError::SliceNotCanonical(_))),
        "{err}"
    );
}

#[test]
fn three_message_ranges_partition_and_attest_independently() {
    // Three messages concatenated in order partition the buffer; attesting
    // the middle range yields the middle digest.
    let (signed, messages) = signed_transfers(3);
    let ranges = signed.concat.ranges();
    assert_eq!(ranges[0].start, 0);
    assert_eq!(ranges[1].start, ranges[0].end);
    assert_eq!(ranges[2].start, ranges[1].end);
    assert_eq!(ranges[2].end, signed.concat.len());

    let request = AttestationRequest {
        signer: signed.signer,
        signature: signed.signature,
        buffer: Bytes::from(signed.concat.buffer().to_vec()),
        range: ranges[1],
    };
    let journal = execute(&request).unwrap();
    assert_eq!(journal.digest, messages[1].digest());
}
