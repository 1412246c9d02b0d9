//! Shared types between the sigslice Risc0 guest and host.
//!
//! These types define the interface for attestation generation and
//! verification, plus [`execute`], the pure attestation engine both sides
//! run: the guest to produce the committed journal inside the zkVM, the
//! host as a fail-closed pre-flight before paying for proving.

use alloy_primitives::{Address, Bytes, Signature, B256};
use serde::{Deserialize, Serialize};

use sigslice_core::concat::{ByteRange, SignedConcatenation};
use sigslice_core::signing::{verify_signature, ATTESTATION_MODE};
use sigslice_core::typed_data::TypedMessage;
use sigslice_core::{CoreError, Result};

/// Input provided to the Risc0 guest (private witness).
///
/// Preconditions:
/// - `buffer` holds the exact bytes the signature was produced over
/// - `range` indexes one canonical message inside `buffer`
///
/// Each request is independent and side-effect-free; identical requests
/// produce identical journals, so at-least-once retries are safe.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AttestationRequest {
    /// Address expected to have signed `buffer`.
    pub signer: Address,

    /// 65-byte ECDSA signature over `buffer` under the fixed
    /// personal-message mode.
    pub signature: Signature,

    /// The full signed concatenation buffer.
    pub buffer: Bytes,

    /// The `[start, end)` slice whose digest is being attested.
    pub range: ByteRange,
}

impl AttestationRequest {
    /// Build the request for the `index`-th segment of a signed
    /// concatenation.
    pub fn for_segment(signed: &SignedConcatenation, index: usize) -> Result<Self> {
        let range = signed
            .concat
            .ranges()
            .get(index)
            .copied()
            .ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "segment index {index} out of bounds for {} segments",
                    signed.concat.ranges().len()
                ))
            })?;
        Ok(Self {
            signer: signed.signer,
            signature: signed.signature,
            buffer: signed.concat.buffer().clone(),
            range,
        })
    }
}

/// Byte length of an encoded journal: 20-byte signer ∥ 32-byte digest.
pub const JOURNAL_LEN: usize = 52;

/// Output committed by the Risc0 guest (public journal).
///
/// Postconditions:
/// - `signer` signed the witness buffer under the fixed mode
/// - `digest` is the EIP-712 digest of the canonical slice at the witness
///   range
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Journal {
    pub signer: Address,
    pub digest: B256,
}

impl Journal {
    /// Fixed-width wire encoding: `signer ∥ digest`, no delimiters, no
    /// padding. This is the byte layout on-chain consumers re-encode and
    /// compare against.
    pub fn encode(&self) -> [u8; JOURNAL_LEN] {
        let mut out = [0u8; JOURNAL_LEN];
        out[..20].copy_from_slice(self.signer.as_slice());
        out[20..].copy_from_slice(self.digest.as_slice());
        out
    }

    /// Decode a fixed-width journal; the length must be exact.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != JOURNAL_LEN {
            return Err(CoreError::InvalidInput(format!(
                "journal must be {JOURNAL_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            signer: Address::from_slice(&bytes[..20]),
            digest: B256::from_slice(&bytes[20..]),
        })
    }
}

/// A produced attestation: which program ran, what it committed, and the
/// opaque proof that it ran faithfully.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attestation {
    /// Image ID of the guest program that produced the proof. Attestations
    /// are only meaningful checked against the expected identifier.
    pub program_id: [u8; 32],

    /// The committed journal bytes ([`Journal::encode`] layout).
    pub journal: Vec<u8>,

    /// Opaque serialized receipt; verified, never interpreted.
    pub seal: Vec<u8>,
}

/// The attestation engine: verify the signature over the full buffer,
/// bound-check the range, and re-derive the slice's digest.
///
/// Failure is fatal for this request only and never yields a partial
/// journal:
/// - [`CoreError::SignatureInvalid`] — signature does not resolve to
///   `signer` over exactly `buffer`;
/// - [`CoreError::RangeOutOfBounds`] — range does not fit the buffer;
/// - [`CoreError::SliceNotCanonical`] — the slice does not parse and
///   re-canonicalize to its own bytes (no best-effort recovery).
pub fn execute(request: &AttestationRequest) -> Result<Journal> {
    verify_signature(
        &request.buffer,
        &request.signature,
        request.signer,
        ATTESTATION_MODE,
    )?;

    let ByteRange { start, end } = request.range;
    if start > end || end > request.buffer.len() {
        return Err(CoreError::RangeOutOfBounds {
            start,
            end,
            len: request.buffer.len(),
        });
    }

    let slice = &request.buffer[start..end];
    let text = std::str::from_utf8(slice)
        .map_err(|_| CoreError::SliceNotCanonical("slice is not valid UTF-8".into()))?;
    let message = TypedMessage::from_json(text).map_err(|e| {
        CoreError::SliceNotCanonical(format!("slice does not parse as typed data: {e}"))
    })?;
    if message.canonical_json().as_bytes() != slice {
        return Err(CoreError::SliceNotCanonical(
            "slice differs from the re-canonicalization of its own content".into(),
        ));
    }

    Ok(Journal {
        signer: request.signer,
        digest: message.digest(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_signer_local::PrivateKeySigner;
    use serde_json::{json, Map};
    use sigslice_core::concat::Concatenation;
    use sigslice_core::signing::sign_concatenation;
    use sigslice_core::typed_data::{Eip712Domain, FieldDef, TypeSchema};

    fn memo(note: &str, nonce: u64) -> TypedMessage {
        let mut schema = TypeSchema::new();
        schema
            .define(
                "Memo",
                vec![
                    FieldDef::new("note", "string").unwrap(),
                    FieldDef::new("nonce", "uint256").unwrap(),
                ],
            )
            .unwrap();
        let domain = Eip712Domain {
            name: Some("memo".into()),
            version: Some("1".into()),
            ..Default::default()
        };
        let mut map = Map::new();
        map.insert("note".into(), json!(note));
        map.insert("nonce".into(), json!(nonce));
        TypedMessage::new(schema, "Memo", domain, map).unwrap()
    }

    fn signed_memos(notes: &[&str]) -> (SignedConcatenation, Vec<TypedMessage>) {
        let messages: Vec<TypedMessage> = notes
            .iter()
            .enumerate()
            .map(|(i, note)| memo(note, i as u64))
            .collect();
        let concat = Concatenation::build(&messages).unwrap();
        let key = PrivateKeySigner::random();
        (sign_concatenation(concat, &key).unwrap(), messages)
    }

    #[test]
    fn attests_each_segment_to_its_own_digest() {
        let (signed, messages) = signed_memos(&["first", "second", "third"]);
        for (i, message) in messages.iter().enumerate() {
            let request = AttestationRequest::for_segment(&signed, i).unwrap();
            let journal = execute(&request).unwrap();
            assert_eq!(journal.signer, signed.signer);
            assert_eq!(journal.digest, message.digest());
        }
    }

    #[test]
    fn off_by_one_range_is_not_canonical() {
        let (signed, _) = signed_memos(&["first", "second"]);
        let mut request = AttestationRequest::for_segment(&signed, 1).unwrap();
        request.range.start += 1;
        let err = execute(&request).unwrap_err();
        assert!(matches!(err, CoreError::SliceNotCanonical(_)), "{err}");
    }

    #[test]
    fn range_spanning_two_segments_is_not_canonical() {
        let (signed, _) = signed_memos(&["first", "second"]);
        let full = ByteRange {
            start: 0,
            end: signed.concat.len(),
        };
        let request = AttestationRequest {
            signer: signed.signer,
            signature: signed.signature,
            buffer: signed.concat.buffer().clone(),
            range: full,
        };
        let err = execute(&request).unwrap_err();
        assert!(matches!(err, CoreError::SliceNotCanonical(_)), "{err}");
    }

    #[test]
    fn range_past_buffer_end_is_out_of_bounds() {
        let (signed, _) = signed_memos(&["only"]);
        let mut request = AttestationRequest::for_segment(&signed, 0).unwrap();
        request.range.end = signed.concat.len() + 1;
        let err = execute(&request).unwrap_err();
        assert!(matches!(err, CoreError::RangeOutOfBounds { .. }), "{err}");
    }

    #[test]
    fn inverted_range_is_out_of_bounds() {
        let (signed, _) = signed_memos(&["only"]);
        let mut request = AttestationRequest::for_segment(&signed, 0).unwrap();
        request.range = ByteRange { start: 5, end: 2 };
        let err = execute(&request).unwrap_err();
        assert!(matches!(err, CoreError::RangeOutOfBounds { .. }), "{err}");
    }

    #[test]
    fn signature_over_a_different_buffer_is_rejected() {
        let (signed_a, _) = signed_memos(&["aaa"]);
        let (signed_b, _) = signed_memos(&["bbb"]);
        let request = AttestationRequest {
            signer: signed_a.signer,
            signature: signed_a.signature,
            buffer: signed_b.concat.buffer().clone(),
            range: signed_b.concat.ranges()[0],
        };
        let err = execute(&request).unwrap_err();
        assert!(matches!(err, CoreError::SignatureInvalid(_)), "{err}");
    }

    #[test]
    fn flipping_a_byte_outside_the_range_is_rejected() {
        // The signature covers the whole buffer, so bytes outside the
        // attested range are still load-bearing.
        let (signed, _) = signed_memos(&["first", "second"]);
        let mut request = AttestationRequest::for_segment(&signed, 1).unwrap();
        let mut tampered = request.buffer.to_vec();
        tampered[0] ^= 0x01;
        request.buffer = Bytes::from(tampered);
        let err = execute(&request).unwrap_err();
        assert!(matches!(err, CoreError::SignatureInvalid(_)), "{err}");
    }

    #[test]
    fn journal_encoding_round_trips_at_fixed_width() {
        let journal = Journal {
            signer: Address::from([0x11; 20]),
            digest: B256::from([0x22; 32]),
        };
        let encoded = journal.encode();
        assert_eq!(encoded.len(), JOURNAL_LEN);
        assert_eq!(&encoded[..20], [0x11; 20]);
        assert_eq!(&encoded[20..], [0x22; 32]);
        assert_eq!(Journal::decode(&encoded).unwrap(), journal);
    }

    #[test]
    fn journal_decode_rejects_wrong_length() {
        assert!(Journal::decode(&[0u8; 51]).is_err());
        assert!(Journal::decode(&[0u8; 53]).is_err());
    }

    #[test]
    fn request_serializes_for_the_guest_boundary() {
        let (signed, _) = signed_memos(&["only"]);
        let request = AttestationRequest::for_segment(&signed, 0).unwrap();
        let bytes = bincode::serialize(&request).unwrap();
        let decoded: AttestationRequest = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn segment_index_out_of_bounds_is_invalid_input() {
        let (signed, _) = signed_memos(&["only"]);
        let err = AttestationRequest::for_segment(&signed, 1).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)), "{err}");
    }
}
