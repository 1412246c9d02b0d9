//! Ordered concatenation of canonicalized messages with range bookkeeping.
//!
//! The builder joins canonical byte strings with no delimiter and records
//! each message's `[start, end)` range as running offsets. Message order is
//! caller-controlled and is part of what gets signed: changing the order
//! changes the signed bytes and invalidates previously computed ranges.
//! There is no deduplication and no reordering.

use alloy_primitives::{Address, Bytes, Signature};
use serde::{Deserialize, Serialize};

use crate::typed_data::TypedMessage;
use crate::{CoreError, Result};

/// Half-open byte range `[start, end)` into a concatenation buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A delimiter-free concatenation of canonical message bytes plus the
/// recorded range of each segment.
///
/// Invariants (enforced by [`Concatenation::build`]):
/// - ranges are contiguous in declared order: `end_i == start_{i+1}`;
/// - `start_0 == 0` and `end_last == buffer.len()`;
/// - every segment is the canonical JSON of exactly one message.
#[derive(Clone, Debug, PartialEq)]
pub struct Concatenation {
    buffer: Bytes,
    ranges: Vec<ByteRange>,
}

impl Concatenation {
    /// Canonicalize `messages` in the given order and concatenate them.
    ///
    /// Building twice from logically identical input yields byte-identical
    /// output; the attestation engine depends on being able to re-derive
    /// the exact same bytes per range.
    pub fn build(messages: &[TypedMessage]) -> Result<Self> {
        if messages.is_empty() {
            return Err(CoreError::InvalidInput(
                "cannot build a concatenation from zero messages".into(),
            ));
        }
        let mut buffer = Vec::new();
        let mut ranges = Vec::with_capacity(messages.len());
        for message in messages {
            let start = buffer.len();
            buffer.extend_from_slice(message.canonical_json().as_bytes());
            ranges.push(ByteRange {
                start,
                end: buffer.len(),
            });
        }
        Ok(Self {
            buffer: Bytes::from(buffer),
            ranges,
        })
    }

    /// The full concatenation buffer: the exact bytes to sign.
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    /// Recorded `[start, end)` ranges, one per message, in build order.
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The bytes of the `index`-th segment, if any.
    pub fn segment(&self, index: usize) -> Option<&[u8]> {
        let range = self.ranges.get(index)?;
        self.buffer.get(range.start..range.end)
    }
}

/// A concatenation bound to the identity that signed its buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedConcatenation {
    pub concat: Concatenation,
    pub signer: Address,
    pub signature: Signature,
}

/// Re-derive the byte ranges of concatenated JSON objects in a buffer by
/// matching braces.
///
/// Handles nested objects and ignores braces inside JSON string literals
/// (with escape handling). Any holder of a signed buffer can recompute the
/// same ranges the builder recorded without the original messages.
pub fn find_concatenated_json_ranges(input: &str) -> Result<Vec<ByteRange>> {
    let mut ranges = Vec::new();
    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escape = false;
    let mut current_start = None;

    for (idx, ch) in input.char_indices() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    current_start = Some(idx);
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    return Err(CoreError::InvalidInput(format!(
                        "unmatched closing brace at byte {idx}"
                    )));
                }
                depth -= 1;
                if depth == 0 {
                    let start = current_start.take().ok_or_else(|| {
                        CoreError::InvalidInput(format!(
                            "missing start for JSON object ending at byte {idx}"
                        ))
                    })?;
                    ranges.push(ByteRange {
                        start,
                        end: idx + ch.len_utf8(),
                    });
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(CoreError::InvalidInput(format!(
            "unclosed JSON object(s); brace depth at end is {depth}"
        )));
    }
    Ok(ranges)
}
