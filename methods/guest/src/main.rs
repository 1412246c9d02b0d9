//! sigslice Risc0 guest program.
//!
//! Runs inside the Risc0 zkVM and proves that:
//! 1. The witness signature was produced by the witness signer over
//!    exactly the witness buffer (EIP-191 personal mode)
//! 2. The witness range selects a canonical typed-data slice of that
//!    buffer
//! 3. The committed digest is the EIP-712 digest of that slice
//!
//! Only the 52-byte `(signer, digest)` journal becomes public; the
//! signature, the buffer, and the other messages it contains stay private
//! to the proof.

use risc0_zkvm::guest::env;
use sigslice_risc0_shared::{execute, AttestationRequest};

fn main() {
    // Read the private witness from the host
    let request: AttestationRequest = env::read();

    // Any engine failure aborts the guest: an attestation that cannot be
    // truthfully committed is simply never produced.
    let journal = execute(&request).expect("attestation request rejected");

    env::commit_slice(&journal.encode());
}
