//! Crash Point Commitment
//!
//! At launch the engine publishes a digest of the hidden crash point and
//! reveals the value (plus salt) once the round ends. Anyone holding the
//! revealed values can recompute the digest and confirm the crash point was
//! fixed before the curve started.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type CommitmentHash = [u8; 32];

/// Deterministic hasher with a domain separator.
///
/// Order of updates is critical for determinism.
pub struct CommitmentHasher {
    hasher: Sha256,
}

impl CommitmentHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for crash point commitments.
    pub fn for_crash_point() -> Self {
        Self::new(b"DIVE_CONTROL_CRASH_V1")
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an f64 value (bit pattern, little-endian).
    #[inline]
    pub fn update_f64(&mut self, value: f64) {
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> CommitmentHash {
        self.hasher.finalize().into()
    }
}

/// Published commitment to a round's crash point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Round the commitment belongs to.
    pub round_id: u64,
    /// `sha256(domain ‖ round_id ‖ crash_point ‖ salt)`.
    pub digest: CommitmentHash,
}

impl Commitment {
    /// Hex form for logs and narration.
    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Values disclosed when a round ends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reveal {
    /// Round identifier.
    pub round_id: u64,
    /// Crash point that was committed.
    pub crash_point: f64,
    /// Salt mixed into the digest.
    pub salt: u64,
}

/// Commit to a crash point.
pub fn commit_crash_point(round_id: u64, crash_point: f64, salt: u64) -> Commitment {
    let mut hasher = CommitmentHasher::for_crash_point();
    hasher.update_u64(round_id);
    hasher.update_f64(crash_point);
    hasher.update_u64(salt);

    Commitment {
        round_id,
        digest: hasher.finalize(),
    }
}

/// Check a reveal against its commitment.
pub fn verify_commitment(commitment: &Commitment, reveal: &Reveal) -> bool {
    commitment.round_id == reveal.round_id
        && commit_crash_point(reveal.round_id, reveal.crash_point, reveal.salt) == *commitment
}
