//! Core deterministic primitives.
//!
//! Randomness, commitment hashing and decimal precision. Nothing here knows
//! about rounds or bets.

pub mod rng;
pub mod hash;
pub mod precision;

// Re-export core types
pub use rng::{DeterministicRng, RandomSource, SequenceRng};
pub use hash::{Commitment, Reveal, commit_crash_point, verify_commitment};
pub use precision::{round_to, floor_to, depth_metres};
