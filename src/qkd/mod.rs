/*!
 * BB84 quantum key distribution simulation
 *
 * This module simulates the classical statistics of the BB84 protocol:
 * preparation of qubit events in random bases, measurement by the receiver,
 * optional intercept-resend eavesdropping, basis sifting, and estimation of
 * the quantum bit error rate (QBER) used to detect the eavesdropper.
 *
 * No quantum state vectors are modeled; measurement in a mismatched basis is
 * approximated by a uniformly random outcome, which reproduces the protocol's
 * detection statistics exactly.
 */

mod bb84;
mod qber;

#[cfg(test)]
mod tests;

pub use bb84::{Basis, CancelToken, ChannelRun, QkdChannel, QubitEvent, SiftedKey};
pub use qber::{evaluate_qber, QberEvaluation, QberReport, RejectReason, Verdict};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha3::{Digest, Sha3_256};

/// Derive a deterministic RNG from a session seed and a domain label.
///
/// All session-specific randomness (channel noise, QBER sampling) flows from
/// the caller-provided seed through distinct labels, so a single seed fully
/// reproduces a run while the two random streams stay independent.
pub fn derive_rng(seed: u64, label: &[u8]) -> ChaCha20Rng {
    let mut hasher = Sha3_256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(label);
    let digest = hasher.finalize();
    ChaCha20Rng::from_seed(digest.into())
}
