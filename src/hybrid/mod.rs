/*!
 * Hybrid Key Derivation
 *
 * Combines classical, post-quantum, and QKD-derived shared secrets into
 * fixed-length session keys through a single deterministic extract-and-expand
 * step. A session key remains secure as long as at least one of its input
 * secrets does, which is the point of hybridization during the transition to
 * post-quantum cryptography.
 */

mod deriver;

#[cfg(test)]
mod tests;

pub use deriver::{
    derive_session_key, Provenance, SessionKey, SharedSecret, SESSION_KEY_LEN,
};
