/*!
 * Primitive Providers
 *
 * All classical, post-quantum, and symmetric primitive operations the core
 * consumes flow through the [`PrimitiveProvider`] capability: classical key
 * exchange, KEM encapsulate/decapsulate, sign/verify, and AEAD seal/open.
 *
 * Two variants exist, selected by configuration rather than duck-typing: a
 * deterministic educational [`StubProvider`] that emulates key and ciphertext
 * sizes without real security, and a liboqs-backed `NativeProvider` behind
 * the `native` cargo feature. The [`ProviderChain`] composes them with an
 * explicit precedence rule and an observable record of which stage served
 * each request.
 */

mod chain;
#[cfg(feature = "native")]
mod native;
mod stub;

#[cfg(test)]
mod tests;

pub use chain::{ProviderChain, ProviderStage};
#[cfg(feature = "native")]
pub use native::NativeProvider;
pub use stub::StubProvider;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::hybrid::SharedSecret;
use crate::secure_memory::SecureBytes;
use crate::utils;

/// AES-256-GCM nonce length in bytes
const AEAD_NONCE_LEN: usize = 12;

/// A KEM key pair as raw encoded bytes.
///
/// The secret half zeroizes on drop; the algorithm tag names the concrete
/// scheme and backend (e.g. `stub-kyber768`) for key-record metadata.
#[derive(Debug, Clone)]
pub struct KemKeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: SecureBytes,
    pub algorithm: String,
}

/// Capability interface over cryptographic primitives.
///
/// Implementations must be safe to call from many threads; all methods are
/// synchronous and side-effect-free beyond returning secrets.
pub trait PrimitiveProvider: Send + Sync {
    /// Short name of the backend, used in logs and algorithm tags
    fn name(&self) -> &'static str;

    /// Perform a classical (elliptic-curve) key exchange and return the
    /// resulting shared secret with `Classical` provenance
    fn classical_key_exchange(&self) -> CryptoResult<SharedSecret>;

    /// Generate a fresh KEM key pair
    fn kem_keypair(&self) -> CryptoResult<KemKeyPair>;

    /// Derive a KEM key pair deterministically from seed material.
    ///
    /// Only backends whose key generation is a pure expansion of a seed can
    /// support this; others fail explicitly rather than silently substituting
    /// fresh randomness.
    fn kem_keypair_from_seed(&self, _seed: &[u8]) -> CryptoResult<KemKeyPair> {
        Err(CryptoError::primitive_failure(
            "kem_keypair_from_seed",
            &format!("{} backend cannot derive key pairs from seeds", self.name()),
            error_codes::SEEDED_KEYGEN_UNSUPPORTED,
        ))
    }

    /// Encapsulate a fresh shared secret to the given public key, returning
    /// the ciphertext and the secret with `PostQuantum` provenance
    fn kem_encapsulate(&self, public_key: &[u8]) -> CryptoResult<(Vec<u8>, SharedSecret)>;

    /// Recover the shared secret from a ciphertext with the secret key
    fn kem_decapsulate(&self, secret_key: &[u8], ciphertext: &[u8]) -> CryptoResult<SharedSecret>;

    /// Produce a signature over the message
    fn sign(&self, secret_key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Verify a signature; `Ok(false)` means a well-formed but invalid
    /// signature, errors are reserved for backend failures
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> CryptoResult<bool>;

    /// Authenticated encryption; the returned blob embeds the nonce
    fn aead_encrypt(&self, key: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Authenticated decryption; tag mismatch fails with
    /// `AEAD_AUTHENTICATION_FAILED`, never a silent fallback
    fn aead_decrypt(&self, key: &[u8], sealed: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// AES-256-GCM seal with a random nonce prefixed to the ciphertext.
///
/// Shared by the stub and native providers; both use the same AEAD.
pub(crate) fn aes_gcm_seal(key: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| {
        CryptoError::primitive_failure(
            "aead_encrypt",
            &format!("AES-256-GCM requires a 32-byte key, got {}", key.len()),
            error_codes::INVALID_KEY_SIZE,
        )
    })?;
    let nonce_bytes = utils::random_bytes(AEAD_NONCE_LEN)?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| {
            CryptoError::primitive_failure(
                "aead_encrypt",
                "AES-GCM encryption failed",
                error_codes::AEAD_ENCRYPTION_FAILED,
            )
        })?;

    let mut sealed = Vec::with_capacity(AEAD_NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// AES-256-GCM open for blobs produced by [`aes_gcm_seal`]
pub(crate) fn aes_gcm_open(key: &[u8], sealed: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < AEAD_NONCE_LEN {
        return Err(CryptoError::primitive_failure(
            "aead_decrypt",
            "sealed blob shorter than the nonce",
            error_codes::AEAD_AUTHENTICATION_FAILED,
        ));
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| {
        CryptoError::primitive_failure(
            "aead_decrypt",
            &format!("AES-256-GCM requires a 32-byte key, got {}", key.len()),
            error_codes::INVALID_KEY_SIZE,
        )
    })?;
    let (nonce_bytes, ciphertext) = sealed.split_at(AEAD_NONCE_LEN);
    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| {
            CryptoError::primitive_failure(
                "aead_decrypt",
                "authentication tag mismatch",
                error_codes::AEAD_AUTHENTICATION_FAILED,
            )
        })
}

/// X25519 exchange between two fresh ephemeral keys, yielding 32 shared bytes.
///
/// Models both endpoints of the classical exchange locally, which is all the
/// simulator needs.
pub(crate) fn x25519_exchange() -> CryptoResult<[u8; 32]> {
    let mut local = [0u8; 32];
    local.copy_from_slice(&utils::random_bytes(32)?);
    let mut remote = [0u8; 32];
    remote.copy_from_slice(&utils::random_bytes(32)?);

    // Clamping as per RFC 7748
    local[0] &= 248;
    local[31] &= 127;
    local[31] |= 64;

    let remote_public = x25519_dalek::x25519(remote, x25519_dalek::X25519_BASEPOINT_BYTES);
    Ok(x25519_dalek::x25519(local, remote_public))
}
