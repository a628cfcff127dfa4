//! Educational stub provider
//!
//! Emulates the key, ciphertext, and signature sizes of a Kyber768/Dilithium3
//! stack without implementing the real algorithms, so lifecycle and pipeline
//! behavior can be exercised without a native PQC library. NOT secure; the
//! KEM is a hash construction chosen only so that encapsulation and
//! decapsulation genuinely round-trip.

use sha3::{Digest, Sha3_256};

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::hybrid::{Provenance, SharedSecret};
use crate::provider::{aes_gcm_open, aes_gcm_seal, KemKeyPair, PrimitiveProvider};
use crate::secure_memory::SecureBytes;
use crate::utils;

/// Approximate Kyber768 public key size in bytes
pub const STUB_KEM_PUBLIC_KEY_LEN: usize = 1184;
/// Approximate Kyber768 secret key size in bytes
pub const STUB_KEM_SECRET_KEY_LEN: usize = 2400;
/// Approximate Kyber768 ciphertext size in bytes
pub const STUB_KEM_CIPHERTEXT_LEN: usize = 1088;
/// Shared secret size in bytes
pub const STUB_SHARED_SECRET_LEN: usize = 32;
/// Rough average Dilithium3 signature size in bytes
pub const STUB_SIGNATURE_LEN: usize = 2700;

const ALGORITHM_TAG: &str = "stub-kyber768";

/// Deterministic educational provider.
///
/// Key pairs are pure expansions of a 32-byte seed, which is what makes
/// seeded root creation possible on this backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubProvider;

impl StubProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Expand seed material into `len` bytes with a counter-mode SHA3 XOF
fn expand(domain: &[u8], seed: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut counter = 0u32;
    while out.len() < len {
        let mut hasher = Sha3_256::new();
        hasher.update(b"qkforge/stub/");
        hasher.update(domain);
        hasher.update(seed);
        hasher.update(counter.to_le_bytes());
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(len);
    out
}

fn derive_public_key(secret_key: &[u8]) -> Vec<u8> {
    expand(b"kem-pk", &secret_key[..32], STUB_KEM_PUBLIC_KEY_LEN)
}

fn shared_secret_for(public_key: &[u8], encap_randomness: &[u8]) -> Vec<u8> {
    let mut hasher = Sha3_256::new();
    hasher.update(b"qkforge/stub/kem-ss");
    hasher.update(public_key);
    hasher.update(encap_randomness);
    hasher.finalize().to_vec()
}

impl PrimitiveProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classical_key_exchange(&self) -> CryptoResult<SharedSecret> {
        let shared = crate::provider::x25519_exchange()?;
        Ok(SharedSecret::new(Provenance::Classical, shared.to_vec()))
    }

    fn kem_keypair(&self) -> CryptoResult<KemKeyPair> {
        let seed = utils::random_bytes(32)?;
        self.kem_keypair_from_seed(&seed)
    }

    fn kem_keypair_from_seed(&self, seed: &[u8]) -> CryptoResult<KemKeyPair> {
        if seed.is_empty() {
            return Err(CryptoError::invalid_configuration(
                "seed",
                "non-empty seed material",
                "empty",
                error_codes::INVALID_SEED_MATERIAL,
            ));
        }
        let secret_key = expand(b"kem-sk", seed, STUB_KEM_SECRET_KEY_LEN);
        let public_key = derive_public_key(&secret_key);
        Ok(KemKeyPair {
            public_key,
            secret_key: SecureBytes::new(secret_key),
            algorithm: ALGORITHM_TAG.to_string(),
        })
    }

    fn kem_encapsulate(&self, public_key: &[u8]) -> CryptoResult<(Vec<u8>, SharedSecret)> {
        if public_key.len() != STUB_KEM_PUBLIC_KEY_LEN {
            return Err(CryptoError::primitive_failure(
                "kem_encapsulate",
                &format!(
                    "expected {}-byte public key, got {}",
                    STUB_KEM_PUBLIC_KEY_LEN,
                    public_key.len()
                ),
                error_codes::KEM_ENCAPSULATION_FAILED,
            ));
        }
        let randomness = utils::random_bytes(32)?;
        let mut ciphertext = randomness.clone();
        ciphertext.extend_from_slice(&expand(
            b"kem-ct",
            &randomness,
            STUB_KEM_CIPHERTEXT_LEN - randomness.len(),
        ));
        let secret = shared_secret_for(public_key, &randomness);
        Ok((
            ciphertext,
            SharedSecret::new(Provenance::PostQuantum, secret),
        ))
    }

    fn kem_decapsulate(&self, secret_key: &[u8], ciphertext: &[u8]) -> CryptoResult<SharedSecret> {
        if secret_key.len() != STUB_KEM_SECRET_KEY_LEN {
            return Err(CryptoError::primitive_failure(
                "kem_decapsulate",
                &format!(
                    "expected {}-byte secret key, got {}",
                    STUB_KEM_SECRET_KEY_LEN,
                    secret_key.len()
                ),
                error_codes::KEM_DECAPSULATION_FAILED,
            ));
        }
        if ciphertext.len() != STUB_KEM_CIPHERTEXT_LEN {
            return Err(CryptoError::primitive_failure(
                "kem_decapsulate",
                &format!(
                    "expected {}-byte ciphertext, got {}",
                    STUB_KEM_CIPHERTEXT_LEN,
                    ciphertext.len()
                ),
                error_codes::KEM_DECAPSULATION_FAILED,
            ));
        }
        let public_key = derive_public_key(secret_key);
        let secret = shared_secret_for(&public_key, &ciphertext[..32]);
        Ok(SharedSecret::new(Provenance::PostQuantum, secret))
    }

    fn sign(&self, secret_key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>> {
        if secret_key.is_empty() {
            return Err(CryptoError::primitive_failure(
                "sign",
                "empty secret key",
                error_codes::SIGNING_FAILED,
            ));
        }
        let mut hasher = Sha3_256::new();
        hasher.update(secret_key);
        hasher.update(message);
        let digest = hasher.finalize();
        Ok(expand(b"sig", &digest, STUB_SIGNATURE_LEN))
    }

    fn verify(&self, _public_key: &[u8], _message: &[u8], signature: &[u8]) -> CryptoResult<bool> {
        // The stub cannot recompute a signature from the public key alone;
        // mirroring the educational contract, any size-correct signature
        // verifies.
        Ok(signature.len() == STUB_SIGNATURE_LEN)
    }

    fn aead_encrypt(&self, key: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        aes_gcm_seal(key, plaintext, aad)
    }

    fn aead_decrypt(&self, key: &[u8], sealed: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        aes_gcm_open(key, sealed, aad)
    }
}
