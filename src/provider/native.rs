//! Native provider backed by liboqs
//!
//! Uses Kyber768 for key encapsulation and Dilithium3 for signatures through
//! the `oqs` crate, with the same X25519 classical exchange and AES-256-GCM
//! AEAD as the stub. Only compiled with the `native` cargo feature, mirroring
//! the optional nature of the native library dependency.

use oqs::kem;
use oqs::sig;

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::hybrid::{Provenance, SharedSecret};
use crate::provider::{aes_gcm_open, aes_gcm_seal, KemKeyPair, PrimitiveProvider};
use crate::secure_memory::SecureBytes;

const ALGORITHM_TAG: &str = "oqs-kyber768";

/// liboqs-backed provider (Kyber768 + Dilithium3)
pub struct NativeProvider {
    kem_algorithm: kem::Algorithm,
    sig_algorithm: sig::Algorithm,
}

impl NativeProvider {
    /// Initialize liboqs and check that the configured algorithms are enabled
    pub fn new() -> CryptoResult<Self> {
        oqs::init();
        let provider = Self {
            kem_algorithm: kem::Algorithm::Kyber768,
            sig_algorithm: sig::Algorithm::Dilithium3,
        };
        // Probe once so a misbuilt liboqs fails at construction, not mid-run
        provider.kem()?;
        provider.sig()?;
        Ok(provider)
    }

    fn kem(&self) -> CryptoResult<kem::Kem> {
        kem::Kem::new(self.kem_algorithm).map_err(|e| {
            CryptoError::primitive_failure(
                "kem_init",
                &format!("liboqs rejected {:?}: {}", self.kem_algorithm, e),
                error_codes::BACKEND_UNAVAILABLE,
            )
        })
    }

    fn sig(&self) -> CryptoResult<sig::Sig> {
        sig::Sig::new(self.sig_algorithm).map_err(|e| {
            CryptoError::primitive_failure(
                "sig_init",
                &format!("liboqs rejected {:?}: {}", self.sig_algorithm, e),
                error_codes::BACKEND_UNAVAILABLE,
            )
        })
    }
}

impl PrimitiveProvider for NativeProvider {
    fn name(&self) -> &'static str {
        "native"
    }

    fn classical_key_exchange(&self) -> CryptoResult<SharedSecret> {
        let shared = crate::provider::x25519_exchange()?;
        Ok(SharedSecret::new(Provenance::Classical, shared.to_vec()))
    }

    fn kem_keypair(&self) -> CryptoResult<KemKeyPair> {
        let kem = self.kem()?;
        let (public_key, secret_key) = kem.keypair().map_err(|e| {
            CryptoError::primitive_failure(
                "kem_keypair",
                &format!("key generation failed: {}", e),
                error_codes::KEM_KEYGEN_FAILED,
            )
        })?;
        Ok(KemKeyPair {
            public_key: public_key.into_vec(),
            secret_key: SecureBytes::new(secret_key.into_vec()),
            algorithm: ALGORITHM_TAG.to_string(),
        })
    }

    fn kem_encapsulate(&self, public_key: &[u8]) -> CryptoResult<(Vec<u8>, SharedSecret)> {
        let kem = self.kem()?;
        let public_key = kem.public_key_from_bytes(public_key).ok_or_else(|| {
            CryptoError::primitive_failure(
                "kem_encapsulate",
                "malformed public key for Kyber768",
                error_codes::KEM_ENCAPSULATION_FAILED,
            )
        })?;
        let (ciphertext, shared_secret) = kem.encapsulate(public_key).map_err(|e| {
            CryptoError::primitive_failure(
                "kem_encapsulate",
                &format!("encapsulation failed: {}", e),
                error_codes::KEM_ENCAPSULATION_FAILED,
            )
        })?;
        Ok((
            ciphertext.into_vec(),
            SharedSecret::new(Provenance::PostQuantum, shared_secret.into_vec()),
        ))
    }

    fn kem_decapsulate(&self, secret_key: &[u8], ciphertext: &[u8]) -> CryptoResult<SharedSecret> {
        let kem = self.kem()?;
        let secret_key = kem.secret_key_from_bytes(secret_key).ok_or_else(|| {
            CryptoError::primitive_failure(
                "kem_decapsulate",
                "malformed secret key for Kyber768",
                error_codes::KEM_DECAPSULATION_FAILED,
            )
        })?;
        let ciphertext = kem.ciphertext_from_bytes(ciphertext).ok_or_else(|| {
            CryptoError::primitive_failure(
                "kem_decapsulate",
                "malformed ciphertext for Kyber768",
                error_codes::KEM_DECAPSULATION_FAILED,
            )
        })?;
        let shared_secret = kem.decapsulate(secret_key, ciphertext).map_err(|e| {
            CryptoError::primitive_failure(
                "kem_decapsulate",
                &format!("decapsulation failed: {}", e),
                error_codes::KEM_DECAPSULATION_FAILED,
            )
        })?;
        Ok(SharedSecret::new(
            Provenance::PostQuantum,
            shared_secret.into_vec(),
        ))
    }

    fn sign(&self, secret_key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>> {
        let sig = self.sig()?;
        let secret_key = sig.secret_key_from_bytes(secret_key).ok_or_else(|| {
            CryptoError::primitive_failure(
                "sign",
                "malformed secret key for Dilithium3",
                error_codes::SIGNING_FAILED,
            )
        })?;
        let signature = sig.sign(message, secret_key).map_err(|e| {
            CryptoError::primitive_failure(
                "sign",
                &format!("signing failed: {}", e),
                error_codes::SIGNING_FAILED,
            )
        })?;
        Ok(signature.into_vec())
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> CryptoResult<bool> {
        let sig = self.sig()?;
        let public_key = sig.public_key_from_bytes(public_key).ok_or_else(|| {
            CryptoError::primitive_failure(
                "verify",
                "malformed public key for Dilithium3",
                error_codes::VERIFICATION_FAILED,
            )
        })?;
        let signature = match sig.signature_from_bytes(signature) {
            Some(signature) => signature,
            None => return Ok(false),
        };
        Ok(sig.verify(message, signature, public_key).is_ok())
    }

    fn aead_encrypt(&self, key: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        aes_gcm_seal(key, plaintext, aad)
    }

    fn aead_decrypt(&self, key: &[u8], sealed: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        aes_gcm_open(key, sealed, aad)
    }
}
