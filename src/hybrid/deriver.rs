//! Provenance-tagged secrets and the session-key derivation function

use std::fmt;

use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

/// Length of a derived session key in bytes
pub const SESSION_KEY_LEN: usize = 32;

/// Domain-separation salt for the session-key derivation
const HYBRID_KDF_SALT: &[u8] = b"qkforge/hybrid-kdf/v1";

/// Where a shared secret came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    Classical,
    PostQuantum,
    Qkd,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Classical => write!(f, "classical"),
            Provenance::PostQuantum => write!(f, "post-quantum"),
            Provenance::Qkd => write!(f, "qkd"),
        }
    }
}

/// A provenance-tagged shared secret.
///
/// Secrets are single-use inputs to derivation; the byte length is whatever
/// the producing provider emits. Contents are zeroed on drop and never appear
/// in `Debug` output.
#[derive(Debug, Clone)]
pub struct SharedSecret {
    provenance: Provenance,
    bytes: SecureBytes,
}

impl SharedSecret {
    pub fn new(provenance: Provenance, bytes: Vec<u8>) -> Self {
        Self {
            provenance,
            bytes: SecureBytes::new(bytes),
        }
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A fixed-length symmetric session key with a derivation-input manifest.
///
/// The manifest records which provenance tags contributed to the derivation,
/// for audit; it carries no secret material. Key bytes are zeroed on drop.
#[derive(Clone)]
pub struct SessionKey {
    bytes: [u8; SESSION_KEY_LEN],
    manifest: Vec<Provenance>,
}

impl SessionKey {
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.bytes
    }

    /// Which provenance tags contributed, in canonical derivation order
    pub fn manifest(&self) -> &[Provenance] {
        &self.manifest
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey(32 bytes, manifest: {:?})", self.manifest)
    }
}

impl Zeroize for SessionKey {
    fn zeroize(&mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Derive a session key from up to three provenance-tagged secrets.
///
/// Inputs are concatenated in the fixed canonical order classical, then
/// post-quantum, then QKD, with missing inputs contributing zero bytes, and
/// passed through HKDF-SHA256 with the context string as the expansion info.
/// Identical ordered inputs and context always yield the same key.
///
/// # Errors
///
/// * No input present at all: there is no secret material to derive from.
/// * An input carries a provenance tag that does not match its slot.
///
/// # Example
///
/// ```
/// use qkforge::hybrid::{derive_session_key, Provenance, SharedSecret};
///
/// let classical = SharedSecret::new(Provenance::Classical, vec![1u8; 32]);
/// let pq = SharedSecret::new(Provenance::PostQuantum, vec![2u8; 32]);
/// let key = derive_session_key(Some(&classical), Some(&pq), None, b"session-1").unwrap();
/// assert_eq!(key.manifest(), &[Provenance::Classical, Provenance::PostQuantum]);
/// ```
pub fn derive_session_key(
    classical: Option<&SharedSecret>,
    post_quantum: Option<&SharedSecret>,
    qkd: Option<&SharedSecret>,
    context: &[u8],
) -> CryptoResult<SessionKey> {
    if classical.is_none() && post_quantum.is_none() && qkd.is_none() {
        return Err(CryptoError::invalid_configuration(
            "derivation_inputs",
            "at least one shared secret",
            "none",
            error_codes::NO_DERIVATION_INPUTS,
        ));
    }

    check_slot(classical, Provenance::Classical)?;
    check_slot(post_quantum, Provenance::PostQuantum)?;
    check_slot(qkd, Provenance::Qkd)?;

    let mut manifest = Vec::with_capacity(3);
    let mut ikm = Zeroizing::new(Vec::new());
    for secret in [classical, post_quantum, qkd].into_iter().flatten() {
        ikm.extend_from_slice(secret.as_bytes());
        manifest.push(secret.provenance());
    }

    let hk = Hkdf::<Sha256>::new(Some(HYBRID_KDF_SALT), &ikm);
    let mut okm = [0u8; SESSION_KEY_LEN];
    hk.expand(context, &mut okm).map_err(|_| {
        CryptoError::primitive_failure(
            "hkdf_expand",
            "requested output length invalid for HKDF-SHA256",
            error_codes::AEAD_ENCRYPTION_FAILED,
        )
    })?;

    Ok(SessionKey {
        bytes: okm,
        manifest,
    })
}

fn check_slot(secret: Option<&SharedSecret>, expected: Provenance) -> CryptoResult<()> {
    if let Some(secret) = secret {
        if secret.provenance() != expected {
            return Err(CryptoError::invalid_configuration(
                "derivation_inputs",
                &format!("secret with {} provenance", expected),
                &format!("{}", secret.provenance()),
                error_codes::PROVENANCE_MISMATCH,
            ));
        }
    }
    Ok(())
}
