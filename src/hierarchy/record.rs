//! Key records: the metadata arena entries of the hierarchy DAG

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a key lineage (all generations share the id)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct KeyId(Uuid);

impl KeyId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a key within the wrapping hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRole {
    Root,
    Kek,
    Dek,
}

/// Lifecycle state of a single key generation.
///
/// `Active` serves new wraps; `Rotating` is still valid for decrypt during
/// the grace period but never for new wraps; `Retired` is terminal and kept
/// for audit until an explicit purge; `Compromised` marks material that must
/// not be trusted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyState {
    Active,
    Rotating,
    Retired,
    Compromised,
}

/// Reference to the (id, generation) a key is wrapped under.
///
/// `legacy` flags a wrapping that intentionally points at a non-root ancestor
/// kept for backward compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapRef {
    pub key_id: KeyId,
    pub generation: u64,
    pub legacy: bool,
}

impl fmt::Display for WrapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/gen-{}", self.key_id, self.generation)
    }
}

/// Ciphertext wrapping of key material.
///
/// KEKs wrapped under a root carry the KEM ciphertext alongside the AEAD
/// blob; DEKs wrapped under a KEK carry the AEAD blob alone. The bytes are
/// opaque to the hierarchy and only compared for the crypto-agility
/// guarantee (an untouched wrap keeps identical bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedMaterial {
    pub kem_ciphertext: Option<Vec<u8>>,
    /// AEAD blob: nonce followed by ciphertext and tag
    pub sealed: Vec<u8>,
}

/// One generation of a key: the unit of the hierarchy arena.
///
/// Everything here is metadata; the raw key material lives separately inside
/// the manager and never leaves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: KeyId,
    pub role: KeyRole,
    /// Names the scheme and backend that produced the material
    pub algorithm_tag: String,
    /// Strictly increasing per id, never reused
    pub generation: u64,
    pub state: KeyState,
    pub wrapped_under: Option<WrapRef>,
    /// Shard or time-window scope for DEKs
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// When this generation entered `Rotating`
    pub rotating_since: Option<DateTime<Utc>>,
    /// How many wraps this generation has served (drives usage-based rotation)
    pub usage_count: u64,
    pub wrap: Option<WrappedMaterial>,
}

impl KeyRecord {
    /// Whether this generation may serve new wraps
    pub fn is_wrappable(&self) -> bool {
        matches!(self.state, KeyState::Active)
    }

    /// Whether this generation may still be used to unwrap (decrypt)
    pub fn is_live(&self) -> bool {
        matches!(self.state, KeyState::Active | KeyState::Rotating)
    }
}
