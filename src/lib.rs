/*!
 * QKForge Quantum-Safe Key Establishment Simulator
 *
 * This crate simulates quantum-safe hybrid key establishment and manages an
 * in-memory key lifecycle under crypto-agility constraints.
 *
 * The main components are:
 *
 * - A BB84 quantum-key-distribution channel simulator producing sifted keys
 *   and an eavesdropping-detection statistic (QBER)
 * - A hybrid key deriver combining classical, post-quantum, and QKD-derived
 *   secrets into session keys
 * - A key hierarchy manager driving root/KEK/DEK creation, rotation,
 *   re-wrapping, and compromise handling
 *
 * Cryptographic primitives are consumed through a provider capability with a
 * deterministic educational stub and an optional liboqs-backed native
 * backend, composed into an explicit two-stage chain.
 */

/// BB84 channel simulation and QBER evaluation
pub mod qkd;

/// Hybrid classical/post-quantum/QKD key derivation
pub mod hybrid;

/// Root/KEK/DEK lifecycle management
pub mod hierarchy;

/// Primitive provider capability and backends
pub mod provider;

/// Session establishment orchestration
pub mod protocol;

/// Grover/Shor analytical security estimators
pub mod attacks;

/// Configuration surface for all components
pub mod config;

/// Common error types
pub mod error;

/// Utilities for cryptographic operations
pub mod utils;

/// Secure memory handling utilities
pub mod secure_memory;

// Re-export main types for convenience
pub use config::{
    ChannelConfig, HierarchyConfig, ProviderSelection, QberConfig, RewrapPolicy,
    RotationInterval, SessionConfig, DEFAULT_QBER_THRESHOLD,
};
pub use error::{CryptoError, CryptoResult};
pub use hierarchy::{KeyHierarchy, KeyId, KeyRecord, KeyRole, KeyState};
pub use hybrid::{derive_session_key, Provenance, SessionKey, SharedSecret};
pub use protocol::{establish_session, SessionOutcome};
pub use provider::{PrimitiveProvider, ProviderChain, ProviderStage, StubProvider};
pub use qkd::{evaluate_qber, CancelToken, QberReport, QkdChannel, SiftedKey, Verdict};

/// Initialize the simulator crate.
///
/// No special setup is currently required; this function exists to provide a
/// stable API surface that can accommodate future initialization requirements
/// for primitive backends.
///
/// # Returns
///
/// `Ok(())` if initialization is successful
pub fn init() -> CryptoResult<()> {
    Ok(())
}

/// Provides a simplified interface to the most commonly used operations.
pub mod prelude {
    pub use crate::config::{
        ChannelConfig, HierarchyConfig, ProviderSelection, QberConfig, RewrapPolicy,
        RotationInterval, SessionConfig,
    };
    pub use crate::error::{CryptoError, CryptoResult};
    pub use crate::hierarchy::{KeyHierarchy, KeyId, KeyRecord, KeyRole, KeyState};
    pub use crate::hybrid::{derive_session_key, Provenance, SessionKey, SharedSecret};
    pub use crate::init;
    pub use crate::protocol::{establish_session, SessionOutcome};
    pub use crate::provider::{PrimitiveProvider, ProviderChain, ProviderStage, StubProvider};
    pub use crate::qkd::{
        evaluate_qber, CancelToken, QberReport, QkdChannel, SiftedKey, Verdict,
    };
    pub use crate::secure_memory::SecureBytes;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_prelude_session_establishment() {
        use prelude::*;

        init().unwrap();

        let config = SessionConfig {
            channel: ChannelConfig::new(1024, false, 7),
            qber: QberConfig::default(),
            context: b"lib-smoke-test".to_vec(),
        };
        let chain = ProviderChain::stub_only();
        let outcome = establish_session(&config, &chain, &CancelToken::new()).unwrap();

        assert!(outcome.qkd_contributed);

        // Feed the session key into a fresh hierarchy as root seed material
        let hierarchy = KeyHierarchy::new(
            HierarchyConfig::default(),
            std::sync::Arc::new(ProviderChain::stub_only()),
        )
        .unwrap();
        let root = hierarchy
            .create_root(Some(outcome.session_key.as_bytes()))
            .unwrap();
        assert_eq!(root.role, KeyRole::Root);
    }
}
