//! Two-stage provider chain with explicit precedence
//!
//! The chain prefers the native backend and falls back to the stub when the
//! native stage fails or is absent. Every fallback is logged, and the stage
//! that served the most recent request is observable through
//! [`ProviderChain::last_served`], so a request is never silently downgraded.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::ProviderSelection;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::hybrid::SharedSecret;
use crate::provider::{KemKeyPair, PrimitiveProvider, StubProvider};

/// Which stage of the chain served a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderStage {
    Native,
    Stub,
}

const STAGE_NONE: u8 = 0;
const STAGE_NATIVE: u8 = 1;
const STAGE_STUB: u8 = 2;

/// Explicit two-stage primitive provider chain.
///
/// Precedence: the native stage is tried first when configured; the stub
/// stage serves when the native stage is absent or returns an error. With
/// `NativeOnly` there is no second stage and native failures propagate
/// unchanged.
pub struct ProviderChain {
    primary: Option<Box<dyn PrimitiveProvider>>,
    fallback: Option<StubProvider>,
    last_served: AtomicU8,
}

impl ProviderChain {
    /// Build a chain for the configured backend selection.
    ///
    /// `NativeOnly` and `NativeWithStubFallback` require the `native` cargo
    /// feature; without it the former fails and the latter degrades to a
    /// stub-only chain with a warning at construction.
    pub fn from_selection(selection: ProviderSelection) -> CryptoResult<Self> {
        match selection {
            ProviderSelection::StubOnly => Ok(Self {
                primary: None,
                fallback: Some(StubProvider::new()),
                last_served: AtomicU8::new(STAGE_NONE),
            }),
            ProviderSelection::NativeOnly => {
                let primary = Self::native_backend()?;
                Ok(Self {
                    primary: Some(primary),
                    fallback: None,
                    last_served: AtomicU8::new(STAGE_NONE),
                })
            }
            ProviderSelection::NativeWithStubFallback => {
                let primary = match Self::native_backend() {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        log::warn!(
                            "native primitive backend unavailable ({}); chain will serve from stub",
                            e
                        );
                        None
                    }
                };
                Ok(Self {
                    primary,
                    fallback: Some(StubProvider::new()),
                    last_served: AtomicU8::new(STAGE_NONE),
                })
            }
        }
    }

    /// A stub-only chain, the default for simulation work
    pub fn stub_only() -> Self {
        Self {
            primary: None,
            fallback: Some(StubProvider::new()),
            last_served: AtomicU8::new(STAGE_NONE),
        }
    }

    #[cfg(feature = "native")]
    fn native_backend() -> CryptoResult<Box<dyn PrimitiveProvider>> {
        Ok(Box::new(crate::provider::NativeProvider::new()?))
    }

    #[cfg(not(feature = "native"))]
    fn native_backend() -> CryptoResult<Box<dyn PrimitiveProvider>> {
        Err(CryptoError::primitive_failure(
            "provider_chain",
            "native backend not compiled in (enable the `native` feature)",
            error_codes::BACKEND_UNAVAILABLE,
        ))
    }

    /// The stage that served the most recent request, if any
    pub fn last_served(&self) -> Option<ProviderStage> {
        match self.last_served.load(Ordering::Relaxed) {
            STAGE_NATIVE => Some(ProviderStage::Native),
            STAGE_STUB => Some(ProviderStage::Stub),
            _ => None,
        }
    }

    fn record(&self, stage: ProviderStage) {
        let value = match stage {
            ProviderStage::Native => STAGE_NATIVE,
            ProviderStage::Stub => STAGE_STUB,
        };
        self.last_served.store(value, Ordering::Relaxed);
    }

    fn dispatch<T>(
        &self,
        operation: &str,
        call: impl Fn(&dyn PrimitiveProvider) -> CryptoResult<T>,
    ) -> CryptoResult<T> {
        if let Some(primary) = &self.primary {
            match call(primary.as_ref()) {
                Ok(value) => {
                    self.record(ProviderStage::Native);
                    return Ok(value);
                }
                Err(e) => {
                    let Some(fallback) = &self.fallback else {
                        return Err(e);
                    };
                    log::warn!(
                        "native backend failed during {}: {}; serving from stub",
                        operation,
                        e
                    );
                    let value = call(fallback)?;
                    self.record(ProviderStage::Stub);
                    return Ok(value);
                }
            }
        }
        if let Some(fallback) = &self.fallback {
            let value = call(fallback)?;
            self.record(ProviderStage::Stub);
            return Ok(value);
        }
        Err(CryptoError::primitive_failure(
            operation,
            "no primitive backend configured",
            error_codes::BACKEND_UNAVAILABLE,
        ))
    }

    pub fn classical_key_exchange(&self) -> CryptoResult<SharedSecret> {
        self.dispatch("classical_key_exchange", |p| p.classical_key_exchange())
    }

    pub fn kem_keypair(&self) -> CryptoResult<KemKeyPair> {
        self.dispatch("kem_keypair", |p| p.kem_keypair())
    }

    pub fn kem_keypair_from_seed(&self, seed: &[u8]) -> CryptoResult<KemKeyPair> {
        self.dispatch("kem_keypair_from_seed", |p| p.kem_keypair_from_seed(seed))
    }

    pub fn kem_encapsulate(&self, public_key: &[u8]) -> CryptoResult<(Vec<u8>, SharedSecret)> {
        self.dispatch("kem_encapsulate", |p| p.kem_encapsulate(public_key))
    }

    pub fn kem_decapsulate(
        &self,
        secret_key: &[u8],
        ciphertext: &[u8],
    ) -> CryptoResult<SharedSecret> {
        self.dispatch("kem_decapsulate", |p| {
            p.kem_decapsulate(secret_key, ciphertext)
        })
    }

    pub fn sign(&self, secret_key: &[u8], message: &[u8]) -> CryptoResult<Vec<u8>> {
        self.dispatch("sign", |p| p.sign(secret_key, message))
    }

    pub fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> CryptoResult<bool> {
        self.dispatch("verify", |p| p.verify(public_key, message, signature))
    }

    pub fn aead_encrypt(&self, key: &[u8], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        self.dispatch("aead_encrypt", |p| p.aead_encrypt(key, plaintext, aad))
    }

    pub fn aead_decrypt(&self, key: &[u8], sealed: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        self.dispatch("aead_decrypt", |p| p.aead_decrypt(key, sealed, aad))
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("primary", &self.primary.as_ref().map(|p| p.name()))
            .field("fallback", &self.fallback.as_ref().map(|p| p.name()))
            .field("last_served", &self.last_served())
            .finish()
    }
}
