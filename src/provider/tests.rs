use crate::config::ProviderSelection;
use crate::error::{error_codes, CryptoError};
use crate::hybrid::Provenance;
use crate::provider::stub::{
    STUB_KEM_CIPHERTEXT_LEN, STUB_KEM_PUBLIC_KEY_LEN, STUB_KEM_SECRET_KEY_LEN, STUB_SIGNATURE_LEN,
};
use crate::provider::{PrimitiveProvider, ProviderChain, ProviderStage, StubProvider};

#[test]
fn test_stub_keypair_sizes() {
    let provider = StubProvider::new();
    let pair = provider.kem_keypair().unwrap();
    assert_eq!(pair.public_key.len(), STUB_KEM_PUBLIC_KEY_LEN);
    assert_eq!(pair.secret_key.len(), STUB_KEM_SECRET_KEY_LEN);
    assert_eq!(pair.algorithm, "stub-kyber768");
}

#[test]
fn test_stub_kem_round_trip() {
    let provider = StubProvider::new();
    let pair = provider.kem_keypair().unwrap();
    let (ciphertext, encapsulated) = provider.kem_encapsulate(&pair.public_key).unwrap();
    assert_eq!(ciphertext.len(), STUB_KEM_CIPHERTEXT_LEN);

    let decapsulated = provider
        .kem_decapsulate(pair.secret_key.as_bytes(), &ciphertext)
        .unwrap();
    assert_eq!(encapsulated.as_bytes(), decapsulated.as_bytes());
    assert_eq!(decapsulated.provenance(), Provenance::PostQuantum);
}

#[test]
fn test_stub_seeded_keypair_is_deterministic() {
    let provider = StubProvider::new();
    let a = provider.kem_keypair_from_seed(b"seed material").unwrap();
    let b = provider.kem_keypair_from_seed(b"seed material").unwrap();
    let c = provider.kem_keypair_from_seed(b"other seed").unwrap();
    assert_eq!(a.public_key, b.public_key);
    assert_ne!(a.public_key, c.public_key);
}

#[test]
fn test_stub_rejects_empty_seed() {
    let provider = StubProvider::new();
    assert!(provider.kem_keypair_from_seed(b"").is_err());
}

#[test]
fn test_classical_exchange_yields_32_bytes() {
    let provider = StubProvider::new();
    let secret = provider.classical_key_exchange().unwrap();
    assert_eq!(secret.len(), 32);
    assert_eq!(secret.provenance(), Provenance::Classical);
}

#[test]
fn test_stub_signature_size_and_verification_contract() {
    let provider = StubProvider::new();
    let sk = vec![3u8; 64];
    let signature = provider.sign(&sk, b"message").unwrap();
    assert_eq!(signature.len(), STUB_SIGNATURE_LEN);
    assert!(provider.verify(b"public", b"message", &signature).unwrap());
    assert!(!provider.verify(b"public", b"message", b"short").unwrap());
}

#[test]
fn test_aead_round_trip_and_tamper_detection() {
    let provider = StubProvider::new();
    let key = [9u8; 32];
    let sealed = provider
        .aead_encrypt(&key, b"wrapped key material", b"record-aad")
        .unwrap();
    let opened = provider.aead_decrypt(&key, &sealed, b"record-aad").unwrap();
    assert_eq!(opened, b"wrapped key material");

    // Flip one ciphertext bit: authentication must fail with the AEAD code
    let mut tampered = sealed.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    match provider.aead_decrypt(&key, &tampered, b"record-aad") {
        Err(CryptoError::PrimitiveFailure { error_code, .. }) => {
            assert_eq!(error_code, error_codes::AEAD_AUTHENTICATION_FAILED)
        }
        other => panic!("expected authentication failure, got {:?}", other),
    }

    // Wrong associated data must also fail authentication
    assert!(provider.aead_decrypt(&key, &sealed, b"other-aad").is_err());
}

#[test]
fn test_aead_rejects_wrong_key_size() {
    let provider = StubProvider::new();
    let err = provider
        .aead_encrypt(&[1u8; 16], b"data", b"aad")
        .unwrap_err();
    assert_eq!(err.error_code(), error_codes::INVALID_KEY_SIZE);
}

#[test]
fn test_chain_stub_only_records_served_stage() {
    let chain = ProviderChain::from_selection(ProviderSelection::StubOnly).unwrap();
    assert_eq!(chain.last_served(), None);
    chain.classical_key_exchange().unwrap();
    assert_eq!(chain.last_served(), Some(ProviderStage::Stub));
}

#[test]
fn test_chain_round_trips_through_stub() {
    let chain = ProviderChain::stub_only();
    let pair = chain.kem_keypair().unwrap();
    let (ciphertext, encapsulated) = chain.kem_encapsulate(&pair.public_key).unwrap();
    let decapsulated = chain
        .kem_decapsulate(pair.secret_key.as_bytes(), &ciphertext)
        .unwrap();
    assert_eq!(encapsulated.as_bytes(), decapsulated.as_bytes());
}

#[cfg(not(feature = "native"))]
#[test]
fn test_native_only_requires_feature() {
    let err = ProviderChain::from_selection(ProviderSelection::NativeOnly).unwrap_err();
    assert_eq!(err.error_code(), error_codes::BACKEND_UNAVAILABLE);
}

#[cfg(not(feature = "native"))]
#[test]
fn test_native_with_fallback_degrades_to_stub() {
    let chain = ProviderChain::from_selection(ProviderSelection::NativeWithStubFallback).unwrap();
    chain.kem_keypair().unwrap();
    assert_eq!(chain.last_served(), Some(ProviderStage::Stub));
}
