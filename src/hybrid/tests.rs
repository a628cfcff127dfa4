use crate::error::{error_codes, CryptoError};
use crate::hybrid::{derive_session_key, Provenance, SharedSecret};

fn classical(bytes: &[u8]) -> SharedSecret {
    SharedSecret::new(Provenance::Classical, bytes.to_vec())
}

fn post_quantum(bytes: &[u8]) -> SharedSecret {
    SharedSecret::new(Provenance::PostQuantum, bytes.to_vec())
}

fn qkd(bytes: &[u8]) -> SharedSecret {
    SharedSecret::new(Provenance::Qkd, bytes.to_vec())
}

fn hamming_distance(a: &[u8; 32], b: &[u8; 32]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum()
}

#[test]
fn test_derivation_is_deterministic() {
    let c = classical(&[1u8; 32]);
    let p = post_quantum(&[2u8; 32]);
    let q = qkd(&[3u8; 48]);

    let a = derive_session_key(Some(&c), Some(&p), Some(&q), b"ctx").unwrap();
    let b = derive_session_key(Some(&c), Some(&p), Some(&q), b"ctx").unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
}

#[test]
fn test_context_changes_output() {
    let c = classical(&[1u8; 32]);
    let a = derive_session_key(Some(&c), None, None, b"ctx-a").unwrap();
    let b = derive_session_key(Some(&c), None, None, b"ctx-b").unwrap();
    assert_ne!(a.as_bytes(), b.as_bytes());
}

#[test]
fn test_no_inputs_is_configuration_error() {
    let err = derive_session_key(None, None, None, b"ctx").unwrap_err();
    assert_eq!(err.error_code(), error_codes::NO_DERIVATION_INPUTS);
}

#[test]
fn test_provenance_mismatch_rejected() {
    let mislabeled = qkd(&[1u8; 32]);
    let err = derive_session_key(Some(&mislabeled), None, None, b"ctx").unwrap_err();
    match err {
        CryptoError::InvalidConfiguration { error_code, .. } => {
            assert_eq!(error_code, error_codes::PROVENANCE_MISMATCH)
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_manifest_records_contributors_in_canonical_order() {
    let c = classical(&[1u8; 32]);
    let q = qkd(&[3u8; 16]);
    let key = derive_session_key(Some(&c), None, Some(&q), b"ctx").unwrap();
    assert_eq!(key.manifest(), &[Provenance::Classical, Provenance::Qkd]);
}

#[test]
fn test_missing_input_differs_from_zero_filled_input() {
    // A missing slot contributes zero bytes, which must not collide with an
    // explicit all-zero secret of nonzero length.
    let c = classical(&[1u8; 32]);
    let zero_pq = post_quantum(&[0u8; 32]);
    let without = derive_session_key(Some(&c), None, None, b"ctx").unwrap();
    let with = derive_session_key(Some(&c), Some(&zero_pq), None, b"ctx").unwrap();
    assert_ne!(without.as_bytes(), with.as_bytes());
}

#[test]
fn test_avalanche_on_single_byte_flip() {
    // Flipping one input byte should flip about half the output bits. Over
    // 32 trials the mean Hamming distance concentrates tightly around 128.
    let mut total = 0u32;
    let trials = 32u32;
    for t in 0..trials {
        let mut base = vec![7u8; 32];
        base[(t % 32) as usize] ^= 0x01;
        let reference = derive_session_key(
            Some(&classical(&[7u8; 32])),
            Some(&post_quantum(&[9u8; 32])),
            None,
            b"avalanche",
        )
        .unwrap();
        let flipped = derive_session_key(
            Some(&classical(&base)),
            Some(&post_quantum(&[9u8; 32])),
            None,
            b"avalanche",
        )
        .unwrap();
        total += hamming_distance(reference.as_bytes(), flipped.as_bytes());
    }
    let mean = total as f64 / trials as f64;
    assert!(
        (112.0..=144.0).contains(&mean),
        "mean avalanche distance {} outside expected band",
        mean
    );
}

#[test]
fn test_session_key_debug_redacts_bytes() {
    let key = derive_session_key(Some(&classical(&[5u8; 32])), None, None, b"ctx").unwrap();
    let rendered = format!("{:?}", key);
    assert!(rendered.contains("manifest"));
    assert!(!rendered.contains("05"));
}
