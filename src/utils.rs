//! Utilities for cryptographic operations

use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::error::{error_codes, CryptoError};

/// Generate random bytes of the specified length from the OS entropy source
pub fn random_bytes(length: usize) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| {
            CryptoError::primitive_failure(
                "random_bytes",
                &format!("OS RNG failure: {}", e),
                error_codes::RANDOM_GENERATION_FAILED,
            )
        })?;
    Ok(bytes)
}

/// Constant-time comparison of two byte slices to avoid timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Convert bytes to a hexadecimal string
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Convert a hexadecimal string to bytes
pub fn from_hex(hex_str: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(hex_str).map_err(|e| {
        CryptoError::invalid_configuration(
            "hex_input",
            "even-length hexadecimal string",
            &format!("{}", e),
            error_codes::INVALID_SEED_MATERIAL,
        )
    })
}

/// Concatenate multiple byte slices efficiently
pub fn concat_bytes(slices: &[&[u8]]) -> Vec<u8> {
    let total_len = slices.iter().map(|s| s.len()).sum();
    let mut result = Vec::with_capacity(total_len);
    for slice in slices {
        result.extend_from_slice(slice);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes() {
        let bytes1 = random_bytes(32).unwrap();
        let bytes2 = random_bytes(32).unwrap();

        assert_eq!(bytes1.len(), 32);
        assert_eq!(bytes2.len(), 32);
        // Two random byte arrays should be different
        assert_ne!(bytes1, bytes2);
    }

    #[test]
    fn test_constant_time_eq() {
        let a = [1, 2, 3, 4];
        let b = [1, 2, 3, 4];
        let c = [1, 2, 3, 5];
        let d = [1, 2, 3];

        assert!(constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &c));
        assert!(!constant_time_eq(&a, &d));
    }

    #[test]
    fn test_hex_conversion() {
        let data = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
        let hex_str = to_hex(&data);
        assert_eq!(hex_str, "0123456789abcdef");

        let bytes = from_hex(&hex_str).unwrap();
        assert_eq!(bytes, data);
    }

    #[test]
    fn test_from_hex_rejects_odd_length() {
        assert!(from_hex("abc").is_err());
    }

    #[test]
    fn test_concat_bytes() {
        let a = [1, 2, 3];
        let b = [4, 5];
        let c = [6, 7, 8, 9];

        let result = concat_bytes(&[&a, &b, &c]);
        assert_eq!(result, [1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }
}
