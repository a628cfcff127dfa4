//! Secure Memory Handling Utilities
//!
//! Provides a zeroize-on-drop container for sensitive byte material (shared
//! secrets, unwrapped key material, session keys). The goal is to minimize
//! the exposure of secret bytes in memory and to make it impossible to leak
//! them through `Debug` formatting or logging.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::utils;

/// A secure container for sensitive bytes that is automatically zeroed when
/// dropped.
///
/// The contents never appear in `Debug` output; only the length is shown.
/// Equality checks go through [`SecureBytes::ct_eq`] which compares in
/// constant time.
///
/// # Example
///
/// ```
/// use qkforge::secure_memory::SecureBytes;
///
/// let key = SecureBytes::new(vec![1, 2, 3, 4]);
/// assert_eq!(key.len(), 4);
/// assert_eq!(format!("{:?}", key), "SecureBytes(4 bytes)");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    inner: Vec<u8>,
}

impl SecureBytes {
    /// Create a new secure buffer, taking ownership of the bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    /// Create a secure buffer by copying from a slice
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            inner: bytes.to_vec(),
        }
    }

    /// Borrow the contained bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Length of the contained bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Constant-time equality against another byte slice
    pub fn ct_eq(&self, other: &[u8]) -> bool {
        utils::constant_time_eq(&self.inner, other)
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes({} bytes)", self.inner.len())
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_contents() {
        let secret = SecureBytes::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("de"));
        assert!(rendered.contains("4 bytes"));
    }

    #[test]
    fn test_ct_eq() {
        let secret = SecureBytes::new(vec![1, 2, 3]);
        assert!(secret.ct_eq(&[1, 2, 3]));
        assert!(!secret.ct_eq(&[1, 2, 4]));
        assert!(!secret.ct_eq(&[1, 2]));
    }

    #[test]
    fn test_zeroize_clears_contents() {
        let mut secret = SecureBytes::new(vec![7; 16]);
        secret.zeroize();
        assert!(secret.is_empty() || secret.as_bytes().iter().all(|&b| b == 0));
    }
}
