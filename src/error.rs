/*!
 * Error Handling for the QKForge Core
 *
 * Provides structured error types with numeric error codes grouped by
 * subsystem, so that every rejected configuration, failed rotation, or
 * primitive failure can be explained with a reason code and the affected
 * key id/generation.
 *
 * Statistical outcomes that callers routinely branch on (a QBER verdict
 * rejecting a candidate QKD key) are NOT errors; they are values carried in
 * [`crate::qkd::QberReport`]. This type covers programmer errors and
 * infrastructure failures only.
 */

use thiserror::Error;

/// Comprehensive error type for key-establishment and key-lifecycle operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed parameters; fails fast, never silently defaulted
    #[error("Invalid configuration: {parameter} - expected {expected}, got {actual}")]
    InvalidConfiguration {
        parameter: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    /// Any failure from a primitive provider, propagated unchanged
    #[error("Primitive operation failed: {operation} - {cause}")]
    PrimitiveFailure {
        operation: String,
        cause: String,
        error_code: u32,
    },

    /// Concurrent generation-increment conflicts exhausted the retry budget
    #[error("Rotation failed for key {key_id} after {attempts} attempts: {cause}")]
    RotationFailed {
        key_id: String,
        attempts: u32,
        cause: String,
        error_code: u32,
    },

    /// A lookup referenced a missing key id or generation
    #[error("Key not found: {key_id} (generation {generation:?})")]
    KeyNotFound {
        key_id: String,
        generation: Option<u64>,
        error_code: u32,
    },

    /// A wrap reference resolves to a retired, compromised, or missing ancestor
    #[error("Dangling wrap: key {key_id} generation {generation} references {wrapped_under}")]
    DanglingWrap {
        key_id: String,
        generation: u64,
        wrapped_under: String,
        error_code: u32,
    },

    /// A long-running computation observed its cancellation token
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String, error_code: u32 },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // Configuration errors: 1000-1999
    pub const INVALID_QUBIT_COUNT: u32 = 1001;
    pub const INVALID_SAMPLE_FRACTION: u32 = 1002;
    pub const INVALID_QBER_THRESHOLD: u32 = 1003;
    pub const NO_DERIVATION_INPUTS: u32 = 1004;
    pub const INVALID_ROTATION_ATTEMPTS: u32 = 1005;
    pub const INVALID_REWRAP_INTERVAL: u32 = 1006;
    pub const PROVENANCE_MISMATCH: u32 = 1007;
    pub const ROOT_ALREADY_PRESENT: u32 = 1008;
    pub const INVALID_SEED_MATERIAL: u32 = 1009;

    // QKD channel errors: 2000-2999
    pub const RUN_CANCELLED: u32 = 2001;
    pub const SIFTED_LENGTH_MISMATCH: u32 = 2002;

    // Primitive provider errors: 3000-3999
    pub const KEM_KEYGEN_FAILED: u32 = 3001;
    pub const KEM_ENCAPSULATION_FAILED: u32 = 3002;
    pub const KEM_DECAPSULATION_FAILED: u32 = 3003;
    pub const SIGNING_FAILED: u32 = 3004;
    pub const VERIFICATION_FAILED: u32 = 3005;
    pub const AEAD_ENCRYPTION_FAILED: u32 = 3006;
    pub const AEAD_AUTHENTICATION_FAILED: u32 = 3007;
    pub const INVALID_KEY_SIZE: u32 = 3008;
    pub const BACKEND_UNAVAILABLE: u32 = 3009;
    pub const SEEDED_KEYGEN_UNSUPPORTED: u32 = 3010;
    pub const RANDOM_GENERATION_FAILED: u32 = 3011;

    // Key hierarchy errors: 4000-4999
    pub const KEY_NOT_FOUND: u32 = 4001;
    pub const GENERATION_NOT_FOUND: u32 = 4002;
    pub const DANGLING_WRAP: u32 = 4003;
    pub const ROTATION_CONFLICT_EXHAUSTED: u32 = 4004;
    pub const WRAP_STATE_INVALID: u32 = 4005;
    pub const REGISTRY_POISONED: u32 = 4006;
}

impl CryptoError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            CryptoError::InvalidConfiguration { error_code, .. } => *error_code,
            CryptoError::PrimitiveFailure { error_code, .. } => *error_code,
            CryptoError::RotationFailed { error_code, .. } => *error_code,
            CryptoError::KeyNotFound { error_code, .. } => *error_code,
            CryptoError::DanglingWrap { error_code, .. } => *error_code,
            CryptoError::Cancelled { error_code, .. } => *error_code,
            CryptoError::SerializationError(_) => 9001,
        }
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            CryptoError::InvalidConfiguration { .. } => "InvalidConfiguration",
            CryptoError::PrimitiveFailure { .. } => "PrimitiveFailure",
            CryptoError::RotationFailed { .. } => "RotationFailed",
            CryptoError::KeyNotFound { .. } => "KeyNotFound",
            CryptoError::DanglingWrap { .. } => "DanglingWrap",
            CryptoError::Cancelled { .. } => "Cancelled",
            CryptoError::SerializationError(_) => "SerializationError",
        }
    }
}

/// Convenience constructors for common error types
impl CryptoError {
    pub fn invalid_configuration(
        parameter: &str,
        expected: &str,
        actual: &str,
        error_code: u32,
    ) -> Self {
        CryptoError::InvalidConfiguration {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code,
        }
    }

    pub fn primitive_failure(operation: &str, cause: &str, error_code: u32) -> Self {
        CryptoError::PrimitiveFailure {
            operation: operation.to_string(),
            cause: cause.to_string(),
            error_code,
        }
    }

    pub fn rotation_failed(key_id: &str, attempts: u32, cause: &str) -> Self {
        CryptoError::RotationFailed {
            key_id: key_id.to_string(),
            attempts,
            cause: cause.to_string(),
            error_code: error_codes::ROTATION_CONFLICT_EXHAUSTED,
        }
    }

    pub fn key_not_found(key_id: &str, generation: Option<u64>) -> Self {
        let error_code = if generation.is_some() {
            error_codes::GENERATION_NOT_FOUND
        } else {
            error_codes::KEY_NOT_FOUND
        };
        CryptoError::KeyNotFound {
            key_id: key_id.to_string(),
            generation,
            error_code,
        }
    }

    pub fn dangling_wrap(key_id: &str, generation: u64, wrapped_under: &str) -> Self {
        CryptoError::DanglingWrap {
            key_id: key_id.to_string(),
            generation,
            wrapped_under: wrapped_under.to_string(),
            error_code: error_codes::DANGLING_WRAP,
        }
    }

    pub fn cancelled(operation: &str) -> Self {
        CryptoError::Cancelled {
            operation: operation.to_string(),
            error_code: error_codes::RUN_CANCELLED,
        }
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::SerializationError(err.to_string())
    }
}

/// Result type alias for key-establishment and key-lifecycle operations
pub type CryptoResult<T> = Result<T, CryptoError>;
