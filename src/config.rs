/*!
 * Configuration surface for the QKForge core
 *
 * Each config struct owns a `validate()` method that fails fast with an
 * [`CryptoError::InvalidConfiguration`] on malformed parameters. Nothing is
 * silently defaulted: a caller that supplies `qubit_count = 0` gets an error,
 * not a corrected value.
 */

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{error_codes, CryptoError, CryptoResult};

/// Default QBER acceptance threshold, the conventional BB84 security bound
pub const DEFAULT_QBER_THRESHOLD: f64 = 0.11;

/// Default fraction of the sifted key sacrificed for error estimation
pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.1;

/// Parameters for a single BB84 channel simulation run
///
/// The seed fully determines the run: two invocations with the same config
/// produce bit-identical results, and concurrent sessions must use distinct
/// seeds (typically derived from a session identifier).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Number of qubit events the sender prepares
    pub qubit_count: usize,
    /// Whether an intercept-resend eavesdropper sits on the channel
    pub eavesdropper_present: bool,
    /// Seed for the deterministic random source
    pub seed: u64,
}

impl ChannelConfig {
    pub fn new(qubit_count: usize, eavesdropper_present: bool, seed: u64) -> Self {
        Self {
            qubit_count,
            eavesdropper_present,
            seed,
        }
    }

    pub fn validate(&self) -> CryptoResult<()> {
        if self.qubit_count == 0 {
            return Err(CryptoError::invalid_configuration(
                "qubit_count",
                "positive integer",
                "0",
                error_codes::INVALID_QUBIT_COUNT,
            ));
        }
        Ok(())
    }
}

/// Parameters for QBER estimation over a sifted key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QberConfig {
    /// Fraction of the sifted key sampled for error estimation, in (0, 1]
    pub sample_fraction: f64,
    /// Acceptance threshold for the estimated QBER, in [0, 1]
    pub threshold: f64,
}

impl Default for QberConfig {
    fn default() -> Self {
        Self {
            sample_fraction: DEFAULT_SAMPLE_FRACTION,
            threshold: DEFAULT_QBER_THRESHOLD,
        }
    }
}

impl QberConfig {
    pub fn validate(&self) -> CryptoResult<()> {
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(CryptoError::invalid_configuration(
                "sample_fraction",
                "float in (0, 1]",
                &format!("{}", self.sample_fraction),
                error_codes::INVALID_SAMPLE_FRACTION,
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CryptoError::invalid_configuration(
                "threshold",
                "float in [0, 1]",
                &format!("{}", self.threshold),
                error_codes::INVALID_QBER_THRESHOLD,
            ));
        }
        Ok(())
    }
}

/// When key-encryption keys are re-wrapped under the root
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RewrapPolicy {
    /// KEKs become due for rotation once older than the interval
    TimeBased { interval: Duration },
    /// Re-wrapping happens only through explicit rotate calls
    OnDemand,
}

/// How often any key becomes due for rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotationInterval {
    /// Due once the current generation is older than the duration
    TimeBased(Duration),
    /// Due once the current generation has served this many wraps
    UsageBased(u64),
}

/// Configuration for the key hierarchy manager
#[derive(Debug, Clone)]
pub struct HierarchyConfig {
    /// How long a superseded generation stays in `Rotating` (valid for
    /// decrypt, invalid for new wraps) before it is retired
    pub rotation_grace: Duration,
    /// Bounded retry budget for conflicting concurrent rotations
    pub max_rotation_attempts: u32,
    /// Scheduling policy for KEK re-wraps
    pub rewrap_policy: RewrapPolicy,
    /// Optional rotation cadence applied to every key
    pub rotation_interval: Option<RotationInterval>,
    /// Optional lifetime applied to newly issued KEKs and DEKs
    pub key_lifetime: Option<Duration>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            rotation_grace: Duration::minutes(10),
            max_rotation_attempts: 4,
            rewrap_policy: RewrapPolicy::OnDemand,
            rotation_interval: None,
            key_lifetime: None,
        }
    }
}

impl HierarchyConfig {
    pub fn validate(&self) -> CryptoResult<()> {
        if self.max_rotation_attempts == 0 {
            return Err(CryptoError::invalid_configuration(
                "max_rotation_attempts",
                "positive integer",
                "0",
                error_codes::INVALID_ROTATION_ATTEMPTS,
            ));
        }
        if self.rotation_grace < Duration::zero() {
            return Err(CryptoError::invalid_configuration(
                "rotation_grace",
                "non-negative duration",
                &format!("{}", self.rotation_grace),
                error_codes::INVALID_REWRAP_INTERVAL,
            ));
        }
        if let RewrapPolicy::TimeBased { interval } = self.rewrap_policy {
            if interval <= Duration::zero() {
                return Err(CryptoError::invalid_configuration(
                    "rewrap_policy.interval",
                    "positive duration",
                    &format!("{}", interval),
                    error_codes::INVALID_REWRAP_INTERVAL,
                ));
            }
        }
        match self.rotation_interval {
            Some(RotationInterval::TimeBased(interval)) if interval <= Duration::zero() => {
                return Err(CryptoError::invalid_configuration(
                    "rotation_interval",
                    "positive duration",
                    &format!("{}", interval),
                    error_codes::INVALID_REWRAP_INTERVAL,
                ));
            }
            Some(RotationInterval::UsageBased(0)) => {
                return Err(CryptoError::invalid_configuration(
                    "rotation_interval",
                    "positive wrap count",
                    "0",
                    error_codes::INVALID_REWRAP_INTERVAL,
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Which primitive backends the provider chain is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderSelection {
    /// Deterministic educational stub only
    StubOnly,
    /// Native liboqs-backed provider only; construction fails when the
    /// `native` feature is not compiled in
    NativeOnly,
    /// Native provider preferred, stub serving as an explicit, observable
    /// fallback stage
    NativeWithStubFallback,
}

/// Parameters for one full hybrid session establishment
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub channel: ChannelConfig,
    pub qber: QberConfig,
    /// Context string bound into the key derivation
    pub context: Vec<u8>,
}

impl SessionConfig {
    pub fn validate(&self) -> CryptoResult<()> {
        self.channel.validate()?;
        self.qber.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_rejects_zero_qubits() {
        let config = ChannelConfig::new(0, false, 42);
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), error_codes::INVALID_QUBIT_COUNT);
    }

    #[test]
    fn test_channel_config_accepts_positive_qubits() {
        assert!(ChannelConfig::new(1024, false, 42).validate().is_ok());
    }

    #[test]
    fn test_qber_config_defaults_are_valid() {
        let config = QberConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threshold, DEFAULT_QBER_THRESHOLD);
    }

    #[test]
    fn test_qber_config_rejects_out_of_range() {
        let zero_fraction = QberConfig {
            sample_fraction: 0.0,
            ..QberConfig::default()
        };
        assert!(zero_fraction.validate().is_err());

        let nan_fraction = QberConfig {
            sample_fraction: f64::NAN,
            ..QberConfig::default()
        };
        assert!(nan_fraction.validate().is_err());

        let bad_threshold = QberConfig {
            threshold: 1.5,
            ..QberConfig::default()
        };
        assert!(bad_threshold.validate().is_err());
    }

    #[test]
    fn test_hierarchy_config_rejects_zero_attempts() {
        let config = HierarchyConfig {
            max_rotation_attempts: 0,
            ..HierarchyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hierarchy_config_rejects_non_positive_rewrap_interval() {
        let config = HierarchyConfig {
            rewrap_policy: RewrapPolicy::TimeBased {
                interval: Duration::zero(),
            },
            ..HierarchyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hierarchy_config_rejects_zero_usage_interval() {
        let config = HierarchyConfig {
            rotation_interval: Some(RotationInterval::UsageBased(0)),
            ..HierarchyConfig::default()
        };
        assert!(config.validate().is_err());

        let valid = HierarchyConfig {
            rotation_interval: Some(RotationInterval::TimeBased(Duration::hours(1))),
            ..HierarchyConfig::default()
        };
        assert!(valid.validate().is_ok());
    }
}
