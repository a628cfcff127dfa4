//! QBER estimation and the accept/reject decision rule

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::QberConfig;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::qkd::SiftedKey;

/// Why a candidate QKD key was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The estimated error rate exceeded the configured threshold
    QberAboveThreshold,
    /// The sifted key yielded no sample positions to estimate from
    InsufficientSample,
}

/// Outcome of the QBER decision rule.
///
/// Rejection is an expected, recoverable outcome that callers branch on; it
/// is a value, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    Rejected { reason: RejectReason },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Error-rate estimate over a sampled subset of the sifted key.
///
/// Produced once per evaluation; immutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QberReport {
    /// Number of sifted positions sacrificed for estimation
    pub sample_size: usize,
    /// How many sampled positions disagreed between sender and receiver
    pub mismatch_count: usize,
    /// `mismatch_count / sample_size`, or 0.0 when the sample is empty
    pub qber: f64,
    /// Threshold the estimate was judged against
    pub threshold: f64,
    pub verdict: Verdict,
}

/// A QBER report together with the surviving key material.
///
/// The sampled positions are publicly disclosed during estimation and are
/// therefore stripped from both remainders; the accepted QKD key never
/// contains a sampled bit.
#[derive(Debug, Clone)]
pub struct QberEvaluation {
    pub report: QberReport,
    pub sender_remainder: SiftedKey,
    pub receiver_remainder: SiftedKey,
}

/// Estimate the quantum bit error rate from a random disjoint sample and
/// render the accept/reject verdict.
///
/// The sample indices are drawn from the caller-provided RNG so a session
/// seed reproduces the whole evaluation. An empty sifted key produces a
/// `Rejected { InsufficientSample }` verdict rather than a division by zero.
///
/// # Errors
///
/// Returns an error if the two sifted keys have different lengths (they come
/// from the same run and must be parallel) or the config is malformed.
pub fn evaluate_qber<R: Rng>(
    sender: &SiftedKey,
    receiver: &SiftedKey,
    config: &QberConfig,
    rng: &mut R,
) -> CryptoResult<QberEvaluation> {
    config.validate()?;
    if sender.len() != receiver.len() {
        return Err(CryptoError::primitive_failure(
            "evaluate_qber",
            &format!(
                "sifted keys must be parallel: sender {} bits, receiver {} bits",
                sender.len(),
                receiver.len()
            ),
            error_codes::SIFTED_LENGTH_MISMATCH,
        ));
    }

    let len = sender.len();
    let sample_size = ((len as f64) * config.sample_fraction).ceil() as usize;
    let sample_size = sample_size.min(len);

    if sample_size == 0 {
        let report = QberReport {
            sample_size: 0,
            mismatch_count: 0,
            qber: 0.0,
            threshold: config.threshold,
            verdict: Verdict::Rejected {
                reason: RejectReason::InsufficientSample,
            },
        };
        return Ok(QberEvaluation {
            report,
            sender_remainder: SiftedKey::from_bits(Vec::new()),
            receiver_remainder: SiftedKey::from_bits(Vec::new()),
        });
    }

    let mut sampled = vec![false; len];
    for index in rand::seq::index::sample(rng, len, sample_size) {
        sampled[index] = true;
    }

    let sender_bits = sender.bits();
    let receiver_bits = receiver.bits();

    let mut mismatch_count = 0usize;
    let mut sender_remainder = Vec::with_capacity(len - sample_size);
    let mut receiver_remainder = Vec::with_capacity(len - sample_size);
    for i in 0..len {
        if sampled[i] {
            if sender_bits[i] != receiver_bits[i] {
                mismatch_count += 1;
            }
        } else {
            sender_remainder.push(sender_bits[i]);
            receiver_remainder.push(receiver_bits[i]);
        }
    }

    let qber = mismatch_count as f64 / sample_size as f64;
    let verdict = if qber <= config.threshold {
        Verdict::Accepted
    } else {
        Verdict::Rejected {
            reason: RejectReason::QberAboveThreshold,
        }
    };

    log::debug!(
        "qber estimate: sample={} mismatches={} qber={:.4} verdict={:?}",
        sample_size,
        mismatch_count,
        qber,
        verdict
    );

    Ok(QberEvaluation {
        report: QberReport {
            sample_size,
            mismatch_count,
            qber,
            threshold: config.threshold,
            verdict,
        },
        sender_remainder: SiftedKey::from_bits(sender_remainder),
        receiver_remainder: SiftedKey::from_bits(receiver_remainder),
    })
}
