/*!
 * Session establishment protocol
 *
 * Composes the QKD channel, the QBER decision rule, the primitive provider
 * chain, and the hybrid deriver into one operation: run the quantum channel,
 * decide whether the candidate QKD key is trustworthy, gather classical and
 * post-quantum secrets, and derive the session key.
 *
 * A rejected QBER verdict is not a failure: the session falls back to
 * classical + post-quantum derivation and the report travels with the
 * outcome so callers can audit why QKD did not contribute.
 */

use crate::config::SessionConfig;
use crate::error::CryptoResult;
use crate::hybrid::{derive_session_key, Provenance, SessionKey, SharedSecret};
use crate::provider::{ProviderChain, ProviderStage};
use crate::qkd::{derive_rng, evaluate_qber, CancelToken, QberReport, QkdChannel};

/// Everything a caller learns from one session establishment
#[derive(Debug)]
pub struct SessionOutcome {
    pub session_key: SessionKey,
    /// The QBER report for the channel run, whatever the verdict
    pub qber_report: QberReport,
    /// Whether an accepted QKD key contributed to the derivation
    pub qkd_contributed: bool,
    /// Which provider stage served the primitive requests
    pub served_by: Option<ProviderStage>,
}

/// Establish a hybrid session key.
///
/// The QKD channel and QBER sampling both derive their randomness from the
/// session seed, so one seed reproduces the entire establishment. The
/// sampled estimation bits are stripped from the key material before it
/// enters derivation.
///
/// # Example
///
/// ```
/// use qkforge::config::{ChannelConfig, QberConfig, SessionConfig};
/// use qkforge::protocol::establish_session;
/// use qkforge::provider::ProviderChain;
/// use qkforge::qkd::CancelToken;
///
/// let config = SessionConfig {
///     channel: ChannelConfig::new(1024, false, 42),
///     qber: QberConfig::default(),
///     context: b"example-session".to_vec(),
/// };
/// let chain = ProviderChain::stub_only();
/// let outcome = establish_session(&config, &chain, &CancelToken::new()).unwrap();
/// assert!(outcome.qkd_contributed);
/// ```
pub fn establish_session(
    config: &SessionConfig,
    provider: &ProviderChain,
    cancel: &CancelToken,
) -> CryptoResult<SessionOutcome> {
    config.validate()?;

    let channel = QkdChannel::new(config.channel)?;
    let run = channel.run(cancel)?;

    let mut sample_rng = derive_rng(config.channel.seed, b"qkforge/bb84/qber-sample");
    let evaluation = evaluate_qber(
        &run.sender_sifted,
        &run.receiver_sifted,
        &config.qber,
        &mut sample_rng,
    )?;

    let qkd_secret = if evaluation.report.verdict.is_accepted()
        && !evaluation.sender_remainder.is_empty()
    {
        Some(SharedSecret::new(
            Provenance::Qkd,
            evaluation.sender_remainder.pack_bits(),
        ))
    } else {
        log::debug!(
            "qkd key unavailable for derivation (verdict {:?}); falling back to classical+pqc",
            evaluation.report.verdict
        );
        None
    };

    let classical = provider.classical_key_exchange()?;
    let kem_pair = provider.kem_keypair()?;
    let (_kem_ciphertext, post_quantum) = provider.kem_encapsulate(&kem_pair.public_key)?;

    let session_key = derive_session_key(
        Some(&classical),
        Some(&post_quantum),
        qkd_secret.as_ref(),
        &config.context,
    )?;

    Ok(SessionOutcome {
        qkd_contributed: qkd_secret.is_some(),
        session_key,
        qber_report: evaluation.report,
        served_by: provider.last_served(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, QberConfig};
    use crate::qkd::{RejectReason, Verdict};

    fn session_config(eavesdropper: bool, seed: u64) -> SessionConfig {
        SessionConfig {
            channel: ChannelConfig::new(1024, eavesdropper, seed),
            qber: QberConfig::default(),
            context: b"protocol-tests".to_vec(),
        }
    }

    #[test]
    fn test_honest_session_uses_qkd() {
        let chain = ProviderChain::stub_only();
        let outcome =
            establish_session(&session_config(false, 42), &chain, &CancelToken::new()).unwrap();

        assert!(outcome.qkd_contributed);
        assert!(outcome.qber_report.verdict.is_accepted());
        assert_eq!(
            outcome.session_key.manifest(),
            &[
                Provenance::Classical,
                Provenance::PostQuantum,
                Provenance::Qkd
            ]
        );
        assert_eq!(outcome.served_by, Some(ProviderStage::Stub));
    }

    #[test]
    fn test_eavesdropped_session_falls_back_without_qkd() {
        let chain = ProviderChain::stub_only();
        let outcome =
            establish_session(&session_config(true, 42), &chain, &CancelToken::new()).unwrap();

        assert!(!outcome.qkd_contributed);
        assert_eq!(
            outcome.qber_report.verdict,
            Verdict::Rejected {
                reason: RejectReason::QberAboveThreshold
            }
        );
        // The session still derives a key from classical + post-quantum
        assert_eq!(
            outcome.session_key.manifest(),
            &[Provenance::Classical, Provenance::PostQuantum]
        );
    }

    #[test]
    fn test_invalid_session_config_rejected() {
        let chain = ProviderChain::stub_only();
        let mut config = session_config(false, 1);
        config.channel.qubit_count = 0;
        assert!(establish_session(&config, &chain, &CancelToken::new()).is_err());
    }

    #[test]
    fn test_cancelled_session_aborts() {
        let chain = ProviderChain::stub_only();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = establish_session(&session_config(false, 1), &chain, &cancel).unwrap_err();
        assert_eq!(err.error_type(), "Cancelled");
    }
}
