use crate::config::{ChannelConfig, QberConfig};
use crate::error::CryptoError;
use crate::qkd::{derive_rng, evaluate_qber, CancelToken, QkdChannel, RejectReason, SiftedKey, Verdict};

fn honest_run(qubit_count: usize, seed: u64) -> crate::qkd::ChannelRun {
    QkdChannel::new(ChannelConfig::new(qubit_count, false, seed))
        .unwrap()
        .run(&CancelToken::new())
        .unwrap()
}

fn eavesdropped_run(qubit_count: usize, seed: u64) -> crate::qkd::ChannelRun {
    QkdChannel::new(ChannelConfig::new(qubit_count, true, seed))
        .unwrap()
        .run(&CancelToken::new())
        .unwrap()
}

#[test]
fn test_sifted_length_bounds() {
    for seed in 0..8 {
        let run = honest_run(1024, seed);
        assert!(run.sender_sifted.len() <= 1024);
        assert_eq!(run.sender_sifted.len(), run.receiver_sifted.len());
    }
}

#[test]
fn test_sifted_length_approximately_half() {
    // Binomial(1024, 0.5): mean 512, sigma 16; +/-64 is four sigma
    let run = honest_run(1024, 42);
    let len = run.sender_sifted.len() as i64;
    assert!((len - 512).abs() <= 64, "sifted length {} far from n/2", len);
}

#[test]
fn test_honest_channel_keys_identical() {
    let run = honest_run(1024, 42);
    assert_eq!(run.sender_sifted.bits(), run.receiver_sifted.bits());
}

#[test]
fn test_run_is_deterministic_per_seed() {
    let a = honest_run(2048, 7);
    let b = honest_run(2048, 7);
    assert_eq!(a.sender_sifted, b.sender_sifted);
    assert_eq!(a.receiver_sifted, b.receiver_sifted);

    let c = honest_run(2048, 8);
    assert_ne!(a.sender_sifted, c.sender_sifted);
}

#[test]
fn test_honest_run_accepted_with_near_zero_qber() {
    let run = honest_run(1024, 42);
    let mut rng = derive_rng(42, b"qkforge/bb84/qber-sample");
    let eval = evaluate_qber(
        &run.sender_sifted,
        &run.receiver_sifted,
        &QberConfig::default(),
        &mut rng,
    )
    .unwrap();

    assert!(eval.report.qber <= 0.02);
    assert!(eval.report.verdict.is_accepted());
}

#[test]
fn test_eavesdropped_run_rejected() {
    let run = eavesdropped_run(1024, 42);
    let mut rng = derive_rng(42, b"qkforge/bb84/qber-sample");
    let eval = evaluate_qber(
        &run.sender_sifted,
        &run.receiver_sifted,
        &QberConfig::default(),
        &mut rng,
    )
    .unwrap();

    assert_eq!(
        eval.report.verdict,
        Verdict::Rejected {
            reason: RejectReason::QberAboveThreshold
        }
    );
}

#[test]
fn test_eavesdropper_disturbance_near_one_quarter() {
    // Average the estimate across seeds so sampling noise is negligible;
    // intercept-resend disturbs a quarter of the sifted positions.
    let config = QberConfig {
        sample_fraction: 0.5,
        ..QberConfig::default()
    };
    let mut total_mismatches = 0usize;
    let mut total_samples = 0usize;
    for seed in 0..10 {
        let run = eavesdropped_run(2048, seed);
        let mut rng = derive_rng(seed, b"qkforge/bb84/qber-sample");
        let eval = evaluate_qber(&run.sender_sifted, &run.receiver_sifted, &config, &mut rng)
            .unwrap();
        total_mismatches += eval.report.mismatch_count;
        total_samples += eval.report.sample_size;
    }
    let average_qber = total_mismatches as f64 / total_samples as f64;
    assert!(
        (0.20..=0.27).contains(&average_qber),
        "average qber {} outside the intercept-resend band",
        average_qber
    );
}

#[test]
fn test_sampled_positions_removed_from_remainder() {
    let run = honest_run(1024, 42);
    let sifted_len = run.sender_sifted.len();
    let mut rng = derive_rng(42, b"qkforge/bb84/qber-sample");
    let eval = evaluate_qber(
        &run.sender_sifted,
        &run.receiver_sifted,
        &QberConfig::default(),
        &mut rng,
    )
    .unwrap();

    assert_eq!(
        eval.sender_remainder.len(),
        sifted_len - eval.report.sample_size
    );
    assert_eq!(eval.sender_remainder.len(), eval.receiver_remainder.len());
    // Honest channel: remainders agree bit for bit
    assert_eq!(eval.sender_remainder.bits(), eval.receiver_remainder.bits());
}

#[test]
fn test_empty_sifted_key_rejected_without_division() {
    let empty = SiftedKey::from_bits(Vec::new());
    let mut rng = derive_rng(0, b"qkforge/bb84/qber-sample");
    let eval = evaluate_qber(&empty, &empty, &QberConfig::default(), &mut rng).unwrap();
    assert_eq!(eval.report.sample_size, 0);
    assert_eq!(
        eval.report.verdict,
        Verdict::Rejected {
            reason: RejectReason::InsufficientSample
        }
    );
}

#[test]
fn test_mismatched_sifted_lengths_error() {
    let a = SiftedKey::from_bits(vec![0, 1, 0]);
    let b = SiftedKey::from_bits(vec![0, 1]);
    let mut rng = derive_rng(0, b"qkforge/bb84/qber-sample");
    assert!(evaluate_qber(&a, &b, &QberConfig::default(), &mut rng).is_err());
}

#[test]
fn test_cancellation_aborts_run() {
    let channel = QkdChannel::new(ChannelConfig::new(1_000_000, false, 1)).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    match channel.run(&cancel) {
        Err(CryptoError::Cancelled { operation, .. }) => assert_eq!(operation, "bb84_run"),
        other => panic!("expected cancellation, got {:?}", other),
    }
}

#[test]
fn test_zero_qubit_config_rejected() {
    assert!(QkdChannel::new(ChannelConfig::new(0, false, 1)).is_err());
}

#[test]
fn test_pack_bits() {
    let key = SiftedKey::from_bits(vec![1, 0, 1, 0, 1, 0, 1, 0, 1, 1]);
    assert_eq!(key.pack_bits(), vec![0b1010_1010, 0b1100_0000]);
}
