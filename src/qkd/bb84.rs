//! BB84 channel simulation: preparation, transmission, measurement, sifting

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::ChannelConfig;
use crate::error::CryptoResult;
use crate::qkd::derive_rng;

/// How many qubit events are processed between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Measurement basis for a single qubit event
///
/// BB84 uses two conjugate bases; measuring in the preparation basis yields
/// the prepared bit exactly, measuring in the other basis yields a uniformly
/// random outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Basis {
    /// The computational (Z) basis
    Rectilinear,
    /// The Hadamard (X) basis
    Diagonal,
}

impl Basis {
    fn random<R: Rng>(rng: &mut R) -> Self {
        if rng.gen::<bool>() {
            Basis::Diagonal
        } else {
            Basis::Rectilinear
        }
    }
}

/// A single prepared qubit: a bit value encoded in a basis.
///
/// Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QubitEvent {
    pub bit: u8,
    pub basis: Basis,
}

/// Ordered sequence of bits retained after basis sifting.
///
/// Length is at most the qubit count of the run; under uniform random basis
/// choice the expected length is half the qubit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiftedKey(Vec<u8>);

impl SiftedKey {
    pub fn from_bits(bits: Vec<u8>) -> Self {
        Self(bits)
    }

    /// The retained bits, each 0 or 1
    pub fn bits(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pack the bit sequence into bytes, most significant bit first.
    ///
    /// Used to turn an accepted, sample-stripped key into secret material for
    /// hybrid derivation.
    pub fn pack_bits(&self) -> Vec<u8> {
        self.0
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, bit)| acc | (bit << (7 - i)))
            })
            .collect()
    }
}

/// Cooperative cancellation signal for long batch runs.
///
/// The channel checks the token between fixed-size segments, so a caller can
/// abort a multi-million-qubit run without blocking on it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of one BB84 channel run: the parallel sifted keys.
///
/// The two keys cover the same retained positions; absent eavesdropping they
/// are bit-identical.
#[derive(Debug, Clone)]
pub struct ChannelRun {
    pub sender_sifted: SiftedKey,
    pub receiver_sifted: SiftedKey,
    /// Number of qubit events the sender prepared
    pub qubit_count: usize,
}

/// BB84 channel simulator.
///
/// Stateless per call: every `run` draws a fresh deterministic random stream
/// from the configured seed, so many channels may run concurrently as long as
/// their seeds are distinct.
///
/// # Example
///
/// ```
/// use qkforge::config::ChannelConfig;
/// use qkforge::qkd::{CancelToken, QkdChannel};
///
/// let channel = QkdChannel::new(ChannelConfig::new(1024, false, 42)).unwrap();
/// let run = channel.run(&CancelToken::new()).unwrap();
/// assert!(run.sender_sifted.len() <= 1024);
/// assert_eq!(run.sender_sifted.bits(), run.receiver_sifted.bits());
/// ```
#[derive(Debug, Clone)]
pub struct QkdChannel {
    config: ChannelConfig,
}

impl QkdChannel {
    /// Create a channel for the given configuration, validating it fail-fast
    pub fn new(config: ChannelConfig) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Simulate one full transmission: prepare, (optionally intercept),
    /// measure, and sift.
    ///
    /// Deterministic given the configured seed. Returns
    /// [`crate::CryptoError::Cancelled`] if the token fires between segments.
    pub fn run(&self, cancel: &CancelToken) -> CryptoResult<ChannelRun> {
        let mut rng = derive_rng(self.config.seed, b"qkforge/bb84/channel");
        let n = self.config.qubit_count;

        let mut sender_sifted = Vec::with_capacity(n / 2 + 64);
        let mut receiver_sifted = Vec::with_capacity(n / 2 + 64);

        let mut processed = 0usize;
        while processed < n {
            if cancel.is_cancelled() {
                return Err(crate::error::CryptoError::cancelled("bb84_run"));
            }
            let segment = CANCEL_CHECK_INTERVAL.min(n - processed);
            for _ in 0..segment {
                let event = QubitEvent {
                    bit: random_bit(&mut rng),
                    basis: Basis::random(&mut rng),
                };
                let receiver_basis = Basis::random(&mut rng);

                let received = if self.config.eavesdropper_present {
                    // Intercept-resend: the eavesdropper measures in her own
                    // basis and retransmits a qubit prepared in that basis.
                    let eve_basis = Basis::random(&mut rng);
                    let intercepted = measure(event.bit, event.basis, eve_basis, &mut rng);
                    measure(intercepted, eve_basis, receiver_basis, &mut rng)
                } else {
                    measure(event.bit, event.basis, receiver_basis, &mut rng)
                };

                if event.basis == receiver_basis {
                    sender_sifted.push(event.bit);
                    receiver_sifted.push(received);
                }
            }
            processed += segment;
        }

        log::debug!(
            "bb84 run complete: {} qubits, {} sifted, eavesdropper={}",
            n,
            sender_sifted.len(),
            self.config.eavesdropper_present
        );

        Ok(ChannelRun {
            sender_sifted: SiftedKey::from_bits(sender_sifted),
            receiver_sifted: SiftedKey::from_bits(receiver_sifted),
            qubit_count: n,
        })
    }
}

fn random_bit<R: RngCore>(rng: &mut R) -> u8 {
    (rng.next_u32() & 1) as u8
}

/// Measure a qubit prepared as (bit, prepared_basis) in measurement_basis.
///
/// Matching bases reproduce the prepared bit; mismatched bases yield a
/// uniformly random outcome.
fn measure<R: RngCore>(bit: u8, prepared_basis: Basis, measurement_basis: Basis, rng: &mut R) -> u8 {
    if prepared_basis == measurement_basis {
        bit
    } else {
        random_bit(rng)
    }
}
