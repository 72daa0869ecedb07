//! Public sampling of the sifted key and QBER verification.

use crate::errors::ProtocolError;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Fraction of a sifted key disclosed for error estimation.
pub const DEFAULT_SAMPLE_FRACTION: f64 = 0.3;

/// Keys shorter than this disclose half their bits instead of `fraction`.
const SMALL_KEY_LEN: usize = 10;

/// Lower bound on the sample size for keys of at least `SMALL_KEY_LEN` bits.
const MIN_LARGE_SAMPLE: usize = 5;

/// Number of bits to disclose from a sifted key of `len` bits.
///
/// `max(1, len / 2)` below ten bits, otherwise `max(5, round(len * fraction))`,
/// never more than `len` and zero for an empty key.
pub fn sample_size(len: usize, fraction: f64) -> usize {
    if len == 0 {
        return 0;
    }

    let size = if len < SMALL_KEY_LEN {
        (len / 2).max(1)
    } else {
        ((len as f64 * fraction).round() as usize).max(MIN_LARGE_SAMPLE)
    };
    size.min(len)
}

/// A disclosed sample and the bits that stay secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySample {
    /// Sampled positions in the sifted key, ascending.
    pub indices: Vec<usize>,
    /// Sifted bits at `indices`.
    pub bits: Vec<bool>,
    /// Sifted bits at every other position, in original order.
    pub remaining: Vec<bool>,
}

/// Picks sample positions with a general-purpose shuffle.
///
/// The shuffle only decides which positions are disclosed, so it does not need
/// a cryptographic generator.
#[derive(Debug, Clone)]
pub struct Sampler<R = SmallRng> {
    rng: R,
    fraction: f64,
}

impl Sampler<SmallRng> {
    /// Creates a `Sampler` with the default fraction and an OS-seeded generator.
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
            fraction: DEFAULT_SAMPLE_FRACTION,
        }
    }
}

impl Default for Sampler<SmallRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> Sampler<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            fraction: DEFAULT_SAMPLE_FRACTION,
        }
    }

    /// Sets the fraction used for keys of ten bits or more.
    pub fn with_fraction(mut self, fraction: f64) -> Result<Self, ProtocolError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ProtocolError::InvalidFraction(fraction));
        }
        self.fraction = fraction;
        Ok(self)
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Draws a sample from `sifted` without replacement.
    ///
    /// Positions come from a uniform permutation of `0..len`, truncated to
    /// [`sample_size`] and sorted ascending for disclosure.
    pub fn sample(&mut self, sifted: &[bool]) -> KeySample {
        let len = sifted.len();
        let size = sample_size(len, self.fraction);

        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut self.rng);
        order.truncate(size);
        order.sort_unstable();

        let bits = order.iter().map(|&i| sifted[i]).collect();
        let remaining = remove_sampled(sifted, &order);

        KeySample {
            indices: order,
            bits,
            remaining,
        }
    }
}

/// `key` without the positions in `sorted_indices` (ascending), in original order.
pub fn remove_sampled(key: &[bool], sorted_indices: &[usize]) -> Vec<bool> {
    let mut sampled = sorted_indices.iter().peekable();
    key.iter()
        .enumerate()
        .filter_map(|(i, &bit)| {
            if sampled.peek() == Some(&&i) {
                sampled.next();
                None
            } else {
                Some(bit)
            }
        })
        .collect()
}

/// Outcome of a sample comparison; also the wire response of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub error_count: usize,
    /// Percentage of disagreeing sample bits.
    pub qber: f64,
    pub verified: bool,
}

/// Compares the sender's bits at the sampled positions with the receiver's.
///
/// Any disagreement rejects the key; there is no tolerance band.
pub fn verify(sender_bits: &[bool], receiver_bits: &[bool]) -> Result<Verification, ProtocolError> {
    if sender_bits.len() != receiver_bits.len() {
        return Err(ProtocolError::LengthMismatch {
            what: "sample bits",
            expected: sender_bits.len(),
            got: receiver_bits.len(),
        });
    }

    let error_count = sender_bits
        .iter()
        .zip(receiver_bits)
        .filter(|(a, b)| a != b)
        .count();

    let qber = if sender_bits.is_empty() {
        0.0
    } else {
        100.0 * error_count as f64 / sender_bits.len() as f64
    };

    Ok(Verification {
        error_count,
        qber,
        verified: error_count == 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn sampler(seed: u64) -> Sampler<SmallRng> {
        Sampler::with_rng(SmallRng::seed_from_u64(seed))
    }

    #[test]
    fn sample_size_rules() {
        assert_eq!(sample_size(0, 0.3), 0);
        assert_eq!(sample_size(1, 0.3), 1);
        assert_eq!(sample_size(5, 0.3), 2);
        assert_eq!(sample_size(9, 0.3), 4);
        assert_eq!(sample_size(10, 0.3), 5);
        assert_eq!(sample_size(20, 0.3), 6);
        assert_eq!(sample_size(100, 0.3), 30);
        assert_eq!(sample_size(12, 1.0), 12);
    }

    #[test]
    fn sample_indices_are_sorted_and_match_bits() {
        let sifted: Vec<bool> = (0..40).map(|i| i % 3 == 1).collect();
        let sample = sampler(3).sample(&sifted);

        assert_eq!(sample.indices.len(), 12);
        assert!(sample.indices.windows(2).all(|w| w[0] < w[1]));
        for (k, &i) in sample.indices.iter().enumerate() {
            assert_eq!(sample.bits[k], sifted[i]);
        }
    }

    #[test]
    fn empty_key_samples_nothing() {
        let sample = sampler(4).sample(&[]);
        assert_eq!(sample, KeySample::default());
    }

    #[test]
    fn remove_sampled_keeps_order() {
        let key = [true, false, true, true, false];
        assert_eq!(remove_sampled(&key, &[0, 3]), vec![false, true, false]);
        assert_eq!(remove_sampled(&key, &[]), key.to_vec());
    }

    #[test]
    fn rejects_invalid_fraction() {
        assert!(matches!(
            Sampler::new().with_fraction(0.0),
            Err(ProtocolError::InvalidFraction(_))
        ));
        assert!(Sampler::new().with_fraction(1.5).is_err());
        assert_eq!(Sampler::new().with_fraction(0.5).unwrap().fraction(), 0.5);
    }

    #[test]
    fn verify_accepts_only_perfect_agreement() {
        let clean = verify(&[true, false, true], &[true, false, true]).unwrap();
        assert_eq!(clean.error_count, 0);
        assert_eq!(clean.qber, 0.0);
        assert!(clean.verified);

        let noisy = verify(&[true, false, true, true], &[true, true, true, true]).unwrap();
        assert_eq!(noisy.error_count, 1);
        assert_eq!(noisy.qber, 25.0);
        assert!(!noisy.verified);
    }

    #[test]
    fn verify_empty_sample_has_zero_qber() {
        let v = verify(&[], &[]).unwrap();
        assert_eq!(v.qber, 0.0);
        assert_eq!(v.error_count, 0);
    }

    #[test]
    fn verify_rejects_length_mismatch() {
        assert!(matches!(
            verify(&[true], &[true, false]),
            Err(ProtocolError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn verification_serializes_camel_case() {
        let v = Verification {
            error_count: 2,
            qber: 10.0,
            verified: false,
        };
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json["errorCount"], 2);
        assert_eq!(json["verified"], false);
    }

    #[quickcheck]
    fn sample_and_remaining_partition_the_key(sifted: Vec<bool>, seed: u64) -> bool {
        let sample = sampler(seed).sample(&sifted);

        let disjoint_sorted = sample.indices.windows(2).all(|w| w[0] < w[1]);
        let in_range = sample.indices.iter().all(|&i| i < sifted.len());
        disjoint_sorted
            && in_range
            && sample.indices.len() + sample.remaining.len() == sifted.len()
            && remove_sampled(&sifted, &sample.indices) == sample.remaining
    }
}
