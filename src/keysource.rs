//! Security-relevant randomness: raw key bits and basis choices.

use crate::errors::ProtocolError;
use crate::qubit::Basis;
use rand::rngs::StdRng;
use rand::{CryptoRng, Rng, SeedableRng};

/// Cryptographically secure source of bits and bases.
///
/// Only `CryptoRng` generators are accepted; sampling shuffles use the separate
/// general-purpose generator in [`crate::sampling::Sampler`].
#[derive(Debug, Clone)]
pub struct KeySource<R = StdRng> {
    rng: R,
}

impl KeySource<StdRng> {
    /// Seeds a ChaCha-based generator from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for KeySource<StdRng> {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

impl<R: CryptoRng> KeySource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generates `length` independent uniform bits and bases.
    pub fn generate(&mut self, length: usize) -> Result<(Vec<bool>, Vec<Basis>), ProtocolError> {
        if length == 0 {
            return Err(ProtocolError::ZeroLength);
        }

        let mut bits = Vec::with_capacity(length);
        let mut bases = Vec::with_capacity(length);
        for _ in 0..length {
            bits.push(self.bit());
            bases.push(self.basis());
        }

        Ok((bits, bases))
    }

    /// Generates `length` uniform bases, e.g. for the receiver's measurement choices.
    pub fn bases(&mut self, length: usize) -> Vec<Basis> {
        (0..length).map(|_| self.basis()).collect()
    }

    pub fn bit(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    pub fn basis(&mut self) -> Basis {
        Basis::random(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_returns_requested_length() {
        let mut keys = KeySource::new(StdRng::seed_from_u64(1));
        for length in [1, 7, 128] {
            let (bits, bases) = keys.generate(length).unwrap();
            assert_eq!(bits.len(), length);
            assert_eq!(bases.len(), length);
        }
    }

    #[test]
    fn zero_length_is_rejected() {
        let mut keys = KeySource::from_os_rng();
        assert!(matches!(keys.generate(0), Err(ProtocolError::ZeroLength)));
    }

    #[test]
    fn bits_and_bases_are_balanced() {
        let mut keys = KeySource::new(StdRng::seed_from_u64(99));
        let (bits, bases) = keys.generate(20_000).unwrap();

        let ones = bits.iter().filter(|&&b| b).count() as f64 / 20_000.0;
        let diagonal = bases.iter().filter(|b| b.is_diagonal()).count() as f64 / 20_000.0;
        assert!((0.45..=0.55).contains(&ones), "ones frequency {ones}");
        assert!((0.45..=0.55).contains(&diagonal), "diagonal frequency {diagonal}");

        // Adjacent positions should agree about half the time.
        let agreements = bits.windows(2).filter(|w| w[0] == w[1]).count() as f64 / 19_999.0;
        assert!((0.45..=0.55).contains(&agreements), "agreement {agreements}");
    }
}
