//! Noise and adversary injection on the simulated quantum channel.
//!
//! Stages run in a fixed order on the sender's tagged descriptors:
//! 1. intercept-resend eavesdropper (on the original signal),
//! 2. packet loss,
//! 3. classical bit-flip noise on the survivors.

use crate::config::NoiseConfig;
use crate::errors::ProtocolError;
use crate::qubit::{Basis, TaggedQubit};
use rand::rngs::StdRng;
use rand::{CryptoRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

/// Counters reported by one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelReport {
    pub original_count: usize,
    pub dropped_count: usize,
    pub flipped_count: usize,
    /// Descriptors Eve read in the wrong basis and resent with a random bit.
    pub intercepted_count: usize,
}

/// Surviving descriptors, in original relative order, with their original tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub qubits: Vec<TaggedQubit>,
    pub report: ChannelReport,
}

/// Applies [`NoiseConfig`] to a descriptor stream.
///
/// One CSPRNG drives every stage since Eve's basis guess is security relevant.
#[derive(Debug, Clone)]
pub struct ChannelPipeline<R = StdRng> {
    rng: R,
}

impl ChannelPipeline<StdRng> {
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for ChannelPipeline<StdRng> {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

impl<R: CryptoRng> ChannelPipeline<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Runs the full pipeline under one configuration snapshot.
    pub fn transmit(
        &mut self,
        config: &NoiseConfig,
        mut qubits: Vec<TaggedQubit>,
    ) -> Result<Transmission, ProtocolError> {
        config.validate()?;

        let original_count = qubits.len();

        let intercepted_count = if config.eve_active {
            self.intercept_resend(&mut qubits)
        } else {
            0
        };

        let (mut survivors, dropped_count) = self.drop_lost(qubits, config.packet_loss_rate);
        let flipped_count = self.flip_bits(&mut survivors, config.network_noise_rate);

        let report = ChannelReport {
            original_count,
            dropped_count,
            flipped_count,
            intercepted_count,
        };
        debug!(?report, eve = config.eve_active, "channel pipeline applied");

        Ok(Transmission {
            qubits: survivors,
            report,
        })
    }

    /// Eve measures each qubit in a random basis and resends what she read.
    /// A wrong-basis read yields a uniformly random bit.
    fn intercept_resend(&mut self, qubits: &mut [TaggedQubit]) -> usize {
        let mut wrong_reads = 0;
        for tagged in qubits.iter_mut() {
            let eve_basis = Basis::random(&mut self.rng);
            if eve_basis != tagged.qubit.basis {
                tagged.qubit.bit = self.rng.random_bool(0.5);
                wrong_reads += 1;
            }
        }
        wrong_reads
    }

    fn drop_lost(&mut self, qubits: Vec<TaggedQubit>, rate: f64) -> (Vec<TaggedQubit>, usize) {
        if rate <= 0.0 {
            return (qubits, 0);
        }

        let original = qubits.len();
        let survivors: Vec<TaggedQubit> = qubits
            .into_iter()
            .filter(|_| !self.rng.random_bool(rate))
            .collect();
        let dropped = original - survivors.len();
        (survivors, dropped)
    }

    fn flip_bits(&mut self, qubits: &mut [TaggedQubit], rate: f64) -> usize {
        if rate <= 0.0 {
            return 0;
        }

        let mut flipped = 0;
        for tagged in qubits.iter_mut() {
            if self.rng.random_bool(rate) {
                tagged.qubit.bit = !tagged.qubit.bit;
                flipped += 1;
            }
        }
        flipped
    }
}
