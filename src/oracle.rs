//! Preparation and measurement of single qubits.
//!
//! The protocol engine only depends on [`QuantumOracle`]. [`SimulatedOracle`]
//! implements it with the density-matrix simulator in [`crate::quantum`].

use crate::config::NoiseConfig;
use crate::quantum::errors::{ChannelError, StateError};
use crate::quantum::{Gate, Measurement, NoiseChannel, QubitState};
use crate::qubit::{Basis, QubitDescriptor};

/// Default single-gate duration in nanoseconds used for thermal relaxation.
pub const DEFAULT_GATE_TIME_NS: f64 = 50.0;

/// Physical noise seen by the qubit itself, as opposed to classical bit flips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelNoise {
    /// Depolarizing probability per gate.
    pub rate: f64,
    /// T1 in microseconds.
    pub t1: f64,
    /// T2 in microseconds.
    pub t2: f64,
}

impl ChannelNoise {
    pub const IDEAL: ChannelNoise = ChannelNoise {
        rate: 0.0,
        t1: crate::config::DEFAULT_T1_US,
        t2: crate::config::DEFAULT_T2_US,
    };

    /// A zero depolarizing rate selects the ideal channel; T1/T2 only apply
    /// alongside a nonzero rate. Any other rate, negative ones included, goes
    /// through channel validation.
    pub fn is_ideal(&self) -> bool {
        self.rate == 0.0
    }
}

impl From<&NoiseConfig> for ChannelNoise {
    fn from(config: &NoiseConfig) -> Self {
        Self {
            rate: config.channel_noise_rate,
            t1: config.t1,
            t2: config.t2,
        }
    }
}

/// Prepares a qubit from its classical description and measures it.
///
/// Same basis: returns the encoded bit, up to noise. Different basis: returns a
/// uniformly random bit regardless of the encoded one.
pub trait QuantumOracle {
    fn prepare_and_measure(
        &self,
        qubit: QubitDescriptor,
        measure_basis: Basis,
        noise: &ChannelNoise,
    ) -> Result<bool, StateError>;
}

/// Density-matrix oracle.
///
/// Preparation applies X for bit 1 then H for the diagonal basis. Measuring in
/// the diagonal basis applies H before a Z measurement. Under noise, every gate
/// (including an identity step for the transit itself) is followed by a
/// depolarizing channel composed with thermal relaxation.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedOracle {
    gate_time_ns: f64,
}

impl Default for SimulatedOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedOracle {
    pub fn new() -> Self {
        Self {
            gate_time_ns: DEFAULT_GATE_TIME_NS,
        }
    }

    /// Oracle whose thermal relaxation acts over `gate_time_ns` per gate.
    pub fn with_gate_time(gate_time_ns: f64) -> Self {
        Self { gate_time_ns }
    }

    /// The per-gate error channel, or `None` for the ideal channel.
    pub fn gate_noise(&self, noise: &ChannelNoise) -> Result<Option<NoiseChannel>, ChannelError> {
        if noise.is_ideal() {
            return Ok(None);
        }

        let depolarizing = NoiseChannel::depolarizing(noise.rate)?;
        let thermal = NoiseChannel::thermal_relaxation(noise.t1, noise.t2, self.gate_time_ns)?;
        Ok(Some(depolarizing.compose(&thermal)))
    }
}

impl QuantumOracle for SimulatedOracle {
    fn prepare_and_measure(
        &self,
        qubit: QubitDescriptor,
        measure_basis: Basis,
        noise: &ChannelNoise,
    ) -> Result<bool, StateError> {
        let error_channel = self.gate_noise(noise)?;
        let mut state = QubitState::new();

        let step = |state: &mut QubitState, gate: &Gate| {
            state.apply(gate);
            if let Some(channel) = &error_channel {
                state.apply_channel(channel);
            }
        };

        let hadamard = Gate::h()?;

        // Sender preparation
        if qubit.bit {
            step(&mut state, &Gate::x()?);
        }
        if qubit.basis.is_diagonal() {
            step(&mut state, &hadamard);
        }

        // Transit
        step(&mut state, &Gate::i()?);

        // Receiver rotation into the computational basis
        if measure_basis.is_diagonal() {
            step(&mut state, &hadamard);
        }

        let outcome = state.measure(&Measurement::z_basis()?, &mut rand::rng())?;
        Ok(outcome == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIALS: usize = 1000;

    fn zero_frequency(qubit: QubitDescriptor, basis: Basis, noise: &ChannelNoise) -> f64 {
        zero_frequency_with(&SimulatedOracle::new(), qubit, basis, noise)
    }

    fn zero_frequency_with(
        oracle: &SimulatedOracle,
        qubit: QubitDescriptor,
        basis: Basis,
        noise: &ChannelNoise,
    ) -> f64 {
        let zeros = (0..TRIALS)
            .filter(|_| !oracle.prepare_and_measure(qubit, basis, noise).unwrap())
            .count();
        zeros as f64 / TRIALS as f64
    }

    #[test]
    fn same_basis_is_deterministic_on_ideal_channel() {
        let oracle = SimulatedOracle::new();
        for basis in [Basis::Rectilinear, Basis::Diagonal] {
            for bit in [false, true] {
                let qubit = QubitDescriptor::new(bit, basis);
                for _ in 0..TRIALS {
                    assert_eq!(
                        oracle
                            .prepare_and_measure(qubit, basis, &ChannelNoise::IDEAL)
                            .unwrap(),
                        bit
                    );
                }
            }
        }
    }

    #[test]
    fn mismatched_basis_is_uniform() {
        let freq = zero_frequency(
            QubitDescriptor::new(false, Basis::Diagonal),
            Basis::Rectilinear,
            &ChannelNoise::IDEAL,
        );
        assert!((0.40..=0.60).contains(&freq), "zero frequency {freq}");

        let freq = zero_frequency(
            QubitDescriptor::new(true, Basis::Rectilinear),
            Basis::Diagonal,
            &ChannelNoise::IDEAL,
        );
        assert!((0.40..=0.60).contains(&freq), "zero frequency {freq}");
    }

    #[test]
    fn channel_noise_introduces_errors() {
        let noise = ChannelNoise {
            rate: 0.3,
            ..ChannelNoise::IDEAL
        };
        let freq = zero_frequency(QubitDescriptor::new(false, Basis::Rectilinear), Basis::Rectilinear, &noise);
        assert!(freq < 0.95, "zero frequency {freq}");
        assert!(freq > 0.6, "zero frequency {freq}");
    }

    #[test]
    fn invalid_noise_surfaces_as_error() {
        let noise = ChannelNoise {
            rate: 0.1,
            t1: 10.0,
            t2: 50.0,
        };
        let result = SimulatedOracle::new().prepare_and_measure(
            QubitDescriptor::new(false, Basis::Rectilinear),
            Basis::Rectilinear,
            &noise,
        );
        assert!(matches!(result, Err(StateError::Channel(_))));
    }

    #[test]
    fn rates_outside_unit_interval_are_rejected() {
        let qubit = QubitDescriptor::new(true, Basis::Diagonal);
        for rate in [-0.5, 1.5] {
            let noise = ChannelNoise {
                rate,
                ..ChannelNoise::IDEAL
            };
            assert!(!noise.is_ideal());
            let result = SimulatedOracle::new().prepare_and_measure(qubit, Basis::Diagonal, &noise);
            assert!(matches!(
                result,
                Err(StateError::Channel(ChannelError::InvalidProbability(_)))
            ));
        }
    }

    #[test]
    fn longer_gates_relax_more() {
        let noise = ChannelNoise {
            rate: 1e-6,
            t1: 1.0,
            t2: 1.0,
        };
        let slow = SimulatedOracle::with_gate_time(5_000.0);
        let freq = zero_frequency_with(
            &slow,
            QubitDescriptor::new(true, Basis::Rectilinear),
            Basis::Rectilinear,
            &noise,
        );
        assert!(freq > 0.5, "zero frequency {freq}");

        let negative = SimulatedOracle::with_gate_time(-10.0).gate_noise(&noise);
        assert!(matches!(negative, Err(ChannelError::InvalidProbability(_))));
    }

    #[test]
    fn noise_from_config() {
        let config = NoiseConfig {
            channel_noise_rate: 0.05,
            ..NoiseConfig::default()
        };
        let noise = ChannelNoise::from(&config);
        assert!(!noise.is_ideal());
        assert_eq!(noise.t2, config.t2);
        assert!(ChannelNoise::from(&NoiseConfig::ideal()).is_ideal());
    }
}
