use crate::quantum::errors::ChannelError;
use crate::quantum::utils;
use ndarray::Array2;
use num_complex::Complex64;

/// Nanoseconds per microsecond, for converting T1/T2 into gate-time units.
const NS_PER_US: f64 = 1_000.0;

/// A single-qubit noise channel given by its Kraus operators.
#[derive(Clone, Debug)]
pub struct NoiseChannel {
    pub kraus_ops: Vec<Array2<Complex64>>,
}

impl NoiseChannel {
    pub fn new(kraus_ops: Vec<Array2<Complex64>>) -> Result<Self, ChannelError> {
        check_kraus(&kraus_ops)?;
        Ok(Self { kraus_ops })
    }

    /// `self` followed by `then`; the result has one Kraus operator per pair.
    pub fn compose(&self, then: &NoiseChannel) -> NoiseChannel {
        let mut kraus_ops = Vec::with_capacity(self.kraus_ops.len() * then.kraus_ops.len());
        for later in &then.kraus_ops {
            kraus_ops.extend(self.kraus_ops.iter().map(|earlier| later.dot(earlier)));
        }
        NoiseChannel { kraus_ops }
    }

    /// Symmetric Pauli noise: with probability `p` the state is replaced by
    /// the maximally mixed state.
    pub fn depolarizing(p: f64) -> Result<NoiseChannel, ChannelError> {
        validate_prob(p)?;

        let keep = re((1.0 - 0.75 * p).sqrt());
        let pauli = (p / 4.0).sqrt();
        let (zero, w, iw) = (re(0.0), re(pauli), Complex64::new(0.0, pauli));

        NoiseChannel::new(vec![
            utils::matrix2([[keep, zero], [zero, keep]]),
            utils::matrix2([[zero, w], [w, zero]]),
            utils::matrix2([[zero, -iw], [iw, zero]]),
            utils::matrix2([[w, zero], [zero, -w]]),
        ])
    }

    /// Energy relaxation |1> -> |0> with probability `gamma`.
    pub fn amplitude_damping(gamma: f64) -> Result<NoiseChannel, ChannelError> {
        validate_prob(gamma)?;
        NoiseChannel::new(vec![
            utils::matrix2([[re(1.0), re(0.0)], [re(0.0), re((1.0 - gamma).sqrt())]]),
            utils::matrix2([[re(0.0), re(gamma.sqrt())], [re(0.0), re(0.0)]]),
        ])
    }

    /// Pure dephasing with strength `lambda`.
    pub fn phase_damping(lambda: f64) -> Result<NoiseChannel, ChannelError> {
        validate_prob(lambda)?;
        NoiseChannel::new(vec![
            utils::matrix2([[re(1.0), re(0.0)], [re(0.0), re((1.0 - lambda).sqrt())]]),
            utils::matrix2([[re(0.0), re(0.0)], [re(0.0), re(lambda.sqrt())]]),
        ])
    }

    /// Thermal relaxation over one gate of duration `gate_time_ns`.
    ///
    /// `t1_us` and `t2_us` are in microseconds. Amplitude damping uses
    /// $\gamma = 1 - e^{-t/T_1}$; the remaining dephasing rate
    /// $1/T_\phi = 1/T_2 - 1/(2T_1)$ gives $\lambda = 1 - e^{-2t/T_\phi}$ so that
    /// coherences decay as $e^{-t/T_2}$ overall.
    pub fn thermal_relaxation(
        t1_us: f64,
        t2_us: f64,
        gate_time_ns: f64,
    ) -> Result<NoiseChannel, ChannelError> {
        if !(t1_us > 0.0 && t2_us > 0.0 && t2_us <= 2.0 * t1_us) {
            return Err(ChannelError::InvalidRelaxation {
                t1: t1_us,
                t2: t2_us,
            });
        }

        let t1 = t1_us * NS_PER_US;
        let t2 = t2_us * NS_PER_US;

        let gamma = 1.0 - (-gate_time_ns / t1).exp();
        let dephasing_rate = (1.0 / t2 - 1.0 / (2.0 * t1)).max(0.0);
        let lambda = 1.0 - (-2.0 * gate_time_ns * dephasing_rate).exp();

        Ok(Self::amplitude_damping(gamma)?.compose(&Self::phase_damping(lambda)?))
    }
}

fn re(x: f64) -> Complex64 {
    Complex64::new(x, 0.0)
}

fn check_kraus(ops: &[Array2<Complex64>]) -> Result<(), ChannelError> {
    if ops.is_empty() {
        Err(ChannelError::Empty)
    } else if !utils::all_single_qubit(ops) {
        Err(ChannelError::InvalidDimensions)
    } else if !utils::check_completeness(ops) {
        Err(ChannelError::NotComplete)
    } else {
        Ok(())
    }
}

fn validate_prob(p: f64) -> Result<(), ChannelError> {
    match p {
        p if (0.0..=1.0).contains(&p) => Ok(()),
        p => Err(ChannelError::InvalidProbability(p)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depolarizing_is_trace_preserving() {
        let channel = NoiseChannel::depolarizing(0.3).unwrap();
        assert_eq!(channel.kraus_ops.len(), 4);
        assert!(utils::check_completeness(&channel.kraus_ops));
    }

    #[test]
    fn rejects_probability_out_of_range() {
        assert!(matches!(
            NoiseChannel::depolarizing(1.5),
            Err(ChannelError::InvalidProbability(_))
        ));
        assert!(matches!(
            NoiseChannel::amplitude_damping(-0.1),
            Err(ChannelError::InvalidProbability(_))
        ));
    }

    #[test]
    fn thermal_relaxation_composition_is_complete() {
        let channel = NoiseChannel::thermal_relaxation(50.0, 30.0, 50.0).unwrap();
        assert_eq!(channel.kraus_ops.len(), 4);
        assert!(utils::check_completeness(&channel.kraus_ops));
    }

    #[test]
    fn thermal_relaxation_requires_t2_within_twice_t1() {
        assert!(matches!(
            NoiseChannel::thermal_relaxation(10.0, 25.0, 50.0),
            Err(ChannelError::InvalidRelaxation { .. })
        ));
        assert!(NoiseChannel::thermal_relaxation(10.0, 20.0, 50.0).is_ok());
    }
}
