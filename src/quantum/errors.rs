use num_complex::Complex64;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum GateError {
    #[error("Gate matrix is not unitary")]
    NonUnitary,

    #[error("Single-qubit gate must be 2x2, got {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },
}

#[derive(Error, Debug, Clone)]
pub enum MeasurementError {
    #[error("Measurement needs at least one operator")]
    Empty,

    #[error("Measurement operators violate the completeness relation")]
    NotComplete,

    #[error("Measurement operators must be 2x2")]
    InvalidDimensions,
}

#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    #[error("Noise channel needs at least one Kraus operator")]
    Empty,

    #[error("Kraus operators are not trace preserving")]
    NotComplete,

    #[error("Kraus operators must be 2x2")]
    InvalidDimensions,

    #[error("Probability {0} outside [0, 1]")]
    InvalidProbability(f64),

    #[error("Invalid relaxation times T1={t1}us, T2={t2}us; need T1 > 0 and 0 < T2 <= 2*T1")]
    InvalidRelaxation { t1: f64, t2: f64 },
}

/// Failures while evolving or measuring a [`super::QubitState`].
#[derive(Error, Debug, Clone)]
pub enum StateError {
    #[error("Density matrix trace is {0}, expected 1")]
    InvalidTrace(Complex64),

    #[error("Selected outcome {index} has vanishing probability {probability}")]
    VanishingOutcome { index: usize, probability: f64 },

    #[error(transparent)]
    Measurement(#[from] MeasurementError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
