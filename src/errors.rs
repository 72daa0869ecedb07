use crate::quantum::errors::StateError;
use crate::session::SessionState;
use thiserror::Error;

/// Caller-facing failures of the protocol engine.
///
/// A rejected key is not an error: it is reported through
/// [`crate::Verification`] and [`crate::KeyOutcome`].
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Key length must be positive")]
    ZeroLength,

    #[error("Length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Sample index {index} out of range for sifted key of length {len}")]
    SampleIndexOutOfRange { index: usize, len: usize },

    #[error("Match index {index} out of range for raw key of length {len}")]
    MatchIndexOutOfRange { index: usize, len: usize },

    #[error("Indices in {0} must be strictly increasing")]
    UnorderedIndices(&'static str),

    #[error("Invalid bit value {0}: must be 0 or 1")]
    InvalidBit(u8),

    #[error("Invalid basis value {0}: must be 0 (rectilinear) or 1 (diagonal)")]
    InvalidBasis(u8),

    #[error("{name} must be within [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },

    #[error("Thermal parameters must satisfy T1 > 0 and 0 < T2 <= 2*T1, got T1={t1}, T2={t2}")]
    InvalidThermal { t1: f64, t2: f64 },

    #[error("Sample of {got} bits is too small for a sifted key of {sifted} bits, need at least {required}")]
    SampleTooSmall {
        got: usize,
        required: usize,
        sifted: usize,
    },

    #[error("Sample fraction must be within (0, 1], got {0}")]
    InvalidFraction(f64),

    #[error("Cannot {step} while session is {state}")]
    InvalidState {
        step: &'static str,
        state: SessionState,
    },

    #[error("Quantum oracle failure: {0}")]
    Oracle(#[from] StateError),

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}
