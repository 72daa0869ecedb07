//! Classical descriptions of prepared qubits.
//!
//! A [`QubitDescriptor`] is the only thing that ever travels over the simulated
//! quantum channel; no quantum state is serialized.

use crate::errors::ProtocolError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// BB84 encoding/measurement basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Basis {
    /// {|0>, |1>}
    Rectilinear = 0,
    /// {|+>, |->}
    Diagonal = 1,
}

impl Basis {
    /// Draws a basis uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Basis::Diagonal
        } else {
            Basis::Rectilinear
        }
    }

    pub fn is_diagonal(self) -> bool {
        self == Basis::Diagonal
    }
}

impl TryFrom<u8> for Basis {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Basis::Rectilinear),
            1 => Ok(Basis::Diagonal),
            other => Err(ProtocolError::InvalidBasis(other)),
        }
    }
}

impl From<Basis> for u8 {
    fn from(basis: Basis) -> u8 {
        basis as u8
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Basis::Rectilinear => write!(f, "+"),
            Basis::Diagonal => write!(f, "x"),
        }
    }
}

/// Parses a 0/1 wire value into a bit.
pub fn bit_from_u8(value: u8) -> Result<bool, ProtocolError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProtocolError::InvalidBit(other)),
    }
}

/// Renders bits as a compact `0101` string.
pub fn format_bits(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}

/// Classical description `(bit, basis)` of one prepared qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QubitDescriptor {
    pub bit: bool,
    pub basis: Basis,
}

impl QubitDescriptor {
    pub fn new(bit: bool, basis: Basis) -> Self {
        Self { bit, basis }
    }

    /// Ket prepared for this descriptor: rectilinear 0->|0>, 1->|1>;
    /// diagonal 0->|+>, 1->|->.
    pub fn state_label(&self) -> &'static str {
        match (self.basis, self.bit) {
            (Basis::Rectilinear, false) => "|0⟩",
            (Basis::Rectilinear, true) => "|1⟩",
            (Basis::Diagonal, false) => "|+⟩",
            (Basis::Diagonal, true) => "|−⟩",
        }
    }
}

/// A descriptor tagged with its position in the sender's raw sequence.
///
/// The tag survives packet loss so that the receiver's detections can still be
/// aligned with the sender's bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedQubit {
    pub index: usize,
    pub qubit: QubitDescriptor,
}

/// Builds the tagged channel payload for raw bit/basis sequences.
pub fn encode(bits: &[bool], bases: &[Basis]) -> Result<Vec<TaggedQubit>, ProtocolError> {
    if bits.len() != bases.len() {
        return Err(ProtocolError::LengthMismatch {
            what: "bases",
            expected: bits.len(),
            got: bases.len(),
        });
    }

    Ok(bits
        .iter()
        .zip(bases)
        .enumerate()
        .map(|(index, (&bit, &basis))| TaggedQubit {
            index,
            qubit: QubitDescriptor::new(bit, basis),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels_follow_encoding_table() {
        assert_eq!(QubitDescriptor::new(false, Basis::Rectilinear).state_label(), "|0⟩");
        assert_eq!(QubitDescriptor::new(true, Basis::Rectilinear).state_label(), "|1⟩");
        assert_eq!(QubitDescriptor::new(false, Basis::Diagonal).state_label(), "|+⟩");
        assert_eq!(QubitDescriptor::new(true, Basis::Diagonal).state_label(), "|−⟩");
    }

    #[test]
    fn basis_wire_values() {
        assert_eq!(Basis::try_from(0).unwrap(), Basis::Rectilinear);
        assert_eq!(Basis::try_from(1).unwrap(), Basis::Diagonal);
        assert!(matches!(
            Basis::try_from(2),
            Err(ProtocolError::InvalidBasis(2))
        ));
        assert_eq!(serde_json::to_string(&Basis::Diagonal).unwrap(), "1");
        assert!(serde_json::from_str::<Basis>("3").is_err());
    }

    #[test]
    fn encode_tags_positions() {
        let payload = encode(&[true, false], &[Basis::Diagonal, Basis::Rectilinear]).unwrap();
        assert_eq!(payload[0].index, 0);
        assert_eq!(payload[1].index, 1);
        assert_eq!(payload[0].qubit, QubitDescriptor::new(true, Basis::Diagonal));
    }

    #[test]
    fn encode_rejects_mismatched_lengths() {
        assert!(matches!(
            encode(&[true], &[]),
            Err(ProtocolError::LengthMismatch { expected: 1, got: 0, .. })
        ));
    }
}
