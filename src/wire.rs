//! JSON payloads exchanged between the two parties.
//!
//! Bits and bases travel as plain `0`/`1` integers and are validated when
//! converted into the engine's types.

use crate::errors::ProtocolError;
use crate::qubit::{Basis, QubitDescriptor, TaggedQubit, bit_from_u8};
use serde::{Deserialize, Serialize};

/// One record of the simulated quantum channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QubitRecord {
    pub bit: u8,
    pub basis: u8,
    /// Position in the sender's raw sequence; defaults to the record's position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl From<&TaggedQubit> for QubitRecord {
    fn from(tagged: &TaggedQubit) -> Self {
        Self {
            bit: tagged.qubit.bit as u8,
            basis: tagged.qubit.basis.into(),
            index: Some(tagged.index),
        }
    }
}

pub fn encode_payload(qubits: &[TaggedQubit]) -> Vec<QubitRecord> {
    qubits.iter().map(QubitRecord::from).collect()
}

/// Validates a received channel payload.
pub fn decode_payload(records: &[QubitRecord]) -> Result<Vec<TaggedQubit>, ProtocolError> {
    let qubits = records
        .iter()
        .enumerate()
        .map(|(position, record)| -> Result<TaggedQubit, ProtocolError> {
            Ok(TaggedQubit {
                index: record.index.unwrap_or(position),
                qubit: QubitDescriptor::new(bit_from_u8(record.bit)?, Basis::try_from(record.basis)?),
            })
        })
        .collect::<Result<Vec<_>, ProtocolError>>()?;

    if qubits.windows(2).any(|w| w[0].index >= w[1].index) {
        return Err(ProtocolError::UnorderedIndices("qubit payload"));
    }
    Ok(qubits)
}

/// Public basis announcement.
pub fn disclose_bases(bases: &[Basis]) -> Vec<u8> {
    bases.iter().map(|&b| b.into()).collect()
}

pub fn parse_bases(raw: &[u8]) -> Result<Vec<Basis>, ProtocolError> {
    raw.iter().map(|&b| Basis::try_from(b)).collect()
}

pub fn disclose_bits(bits: &[bool]) -> Vec<u8> {
    bits.iter().map(|&b| b as u8).collect()
}

pub fn parse_bits(raw: &[u8]) -> Result<Vec<bool>, ProtocolError> {
    raw.iter().map(|&b| bit_from_u8(b)).collect()
}

/// Receiver -> sender request of the sample-verification exchange.
///
/// Fields are optional on the wire so that a missing one is reported as an
/// input error rather than a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleVerificationRequest {
    #[serde(default)]
    pub sample_indices: Option<Vec<usize>>,
    #[serde(default)]
    pub sample_bits: Option<Vec<u8>>,
    #[serde(default)]
    pub original_match_indices: Option<Vec<usize>>,
}

/// Validated form of [`SampleVerificationRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleDisclosure {
    /// Positions in the sifted key, ascending.
    pub sample_indices: Vec<usize>,
    /// Receiver's bits at those positions.
    pub sample_bits: Vec<bool>,
    /// Sender raw positions that survived sifting, ascending.
    pub original_match_indices: Vec<usize>,
}

impl TryFrom<SampleVerificationRequest> for SampleDisclosure {
    type Error = ProtocolError;

    fn try_from(request: SampleVerificationRequest) -> Result<Self, Self::Error> {
        let sample_indices = request
            .sample_indices
            .ok_or(ProtocolError::MissingField("sampleIndices"))?;
        let sample_bits = request
            .sample_bits
            .ok_or(ProtocolError::MissingField("sampleBits"))?;
        let original_match_indices = request
            .original_match_indices
            .ok_or(ProtocolError::MissingField("originalMatchIndices"))?;

        Ok(Self {
            sample_indices,
            sample_bits: parse_bits(&sample_bits)?,
            original_match_indices,
        })
    }
}

impl From<&SampleDisclosure> for SampleVerificationRequest {
    fn from(disclosure: &SampleDisclosure) -> Self {
        Self {
            sample_indices: Some(disclosure.sample_indices.clone()),
            sample_bits: Some(disclose_bits(&disclosure.sample_bits)),
            original_match_indices: Some(disclosure.original_match_indices.clone()),
        }
    }
}
