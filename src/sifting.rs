//! Basis reconciliation.

use crate::errors::ProtocolError;
use crate::qubit::Basis;
use serde::Serialize;
use tracing::debug;

/// Receiver bits kept where both parties used the same basis, with the raw
/// positions they came from. `bits[i]` was measured at `match_indices[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiftedKey {
    pub bits: Vec<bool>,
    pub match_indices: Vec<usize>,
}

impl SiftedKey {
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

/// One receiver measurement, tagged with the sender's raw index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub index: usize,
    pub basis: Basis,
    pub bit: bool,
}

/// Positional sifting.
///
/// Compares bases up to the shorter of the two basis sequences; a length
/// difference (e.g. after packet loss) truncates rather than fails. The
/// receiver's own bases and bits must have equal length.
pub fn sift(
    sender_bases: &[Basis],
    receiver_bases: &[Basis],
    receiver_bits: &[bool],
) -> Result<SiftedKey, ProtocolError> {
    if receiver_bases.len() != receiver_bits.len() {
        return Err(ProtocolError::LengthMismatch {
            what: "receiver bits",
            expected: receiver_bases.len(),
            got: receiver_bits.len(),
        });
    }

    let compared = sender_bases.len().min(receiver_bases.len());
    if sender_bases.len() != receiver_bases.len() {
        debug!(
            sender = sender_bases.len(),
            receiver = receiver_bases.len(),
            compared,
            "basis sequences differ in length, truncating"
        );
    }

    let mut sifted = SiftedKey::default();
    for (i, (a, b)) in sender_bases.iter().zip(receiver_bases).enumerate() {
        if a == b {
            sifted.bits.push(receiver_bits[i]);
            sifted.match_indices.push(i);
        }
    }
    Ok(sifted)
}

/// Sifting of tagged detections against the sender's full basis sequence.
///
/// Detections must be in strictly increasing index order; ones whose index lies
/// past the sender's sequence are ignored, as with positional truncation.
pub fn sift_detections(
    sender_bases: &[Basis],
    detections: &[Detection],
) -> Result<SiftedKey, ProtocolError> {
    if detections.windows(2).any(|w| w[0].index >= w[1].index) {
        return Err(ProtocolError::UnorderedIndices("detections"));
    }

    let mut sifted = SiftedKey::default();
    for detection in detections {
        match sender_bases.get(detection.index) {
            Some(&basis) if basis == detection.basis => {
                sifted.bits.push(detection.bit);
                sifted.match_indices.push(detection.index);
            }
            Some(_) => {}
            None => {
                debug!(index = detection.index, "detection beyond sender sequence ignored");
            }
        }
    }
    Ok(sifted)
}
