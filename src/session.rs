//! Per-party protocol state.
//!
//! Lifecycle: `Empty -> Generated -> Measured -> Sifted -> Sampled -> {Verified | Rejected}`.
//! Each step writes all of its fields at once or returns an error and leaves the
//! session untouched. Starting a new round discards any previous shared key.

use crate::errors::ProtocolError;
use crate::qubit::Basis;
use crate::sampling::{KeySample, Verification};
use crate::sifting::SiftedKey;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SessionState {
    #[default]
    Empty,
    Generated,
    Measured,
    Sifted,
    Sampled,
    Verified,
    Rejected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Empty => "empty",
            SessionState::Generated => "generated",
            SessionState::Measured => "measured",
            SessionState::Sifted => "sifted",
            SessionState::Sampled => "sampled",
            SessionState::Verified => "verified",
            SessionState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Sender,
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => f.write_str("sender"),
            Role::Receiver => f.write_str("receiver"),
        }
    }
}

/// State owned by one party for one key exchange.
///
/// For the sender `raw_bits`/`raw_bases` are the prepared qubits. For the
/// receiver `raw_bases` are its measurement choices, `raw_indices` the sender
/// positions they were made at and `measured_bits` the outcomes.
#[derive(Debug, Clone)]
pub struct Session {
    role: Role,
    state: SessionState,
    raw_bits: Vec<bool>,
    raw_bases: Vec<Basis>,
    raw_indices: Vec<usize>,
    measured_bits: Option<Vec<bool>>,
    peer_bases: Option<Vec<Basis>>,
    sifted: Option<SiftedKey>,
    sample: Option<KeySample>,
    verification: Option<Verification>,
    shared_key: Option<Vec<bool>>,
}

impl Session {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: SessionState::Empty,
            raw_bits: Vec::new(),
            raw_bases: Vec::new(),
            raw_indices: Vec::new(),
            measured_bits: None,
            peer_bases: None,
            sifted: None,
            sample: None,
            verification: None,
            shared_key: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn raw_bits(&self) -> &[bool] {
        &self.raw_bits
    }

    pub fn raw_bases(&self) -> &[Basis] {
        &self.raw_bases
    }

    pub fn raw_indices(&self) -> &[usize] {
        &self.raw_indices
    }

    pub fn measured_bits(&self) -> Option<&[bool]> {
        self.measured_bits.as_deref()
    }

    pub fn peer_bases(&self) -> Option<&[Basis]> {
        self.peer_bases.as_deref()
    }

    pub fn sifted(&self) -> Option<&SiftedKey> {
        self.sifted.as_ref()
    }

    pub fn sample(&self) -> Option<&KeySample> {
        self.sample.as_ref()
    }

    pub fn verification(&self) -> Option<&Verification> {
        self.verification.as_ref()
    }

    pub fn shared_key(&self) -> Option<&[bool]> {
        self.shared_key.as_deref()
    }

    /// Fails with `InvalidState` unless the session is in one of `allowed`.
    pub fn ensure(&self, step: &'static str, allowed: &[SessionState]) -> Result<(), ProtocolError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ProtocolError::InvalidState {
                step,
                state: self.state,
            })
        }
    }

    /// Drops everything, including a verified shared key.
    pub fn reset(&mut self) {
        *self = Session::new(self.role);
    }

    /// Starts a sender round from freshly generated bits and bases.
    pub fn begin(&mut self, raw_bits: Vec<bool>, raw_bases: Vec<Basis>) -> Result<(), ProtocolError> {
        if raw_bits.is_empty() {
            return Err(ProtocolError::ZeroLength);
        }
        if raw_bits.len() != raw_bases.len() {
            return Err(ProtocolError::LengthMismatch {
                what: "raw bases",
                expected: raw_bits.len(),
                got: raw_bases.len(),
            });
        }

        let indices = (0..raw_bits.len()).collect();
        self.reset();
        self.raw_bits = raw_bits;
        self.raw_bases = raw_bases;
        self.raw_indices = indices;
        self.state = SessionState::Generated;
        Ok(())
    }

    /// Starts a receiver round from its measurements.
    pub fn record_measurements(
        &mut self,
        indices: Vec<usize>,
        bases: Vec<Basis>,
        bits: Vec<bool>,
    ) -> Result<(), ProtocolError> {
        if bases.len() != indices.len() || bits.len() != indices.len() {
            return Err(ProtocolError::LengthMismatch {
                what: "measurement record",
                expected: indices.len(),
                got: bases.len().min(bits.len()),
            });
        }
        if indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ProtocolError::UnorderedIndices("measurement record"));
        }

        self.reset();
        self.raw_indices = indices;
        self.raw_bases = bases;
        self.measured_bits = Some(bits);
        self.state = SessionState::Measured;
        Ok(())
    }

    pub fn record_sift(&mut self, peer_bases: Vec<Basis>, sifted: SiftedKey) -> Result<(), ProtocolError> {
        self.ensure("sift", &[SessionState::Measured])?;
        self.peer_bases = Some(peer_bases);
        self.sifted = Some(sifted);
        self.state = SessionState::Sifted;
        Ok(())
    }

    pub fn record_sample(&mut self, sample: KeySample) -> Result<(), ProtocolError> {
        self.ensure("sample", &[SessionState::Sifted])?;
        self.sample = Some(sample);
        self.state = SessionState::Sampled;
        Ok(())
    }

    /// Closes a receiver round; the remaining key becomes the shared key on success.
    pub fn record_conclusion(&mut self, verification: Verification) -> Result<(), ProtocolError> {
        self.ensure("conclude", &[SessionState::Sampled])?;
        if verification.verified {
            self.shared_key = self.sample.as_ref().map(|s| s.remaining.clone());
            self.state = SessionState::Verified;
        } else {
            self.shared_key = None;
            self.state = SessionState::Rejected;
        }
        self.verification = Some(verification);
        Ok(())
    }

    /// Closes a sender round in one step from the receiver's disclosure.
    pub fn record_sender_verification(
        &mut self,
        sifted: SiftedKey,
        sample: KeySample,
        verification: Verification,
    ) -> Result<(), ProtocolError> {
        self.ensure("verify sample", &[SessionState::Generated])?;
        if verification.verified {
            self.shared_key = Some(sample.remaining.clone());
            self.state = SessionState::Verified;
        } else {
            self.shared_key = None;
            self.state = SessionState::Rejected;
        }
        self.sifted = Some(sifted);
        self.sample = Some(sample);
        self.verification = Some(verification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled_receiver() -> Session {
        let mut session = Session::new(Role::Receiver);
        session
            .record_measurements(vec![0, 1, 2], vec![Basis::Rectilinear; 3], vec![true, false, true])
            .unwrap();
        session
            .record_sift(
                vec![Basis::Rectilinear; 3],
                SiftedKey {
                    bits: vec![true, false, true],
                    match_indices: vec![0, 1, 2],
                },
            )
            .unwrap();
        session
            .record_sample(KeySample {
                indices: vec![1],
                bits: vec![false],
                remaining: vec![true, true],
            })
            .unwrap();
        session
    }

    #[test]
    fn new_session_is_empty() {
        let session = Session::new(Role::Sender);
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.shared_key().is_none());
    }

    #[test]
    fn receiver_walks_the_lifecycle() {
        let mut session = sampled_receiver();
        assert_eq!(session.state(), SessionState::Sampled);

        session
            .record_conclusion(Verification {
                error_count: 0,
                qber: 0.0,
                verified: true,
            })
            .unwrap();
        assert_eq!(session.state(), SessionState::Verified);
        assert_eq!(session.shared_key(), Some(&[true, true][..]));
    }

    #[test]
    fn rejection_stores_no_key() {
        let mut session = sampled_receiver();
        session
            .record_conclusion(Verification {
                error_count: 1,
                qber: 100.0,
                verified: false,
            })
            .unwrap();
        assert_eq!(session.state(), SessionState::Rejected);
        assert!(session.shared_key().is_none());
    }

    #[test]
    fn out_of_order_step_leaves_state_unchanged() {
        let mut session = Session::new(Role::Receiver);
        let err = session.record_sample(KeySample::default()).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidState {
                step: "sample",
                state: SessionState::Empty
            }
        ));
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.sample().is_none());
    }

    #[test]
    fn new_round_discards_shared_key() {
        let mut session = Session::new(Role::Sender);
        session.begin(vec![true, false], vec![Basis::Diagonal; 2]).unwrap();
        session
            .record_sender_verification(
                SiftedKey::default(),
                KeySample {
                    remaining: vec![true],
                    ..KeySample::default()
                },
                Verification {
                    error_count: 0,
                    qber: 0.0,
                    verified: true,
                },
            )
            .unwrap();
        assert!(session.shared_key().is_some());

        session.begin(vec![false], vec![Basis::Rectilinear]).unwrap();
        assert_eq!(session.state(), SessionState::Generated);
        assert!(session.shared_key().is_none());
        assert!(session.sifted().is_none());
    }

    #[test]
    fn begin_rejects_bad_input_without_touching_state() {
        let mut session = Session::new(Role::Sender);
        session.begin(vec![true], vec![Basis::Diagonal]).unwrap();

        assert!(matches!(
            session.begin(vec![true, false], vec![Basis::Diagonal]),
            Err(ProtocolError::LengthMismatch { .. })
        ));
        assert_eq!(session.raw_bits(), &[true]);
        assert_eq!(session.state(), SessionState::Generated);
    }

    #[test]
    fn sender_cannot_verify_twice() {
        let mut session = Session::new(Role::Sender);
        session.begin(vec![true], vec![Basis::Diagonal]).unwrap();
        let v = Verification {
            error_count: 1,
            qber: 100.0,
            verified: false,
        };
        session
            .record_sender_verification(SiftedKey::default(), KeySample::default(), v)
            .unwrap();
        assert!(
            session
                .record_sender_verification(SiftedKey::default(), KeySample::default(), v)
                .is_err()
        );
        assert_eq!(session.state(), SessionState::Rejected);
    }
}
