//! The two protocol roles.
//!
//! Each party owns its [`Session`] and talks to the other only through the
//! payloads in [`crate::wire`].

use crate::errors::ProtocolError;
use crate::keysource::KeySource;
use crate::oracle::{ChannelNoise, QuantumOracle};
use crate::qubit::{Basis, TaggedQubit, encode};
use crate::sampling::{self, KeySample, Sampler, Verification, remove_sampled};
use crate::session::{Role, Session, SessionState};
use crate::sifting::{Detection, SiftedKey, sift_detections};
use crate::wire::SampleDisclosure;
use rand::rngs::{SmallRng, StdRng};
use rand::{CryptoRng, RngCore};
use tracing::{debug, info, warn};

/// Final result of a round as seen by one party.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Accepted { key: Vec<bool> },
    /// The sample disagreed; no key was stored.
    Rejected { error_count: usize, qber: f64 },
}

impl KeyOutcome {
    fn from_session(session: &Session, verification: &Verification) -> Self {
        match session.shared_key() {
            Some(key) if verification.verified => KeyOutcome::Accepted { key: key.to_vec() },
            _ => KeyOutcome::Rejected {
                error_count: verification.error_count,
                qber: verification.qber,
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, KeyOutcome::Accepted { .. })
    }
}

fn check_ascending(
    indices: &[usize],
    bound: usize,
    what: &'static str,
    out_of_range: impl Fn(usize, usize) -> ProtocolError,
) -> Result<(), ProtocolError> {
    if indices.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ProtocolError::UnorderedIndices(what));
    }
    match indices.last() {
        Some(&last) if last >= bound => Err(out_of_range(last, bound)),
        _ => Ok(()),
    }
}

/// The party that prepares qubits and checks the receiver's sample.
#[derive(Debug)]
pub struct Sender<R = StdRng> {
    keys: KeySource<R>,
    session: Session,
    /// Smallest fraction of the sifted key a disclosed sample must cover.
    sample_fraction: f64,
}

impl Sender<StdRng> {
    pub fn new() -> Self {
        Self::with_key_source(KeySource::from_os_rng())
    }
}

impl Default for Sender<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CryptoRng> Sender<R> {
    pub fn with_key_source(keys: KeySource<R>) -> Self {
        Self {
            keys,
            session: Session::new(Role::Sender),
            sample_fraction: sampling::DEFAULT_SAMPLE_FRACTION,
        }
    }

    /// Sets the fraction the receiver's sample is checked against; it should
    /// match the receiver's [`Sampler`] fraction.
    pub fn with_sample_fraction(mut self, fraction: f64) -> Result<Self, ProtocolError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ProtocolError::InvalidFraction(fraction));
        }
        self.sample_fraction = fraction;
        Ok(self)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn shared_key(&self) -> Option<&[bool]> {
        self.session.shared_key()
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Starts a new round with `length` random qubits and returns the channel payload.
    /// Any previously shared key is discarded.
    pub fn generate(&mut self, length: usize) -> Result<Vec<TaggedQubit>, ProtocolError> {
        let (bits, bases) = self.keys.generate(length)?;
        let payload = encode(&bits, &bases)?;
        self.session.begin(bits, bases)?;
        debug!(length, "sender prepared qubits");
        Ok(payload)
    }

    /// The channel payload of the current round.
    pub fn quantum_payload(&self) -> Result<Vec<TaggedQubit>, ProtocolError> {
        self.session.ensure("send qubits", &[SessionState::Generated])?;
        encode(self.session.raw_bits(), self.session.raw_bases())
    }

    /// Encoding bases for public reconciliation.
    pub fn public_bases(&self) -> Result<&[Basis], ProtocolError> {
        self.session.ensure(
            "disclose bases",
            &[
                SessionState::Generated,
                SessionState::Verified,
                SessionState::Rejected,
            ],
        )?;
        Ok(self.session.raw_bases())
    }

    /// Compares the receiver's disclosed sample against the sender's own bits.
    ///
    /// The sender rebuilds its sifted key from `original_match_indices` and
    /// refuses samples smaller than [`sampling::sample_size`] of it. On a
    /// clean sample the sifted key minus the sampled positions becomes the
    /// shared key; otherwise nothing is stored.
    pub fn verify_sample(&mut self, disclosure: &SampleDisclosure) -> Result<Verification, ProtocolError> {
        self.session.ensure("verify sample", &[SessionState::Generated])?;

        let raw_bits = self.session.raw_bits();
        let match_indices = &disclosure.original_match_indices;
        check_ascending(match_indices, raw_bits.len(), "originalMatchIndices", |index, len| {
            ProtocolError::MatchIndexOutOfRange { index, len }
        })?;

        if disclosure.sample_indices.len() != disclosure.sample_bits.len() {
            return Err(ProtocolError::LengthMismatch {
                what: "sampleBits",
                expected: disclosure.sample_indices.len(),
                got: disclosure.sample_bits.len(),
            });
        }

        // A short sample would let unchecked bits into the key
        let required = sampling::sample_size(match_indices.len(), self.sample_fraction);
        if disclosure.sample_indices.len() < required {
            return Err(ProtocolError::SampleTooSmall {
                got: disclosure.sample_indices.len(),
                required,
                sifted: match_indices.len(),
            });
        }

        let sifted_bits: Vec<bool> = match_indices.iter().map(|&i| raw_bits[i]).collect();
        check_ascending(
            &disclosure.sample_indices,
            sifted_bits.len(),
            "sampleIndices",
            |index, len| ProtocolError::SampleIndexOutOfRange { index, len },
        )?;

        let own_sample: Vec<bool> = disclosure
            .sample_indices
            .iter()
            .map(|&i| sifted_bits[i])
            .collect();
        let verification = sampling::verify(&own_sample, &disclosure.sample_bits)?;

        let sample = KeySample {
            indices: disclosure.sample_indices.clone(),
            bits: own_sample,
            remaining: remove_sampled(&sifted_bits, &disclosure.sample_indices),
        };
        let sifted = SiftedKey {
            bits: sifted_bits,
            match_indices: match_indices.clone(),
        };
        self.session
            .record_sender_verification(sifted, sample, verification)?;

        if verification.verified {
            info!(
                key_length = self.session.shared_key().map_or(0, <[bool]>::len),
                "sender stored shared key"
            );
        } else {
            warn!(
                errors = verification.error_count,
                qber = verification.qber,
                "sample mismatch, sender discarded key"
            );
        }
        Ok(verification)
    }

    /// Outcome of the last concluded round, if any.
    pub fn outcome(&self) -> Option<KeyOutcome> {
        self.session
            .verification()
            .map(|v| KeyOutcome::from_session(&self.session, v))
    }
}

/// The party that measures qubits, sifts and discloses a sample.
#[derive(Debug)]
pub struct Receiver<R = StdRng, S = SmallRng> {
    keys: KeySource<R>,
    sampler: Sampler<S>,
    session: Session,
}

impl Receiver<StdRng, SmallRng> {
    pub fn new() -> Self {
        Self::with_parts(KeySource::from_os_rng(), Sampler::new())
    }
}

impl Default for Receiver<StdRng, SmallRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CryptoRng, S: RngCore> Receiver<R, S> {
    pub fn with_parts(keys: KeySource<R>, sampler: Sampler<S>) -> Self {
        Self {
            keys,
            sampler,
            session: Session::new(Role::Receiver),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn shared_key(&self) -> Option<&[bool]> {
        self.session.shared_key()
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Measures every received qubit in a fresh random basis.
    ///
    /// Starts a new round, discarding any previous shared key.
    pub fn measure<O: QuantumOracle + ?Sized>(
        &mut self,
        qubits: &[TaggedQubit],
        oracle: &O,
        noise: &ChannelNoise,
    ) -> Result<Vec<Detection>, ProtocolError> {
        let bases = self.keys.bases(qubits.len());
        let bits = qubits
            .iter()
            .zip(&bases)
            .map(|(tagged, &basis)| oracle.prepare_and_measure(tagged.qubit, basis, noise))
            .collect::<Result<Vec<bool>, _>>()?;
        let indices: Vec<usize> = qubits.iter().map(|t| t.index).collect();

        self.session.record_measurements(indices, bases, bits)?;
        debug!(received = qubits.len(), "receiver measured qubits");
        Ok(self.detections())
    }

    /// Current measurements tagged with sender positions.
    pub fn detections(&self) -> Vec<Detection> {
        let bits = self.session.measured_bits().unwrap_or_default();
        self.session
            .raw_indices()
            .iter()
            .zip(self.session.raw_bases())
            .zip(bits)
            .map(|((&index, &basis), &bit)| Detection { index, basis, bit })
            .collect()
    }

    /// Measurement bases for public reconciliation.
    pub fn public_bases(&self) -> Result<&[Basis], ProtocolError> {
        if self.session.state() == SessionState::Empty {
            return Err(ProtocolError::InvalidState {
                step: "disclose bases",
                state: SessionState::Empty,
            });
        }
        Ok(self.session.raw_bases())
    }

    /// Keeps the measurements taken in the sender's basis.
    pub fn sift(&mut self, sender_bases: &[Basis]) -> Result<SiftedKey, ProtocolError> {
        self.session.ensure("sift", &[SessionState::Measured])?;

        let sifted = sift_detections(sender_bases, &self.detections())?;
        self.session.record_sift(sender_bases.to_vec(), sifted.clone())?;
        debug!(
            sifted = sifted.len(),
            measured = self.session.raw_indices().len(),
            sender_bases = self.session.peer_bases().map_or(0, <[Basis]>::len),
            "receiver sifted key"
        );
        Ok(sifted)
    }

    /// Picks the sample to disclose to the sender.
    pub fn sample(&mut self) -> Result<SampleDisclosure, ProtocolError> {
        self.session.ensure("sample", &[SessionState::Sifted])?;
        let sifted = self
            .session
            .sifted()
            .cloned()
            .ok_or(ProtocolError::InvalidState {
                step: "sample",
                state: self.session.state(),
            })?;

        let sample = self.sampler.sample(&sifted.bits);
        let disclosure = SampleDisclosure {
            sample_indices: sample.indices.clone(),
            sample_bits: sample.bits.clone(),
            original_match_indices: sifted.match_indices,
        };
        self.session.record_sample(sample)?;
        debug!(sample = disclosure.sample_indices.len(), "receiver disclosed sample");
        Ok(disclosure)
    }

    /// Applies the sender's verdict; the remaining key is kept only when verified.
    pub fn conclude(&mut self, verification: Verification) -> Result<KeyOutcome, ProtocolError> {
        self.session.record_conclusion(verification)?;

        let outcome = KeyOutcome::from_session(&self.session, &verification);
        match &outcome {
            KeyOutcome::Accepted { key } => {
                info!(key_length = key.len(), "receiver stored shared key")
            }
            KeyOutcome::Rejected { error_count, qber } => {
                warn!(errors = error_count, qber, "sample mismatch, receiver discarded key")
            }
        }
        Ok(outcome)
    }
}
