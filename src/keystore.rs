//! A node hosting both protocol roles.
//!
//! Each role's session sits behind its own lock and is only touched by that
//! role's steps. The roles exchange nothing but wire payloads, so a `KeyStore`
//! can serve as either end of a two-machine exchange or run a whole round
//! locally.

use crate::channel::{ChannelPipeline, ChannelReport};
use crate::config::{NoiseConfig, NoiseSettings};
use crate::errors::ProtocolError;
use crate::oracle::{ChannelNoise, QuantumOracle, SimulatedOracle};
use crate::party::{KeyOutcome, Receiver, Sender};
use crate::sampling::Verification;
use crate::session::{Role, SessionState};
use crate::sifting::SiftedKey;
use crate::wire::{
    self, QubitRecord, SampleDisclosure, SampleVerificationRequest, decode_payload, encode_payload,
};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the receiver got out of one channel transmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reception {
    pub channel: ChannelReport,
    pub receiver_bases: Vec<u8>,
    pub measured_bits: Vec<u8>,
}

/// Summary of a locally driven round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub channel: ChannelReport,
    pub sifted_length: usize,
    pub sample_length: usize,
    pub verification: Verification,
    pub outcome: KeyOutcome,
}

pub struct KeyStore<O = SimulatedOracle> {
    sender: Mutex<Sender>,
    receiver: Mutex<Receiver>,
    pipeline: Mutex<ChannelPipeline>,
    noise: NoiseSettings,
    oracle: O,
}

impl KeyStore<SimulatedOracle> {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(Sender::new()),
            receiver: Mutex::new(Receiver::new()),
            pipeline: Mutex::new(ChannelPipeline::from_os_rng()),
            noise: NoiseSettings::default(),
            oracle: SimulatedOracle::new(),
        }
    }
}

impl Default for KeyStore<SimulatedOracle> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: QuantumOracle> KeyStore<O> {
    pub fn with_oracle(oracle: O, config: NoiseConfig) -> Result<Self, ProtocolError> {
        Ok(Self {
            sender: Mutex::new(Sender::new()),
            receiver: Mutex::new(Receiver::new()),
            pipeline: Mutex::new(ChannelPipeline::from_os_rng()),
            noise: NoiseSettings::new(config)?,
            oracle,
        })
    }

    pub fn noise(&self) -> &NoiseSettings {
        &self.noise
    }

    pub fn state(&self, role: Role) -> SessionState {
        match role {
            Role::Sender => lock(&self.sender).session().state(),
            Role::Receiver => lock(&self.receiver).session().state(),
        }
    }

    pub fn shared_key(&self, role: Role) -> Option<Vec<bool>> {
        match role {
            Role::Sender => lock(&self.sender).shared_key().map(<[bool]>::to_vec),
            Role::Receiver => lock(&self.receiver).shared_key().map(<[bool]>::to_vec),
        }
    }

    pub fn reset(&self, role: Role) {
        match role {
            Role::Sender => lock(&self.sender).reset(),
            Role::Receiver => lock(&self.receiver).reset(),
        }
        info!(%role, "session reset");
    }

    // --- Sender side ---

    /// Starts a sender round and returns the channel payload.
    pub fn generate(&self, length: usize) -> Result<Vec<QubitRecord>, ProtocolError> {
        let payload = lock(&self.sender).generate(length)?;
        Ok(encode_payload(&payload))
    }

    /// Payload of the current sender round, for a peer fetching it.
    pub fn quantum_payload(&self) -> Result<Vec<QubitRecord>, ProtocolError> {
        let payload = lock(&self.sender).quantum_payload()?;
        Ok(encode_payload(&payload))
    }

    pub fn sender_bases(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(wire::disclose_bases(lock(&self.sender).public_bases()?))
    }

    pub fn verify_sample(&self, request: SampleVerificationRequest) -> Result<Verification, ProtocolError> {
        let disclosure = SampleDisclosure::try_from(request)?;
        lock(&self.sender).verify_sample(&disclosure)
    }

    // --- Receiver side ---

    /// Runs the payload through the channel pipeline under the current noise
    /// snapshot and measures the survivors.
    pub fn receive(&self, payload: &[QubitRecord]) -> Result<Reception, ProtocolError> {
        let qubits = decode_payload(payload)?;
        let config = self.noise.snapshot();

        let transmission = lock(&self.pipeline).transmit(&config, qubits)?;
        let noise = ChannelNoise::from(config.as_ref());

        let mut receiver = lock(&self.receiver);
        let detections = receiver.measure(&transmission.qubits, &self.oracle, &noise)?;

        Ok(Reception {
            channel: transmission.report,
            receiver_bases: detections.iter().map(|d| u8::from(d.basis)).collect(),
            measured_bits: detections.iter().map(|d| d.bit as u8).collect(),
        })
    }

    pub fn receiver_bases(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(wire::disclose_bases(lock(&self.receiver).public_bases()?))
    }

    pub fn sift(&self, sender_bases: &[u8]) -> Result<SiftedKey, ProtocolError> {
        let bases = wire::parse_bases(sender_bases)?;
        lock(&self.receiver).sift(&bases)
    }

    pub fn sample(&self) -> Result<SampleVerificationRequest, ProtocolError> {
        let disclosure = lock(&self.receiver).sample()?;
        Ok(SampleVerificationRequest::from(&disclosure))
    }

    pub fn conclude(&self, response: Verification) -> Result<KeyOutcome, ProtocolError> {
        lock(&self.receiver).conclude(response)
    }

    /// Drives one full round between the two local roles over wire payloads.
    pub fn run_round(&self, length: usize) -> Result<RoundReport, ProtocolError> {
        let payload = self.generate(length)?;
        let reception = self.receive(&payload)?;

        let sifted = self.sift(&self.sender_bases()?)?;
        let request = self.sample()?;
        let sample_length = request.sample_indices.as_ref().map_or(0, Vec::len);

        let verification = self.verify_sample(request)?;
        let outcome = self.conclude(verification)?;

        info!(
            length,
            sifted = sifted.len(),
            accepted = outcome.is_accepted(),
            "local round finished"
        );

        Ok(RoundReport {
            channel: reception.channel,
            sifted_length: sifted.len(),
            sample_length,
            verification,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoiseUpdate;

    #[test]
    fn local_round_on_ideal_channel_shares_key() {
        let store = KeyStore::new();
        let report = store.run_round(120).unwrap();

        assert!(report.verification.verified);
        assert!(report.outcome.is_accepted());
        assert_eq!(report.channel.original_count, 120);
        assert_eq!(store.state(Role::Sender), SessionState::Verified);
        assert_eq!(store.state(Role::Receiver), SessionState::Verified);
        assert_eq!(store.shared_key(Role::Sender), store.shared_key(Role::Receiver));
        assert_eq!(
            store.shared_key(Role::Sender).map(|k| k.len()),
            Some(report.sifted_length - report.sample_length)
        );
    }

    #[test]
    fn regenerating_clears_shared_key() {
        let store = KeyStore::new();
        store.run_round(40).unwrap();
        assert!(store.shared_key(Role::Sender).is_some());

        store.generate(40).unwrap();
        assert!(store.shared_key(Role::Sender).is_none());
        assert_eq!(store.state(Role::Sender), SessionState::Generated);
    }

    #[test]
    fn reset_returns_to_empty() {
        let store = KeyStore::new();
        store.run_round(20).unwrap();
        store.reset(Role::Receiver);
        assert_eq!(store.state(Role::Receiver), SessionState::Empty);
        assert!(store.shared_key(Role::Receiver).is_none());
        assert!(store.shared_key(Role::Sender).is_some());
    }

    #[test]
    fn full_network_noise_is_rejected() {
        let store = KeyStore::new();
        store
            .noise()
            .update(&NoiseUpdate {
                network_noise_rate: Some(1.0),
                ..NoiseUpdate::default()
            })
            .unwrap();

        let report = store.run_round(200).unwrap();
        assert_eq!(report.channel.flipped_count, 200);
        assert!(!report.verification.verified);
        assert!(!report.outcome.is_accepted());
        assert!(store.shared_key(Role::Sender).is_none());
        assert!(store.shared_key(Role::Receiver).is_none());
        assert_eq!(store.state(Role::Sender), SessionState::Rejected);
    }

    #[test]
    fn invalid_sifting_input_is_reported() {
        let store = KeyStore::new();
        let payload = store.generate(5).unwrap();
        store.receive(&payload).unwrap();
        assert!(matches!(
            store.sift(&[0, 1, 2]),
            Err(ProtocolError::InvalidBasis(2))
        ));
        assert_eq!(store.state(Role::Receiver), SessionState::Measured);
    }

    #[test]
    fn sample_request_without_generation_fails() {
        let store = KeyStore::new();
        let request = SampleVerificationRequest {
            sample_indices: Some(vec![]),
            sample_bits: Some(vec![]),
            original_match_indices: Some(vec![]),
        };
        assert!(matches!(
            store.verify_sample(request),
            Err(ProtocolError::InvalidState { .. })
        ));
    }
}
