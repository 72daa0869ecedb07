use crate::channel::{ChannelPipeline, ChannelReport};
use crate::config::NoiseConfig;
use crate::errors::ProtocolError;
use crate::oracle::{ChannelNoise, QuantumOracle};
use crate::party::{Receiver, Sender};
use crate::sampling::Verification;
use serde::Serialize;
use tracing::info;

/// BB84 results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bb84Report {
    pub raw_length: usize,
    pub received_length: usize,
    pub sifted_length: usize,
    /// Disagreements over the whole sifted key, not just the disclosed sample.
    pub sifted_errors: usize,
    /// `100 * sifted_errors / sifted_length`, 0 for an empty sifted key.
    pub sifted_qber: f64,
    pub channel: ChannelReport,
    pub verification: Verification,
    pub sender_key: Option<Vec<bool>>,
    pub receiver_key: Option<Vec<bool>>,
}

/// Runs one BB84 round between fresh local parties under `config`.
pub fn run<O: QuantumOracle + ?Sized>(
    length: usize,
    config: &NoiseConfig,
    oracle: &O,
) -> Result<Bb84Report, ProtocolError> {
    config.validate()?;

    let mut sender = Sender::new();
    let mut receiver = Receiver::new();
    let mut pipeline = ChannelPipeline::from_os_rng();

    // Sender prepares qubits
    let payload = sender.generate(length)?;

    // Channel, then receiver measurement
    let transmission = pipeline.transmit(config, payload)?;
    receiver.measure(&transmission.qubits, oracle, &ChannelNoise::from(config))?;

    // Sifting stage
    let sifted = receiver.sift(sender.public_bases()?)?;
    let raw_bits = sender.session().raw_bits();
    let sifted_errors = sifted
        .match_indices
        .iter()
        .zip(&sifted.bits)
        .filter(|&(&i, &bit)| raw_bits[i] != bit)
        .count();
    let sifted_qber = if sifted.is_empty() {
        0.0
    } else {
        100.0 * sifted_errors as f64 / sifted.len() as f64
    };

    // Sample verification
    let disclosure = receiver.sample()?;
    let verification = sender.verify_sample(&disclosure)?;
    receiver.conclude(verification)?;

    info!(
        length,
        sifted = sifted.len(),
        sifted_qber,
        sample_qber = verification.qber,
        verified = verification.verified,
        "bb84 round finished"
    );

    Ok(Bb84Report {
        raw_length: length,
        received_length: transmission.qubits.len(),
        sifted_length: sifted.len(),
        sifted_errors,
        sifted_qber,
        channel: transmission.report,
        verification,
        sender_key: sender.shared_key().map(<[bool]>::to_vec),
        receiver_key: receiver.shared_key().map(<[bool]>::to_vec),
    })
}
