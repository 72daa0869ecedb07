mod channel;
pub mod config;
pub mod errors;
mod keysource;
mod keystore;
pub mod oracle;
mod party;
pub mod protocols;
pub mod quantum;
mod qubit;
pub mod sampling;
mod session;
pub mod sifting;
pub mod wire;

pub use crate::channel::{ChannelPipeline, ChannelReport, Transmission};
pub use crate::config::{NoiseConfig, NoiseSettings, NoiseUpdate};
pub use crate::errors::ProtocolError;
pub use crate::keysource::KeySource;
pub use crate::keystore::{KeyStore, Reception, RoundReport};
pub use crate::oracle::{ChannelNoise, QuantumOracle, SimulatedOracle};
pub use crate::party::{KeyOutcome, Receiver, Sender};
pub use crate::qubit::{Basis, QubitDescriptor, TaggedQubit, bit_from_u8, encode, format_bits};
pub use crate::sampling::{KeySample, Sampler, Verification, verify};
pub use crate::session::{Role, Session, SessionState};
pub use crate::sifting::{Detection, SiftedKey, sift, sift_detections};
