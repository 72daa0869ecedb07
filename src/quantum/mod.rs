//! Single-qubit density-matrix simulation backing the measurement oracle.

mod channels;
pub mod errors;
mod gates;
mod measurements;
mod state;
pub mod utils;

pub use channels::NoiseChannel;
pub use gates::Gate;
pub use measurements::Measurement;
pub use state::QubitState;
