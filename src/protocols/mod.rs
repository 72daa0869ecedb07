//! End-to-end protocol runs.

pub mod bb84;
