//! Process-wide noise configuration.
//!
//! Every channel transmission reads one immutable [`NoiseConfig`] snapshot.
//! [`NoiseSettings::update`] validates a new snapshot and swaps it in whole, so a
//! running pipeline never sees a mix of old and new values.

use crate::errors::ProtocolError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

pub const DEFAULT_T1_US: f64 = 50.0;
pub const DEFAULT_T2_US: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoiseConfig {
    /// Intercept-resend eavesdropper on every qubit.
    pub eve_active: bool,
    /// Probability of flipping each descriptor's classical bit in transit.
    pub network_noise_rate: f64,
    /// Depolarizing probability applied by the oracle per gate.
    pub channel_noise_rate: f64,
    /// Energy relaxation time T1 in microseconds.
    pub t1: f64,
    /// Dephasing time T2 in microseconds, at most `2 * t1`.
    pub t2: f64,
    /// Probability of dropping each descriptor in transit.
    pub packet_loss_rate: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            eve_active: false,
            network_noise_rate: 0.0,
            channel_noise_rate: 0.0,
            t1: DEFAULT_T1_US,
            t2: DEFAULT_T2_US,
            packet_loss_rate: 0.0,
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseUpdate {
    pub eve_active: Option<bool>,
    pub network_noise_rate: Option<f64>,
    pub channel_noise_rate: Option<f64>,
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub packet_loss_rate: Option<f64>,
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ProtocolError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ProtocolError::InvalidRate { name, value });
    }
    Ok(())
}

impl NoiseConfig {
    /// The ideal channel: no eavesdropper, no loss, no noise.
    pub fn ideal() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_rate("networkNoiseRate", self.network_noise_rate)?;
        check_rate("channelNoiseRate", self.channel_noise_rate)?;
        check_rate("packetLossRate", self.packet_loss_rate)?;

        if !(self.t1 > 0.0 && self.t2 > 0.0 && self.t2 <= 2.0 * self.t1) {
            return Err(ProtocolError::InvalidThermal {
                t1: self.t1,
                t2: self.t2,
            });
        }
        Ok(())
    }

    /// Returns a new validated snapshot with `update` applied.
    pub fn apply_update(&self, update: &NoiseUpdate) -> Result<NoiseConfig, ProtocolError> {
        let next = NoiseConfig {
            eve_active: update.eve_active.unwrap_or(self.eve_active),
            network_noise_rate: update.network_noise_rate.unwrap_or(self.network_noise_rate),
            channel_noise_rate: update.channel_noise_rate.unwrap_or(self.channel_noise_rate),
            t1: update.t1.unwrap_or(self.t1),
            t2: update.t2.unwrap_or(self.t2),
            packet_loss_rate: update.packet_loss_rate.unwrap_or(self.packet_loss_rate),
        };
        next.validate()?;
        Ok(next)
    }

    pub fn from_json_str(raw: &str) -> Result<NoiseConfig, ProtocolError> {
        let config: NoiseConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<NoiseConfig, ProtocolError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Shared holder of the current [`NoiseConfig`] snapshot.
#[derive(Debug, Default)]
pub struct NoiseSettings {
    current: RwLock<Arc<NoiseConfig>>,
}

impl NoiseSettings {
    pub fn new(config: NoiseConfig) -> Result<Self, ProtocolError> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// The snapshot in effect right now.
    pub fn snapshot(&self) -> Arc<NoiseConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies a partial update and swaps in the resulting snapshot.
    pub fn update(&self, update: &NoiseUpdate) -> Result<Arc<NoiseConfig>, ProtocolError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(guard.apply_update(update)?);
        *guard = next.clone();
        info!(config = ?next, "noise configuration updated");
        Ok(next)
    }

    /// Replaces the whole configuration.
    pub fn replace(&self, config: NoiseConfig) -> Result<Arc<NoiseConfig>, ProtocolError> {
        config.validate()?;
        let next = Arc::new(config);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        info!(config = ?next, "noise configuration replaced");
        Ok(next)
    }
}
