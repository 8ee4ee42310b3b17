use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Queue sizes used by a [`Network`](crate::Network) and its actors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Slots in each actor's inbound data queue.
    pub inbound_capacity: usize,

    /// Slots in each actor's control queue.
    pub control_capacity: usize,

    /// Slots in the shared report sink.
    pub report_capacity: usize,

    /// Slots in the shared termination sink.
    pub termination_capacity: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 128,
            control_capacity: 16,
            report_capacity: 1024,
            termination_capacity: 32,
        }
    }
}

/// Settings of the polling loop that consumes reports and terminations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Milliseconds between two ticks.
    pub tick_ms: u64,

    /// Usage subtracted from every channel on each tick.
    pub decay_step: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            decay_step: 0.02,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetConfig,
    pub runner: RunnerConfig,
}

impl Config {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&s)
    }
}
