// Transport configuration
// Parsed from RON or JSON text handed over by the host application

use crate::sequencer::tempo_map::{MAX_BPM, MIN_BPM};
use serde::{Deserialize, Serialize};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What the transport does when the position reaches the end of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndPolicy {
    /// Halt and emit `Stop`
    #[default]
    Stop,
    /// Wrap back to tick 0 and keep playing
    Loop,
}

/// Playback scheduling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How far ahead of the host clock notes are handed to players
    pub lookahead_ms: u64,
    /// Period of the coarse scheduling timer
    pub schedule_interval_ms: u64,
    /// Tempo assumed where the flow has no tempo event yet
    pub fallback_bpm: f64,
    pub end_policy: EndPolicy,
}

impl TransportConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookahead_ms == 0 {
            return Err(ConfigError::Invalid("lookahead_ms must be > 0".to_string()));
        }
        if self.schedule_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "schedule_interval_ms must be > 0".to_string(),
            ));
        }
        // A pass must cover at least the gap until the next pass
        if self.schedule_interval_ms > self.lookahead_ms {
            return Err(ConfigError::Invalid(format!(
                "schedule_interval_ms ({}) exceeds lookahead_ms ({})",
                self.schedule_interval_ms, self.lookahead_ms
            )));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.fallback_bpm) {
            return Err(ConfigError::Invalid(format!(
                "fallback_bpm must be between {} and {}",
                MIN_BPM, MAX_BPM
            )));
        }
        Ok(())
    }

    /// Lookahead window in seconds
    pub fn lookahead_seconds(&self) -> f64 {
        self.lookahead_ms as f64 / 1000.0
    }

    /// Scheduling timer period
    pub fn schedule_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.schedule_interval_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 100,
            schedule_interval_ms: 25,
            fallback_bpm: 120.0,
            end_policy: EndPolicy::Stop,
        }
    }
}
