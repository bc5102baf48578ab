use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;

use crate::global_variables::{AMQP_URL, CONFIG_ENV_VAR};
use crate::models::junction::JunctionId;

/// Phase durations, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTiming {
    pub yellow_secs: u32,
    pub green_secs: u32,
    pub green_emergency_secs: u32,
    pub red_secs: u32,
    pub red_emergency_secs: u32,
    /// Applied to a junction by a manual phase command.
    pub manual_command_secs: u32,
    /// Applied to a junction by emergency preemption.
    pub preemption_secs: u32,
}

impl Default for PhaseTiming {
    fn default() -> Self {
        Self {
            yellow_secs: 5,
            green_secs: 30,
            green_emergency_secs: 60,
            red_secs: 25,
            red_emergency_secs: 20,
            manual_command_secs: 30,
            preemption_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationPolicy {
    /// Seconds added to the selected junction's current phase on accept.
    pub accept_extension_secs: u32,
    pub accept_replacement_delay_ms: u64,
    pub decline_replacement_delay_ms: u64,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            accept_extension_secs: 15,
            accept_replacement_delay_ms: 5000,
            decline_replacement_delay_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub phase_tick_ms: u64,
    pub metric_tick_ms: u64,
    pub timing: PhaseTiming,
    pub recommendation: RecommendationPolicy,
    pub initial_junction: JunctionId,
    /// Fixed seed for metric noise; drawn from the OS when absent.
    pub noise_seed: Option<u64>,
    pub amqp_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            phase_tick_ms: 1000,
            metric_tick_ms: 3000,
            timing: PhaseTiming::default(),
            recommendation: RecommendationPolicy::default(),
            initial_junction: JunctionId::new("anna-salai-mount"),
            noise_seed: None,
            amqp_url: AMQP_URL.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Reads the file named by `JUNCTION_CONTROL_CONFIG`, or falls back to defaults.
    pub fn load() -> Result<Self, Box<dyn Error>> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => {
                log::info!("Loading engine config from {}", path);
                Self::from_file(path)
            }
            Err(_) => Ok(Self::default()),
        }
    }
}
