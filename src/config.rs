//! Processor configuration

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Health domain scored by default
pub const DEFAULT_DOMAIN_NAME: &str = "diabetes";

/// Player number tracked in multi-player engagement logs by default
pub const DEFAULT_PLAYER_NR: u32 = 1;

/// Runtime settings of a [`TwinProcessor`](crate::pipeline::TwinProcessor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Health domain name stamped on health-literacy scores
    pub domain_name: String,
    /// Player whose gameplay is read from engagement logs
    pub player_nr: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            domain_name: DEFAULT_DOMAIN_NAME.to_string(),
            player_nr: DEFAULT_PLAYER_NR,
        }
    }
}

impl ProcessorConfig {
    /// Load config from JSON; omitted fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
