//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Settings shared by every container of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ceiling on round-robin laps of the generation queue.
    pub max_generation_passes: usize,
    /// Keep dependency fields read or generated as a side effect of a request.
    pub retain_dependencies: bool,
    /// Reject backend arrays whose length disagrees with the selection.
    pub check_lengths: bool,
}

impl EngineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.max_generation_passes == 0 {
            return Err(Error::InvalidConfig(
                "max_generation_passes must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json_str(&source)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_generation_passes: 64,
            retain_dependencies: false,
            check_lengths: true,
        }
    }
}
