//! Registry configuration
//!
//! Configuration can come from code (builder style), a TOML file, or
//! environment variable overrides, and is validated before use.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DevMgrError, Result};

/// Default hard cap on registrable devices
pub const DEFAULT_MAX_DEVICES: usize = 32;

/// Environment variable overriding the device cap
pub const MAX_DEVICES_ENV: &str = "ACCEL_MAX_DEVICES";

/// Configuration for a [`DeviceRegistry`](crate::DeviceRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevMgrConfig {
    /// Maximum number of devices the table accepts; registration fails
    /// closed above this bound
    pub max_devices: usize,
}

impl Default for DevMgrConfig {
    fn default() -> Self {
        Self {
            max_devices: DEFAULT_MAX_DEVICES,
        }
    }
}

impl DevMgrConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device cap
    pub fn with_max_devices(mut self, max: usize) -> Self {
        self.max_devices = max;
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw).map_err(|e| DevMgrError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(raw) = std::env::var(MAX_DEVICES_ENV) {
            self.max_devices = raw.parse().map_err(|_| {
                DevMgrError::InvalidConfig(format!("{MAX_DEVICES_ENV}: invalid value {raw:?}"))
            })?;
        }
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_devices == 0 {
            return Err(DevMgrError::InvalidConfig(
                "max_devices must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
