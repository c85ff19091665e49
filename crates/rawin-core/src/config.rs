//! Receiver configuration.

use crate::device::DeviceScope;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Flags applied when registering a device class for raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationOptions {
    /// Receive input while the process is in the background (`RIDEV_INPUTSINK`).
    pub input_sink: bool,
    /// Suppress legacy input messages for the whole process (`RIDEV_NOLEGACY`).
    pub no_legacy: bool,
    /// Receive arrival/removal notifications (`RIDEV_DEVNOTIFY`).
    pub device_notify: bool,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            input_sink: true,
            no_legacy: false,
            device_notify: true,
        }
    }
}

/// Configuration for a [`crate::RawInputReceiver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Device classes this receiver accepts subscriptions for.
    pub scope: DeviceScope,
    /// How long disposal waits for the pump thread before abandoning it.
    pub dispose_timeout_ms: u64,
    /// Resolve metadata for every attached device at construction.
    pub prime_cache: bool,
    /// Make the process Per-Monitor DPI aware before the native receiver
    /// starts, so absolute positions scale against physical pixels.
    pub dpi_aware: bool,
    pub registration: RegistrationOptions,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            scope: DeviceScope::Both,
            dispose_timeout_ms: 5000,
            prime_cache: true,
            dpi_aware: true,
            registration: RegistrationOptions::default(),
        }
    }
}

impl ReceiverConfig {
    pub fn with_scope(scope: DeviceScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn dispose_timeout(&self) -> Duration {
        Duration::from_millis(self.dispose_timeout_ms)
    }

    /// Parse a configuration from YAML. Missing fields take their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        debug!(?path, "Loaded receiver config");
        Ok(config)
    }
}
