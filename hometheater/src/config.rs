//! System configuration file
//!
//! ```json
//! {
//!   "manager": { "default_command_delay_ms": 500, "power_on_delay_ms": 3000 },
//!   "devices": [
//!     { "key": "Avr", "power_on_delay_ms": 8000 },
//!     { "key": "Projector", "enabled": false }
//!   ],
//!   "orchestrator": { "avr": "Avr", "tv": "Tv", "sources": [] }
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use device_manager::config::serde_millis_opt;
use device_manager::ManagerConfig;
use device_model::DeviceKey;
use macro_orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SystemError};

/// One configured device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub key: DeviceKey,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(
        rename = "default_command_delay_ms",
        with = "serde_millis_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_command_delay: Option<Duration>,

    #[serde(
        rename = "power_on_delay_ms",
        with = "serde_millis_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub power_on_delay: Option<Duration>,
}

fn default_enabled() -> bool {
    true
}

impl DeviceConfig {
    pub fn new(key: impl Into<DeviceKey>) -> Self {
        Self {
            key: key.into(),
            enabled: true,
            default_command_delay: None,
            power_on_delay: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_default_command_delay(mut self, delay: Duration) -> Self {
        self.default_command_delay = Some(delay);
        self
    }

    pub fn with_power_on_delay(mut self, delay: Duration) -> Self {
        self.power_on_delay = Some(delay);
        self
    }

    /// The shared manager defaults with this device's overrides applied
    pub fn manager_config(&self, base: &ManagerConfig) -> ManagerConfig {
        let mut config = base.clone();
        if let Some(delay) = self.default_command_delay {
            config.default_command_delay = delay;
        }
        if let Some(delay) = self.power_on_delay {
            config.power_on_delay = delay;
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Defaults for every device manager
    pub manager: ManagerConfig,

    pub devices: Vec<DeviceConfig>,

    /// Macro orchestration; no orchestrator device when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<OrchestratorConfig>,

    /// Device key the orchestrator is registered under
    /// Default: "GlobalMacros"
    pub orchestrator_key: DeviceKey,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            devices: Vec::new(),
            orchestrator: None,
            orchestrator_key: DeviceKey::new("GlobalMacros"),
        }
    }
}

impl SystemConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: SystemConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::debug!(
            "Loaded {} devices from {}",
            config.devices.len(),
            path.display()
        );
        Ok(config)
    }

    /// Load `<config dir>/hometheater/config.json`, or defaults if it does not exist
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()
            .ok_or_else(|| SystemError::Config("No configuration directory".to_string()))?;

        if !path.exists() {
            tracing::info!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load(path)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hometheater").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        self.manager
            .validate()
            .map_err(|e| SystemError::Config(e.to_string()))?;

        let mut keys = HashSet::new();
        for device in &self.devices {
            if device.key.as_str().is_empty() {
                return Err(SystemError::Config("Device key must not be empty".to_string()));
            }
            if !keys.insert(&device.key) {
                return Err(SystemError::Config(format!(
                    "Duplicate device key '{}'",
                    device.key
                )));
            }
        }

        if let Some(orchestrator) = &self.orchestrator {
            if keys.contains(&self.orchestrator_key) {
                return Err(SystemError::Config(format!(
                    "Orchestrator key '{}' collides with a device",
                    self.orchestrator_key
                )));
            }
            orchestrator.validate()?;
        }

        Ok(())
    }

    pub fn device(&self, key: &DeviceKey) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| &d.key == key)
    }

    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.devices.push(device);
        self
    }

    pub fn with_manager(mut self, manager: ManagerConfig) -> Self {
        self.manager = manager;
        self
    }

    pub fn with_orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn with_orchestrator_key(mut self, key: impl Into<DeviceKey>) -> Self {
        self.orchestrator_key = key.into();
        self
    }
}
