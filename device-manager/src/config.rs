//! Configuration for device managers

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ManagerError;

/// Per-device manager configuration
///
/// The two delays are timing hints exposed to orchestration through
/// [`CommandHandler`](crate::CommandHandler); the manager itself never sleeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// How long the device typically needs to apply a command
    /// Default: 500 ms
    #[serde(rename = "default_command_delay_ms", with = "serde_millis")]
    pub default_command_delay: Duration,

    /// How long the device needs after power-on before it accepts commands
    /// Default: 3 seconds
    #[serde(rename = "power_on_delay_ms", with = "serde_millis")]
    pub power_on_delay: Duration,

    /// Run one refresh cycle after every adapter (re)creation
    /// Default: true
    pub refresh_on_create: bool,

    /// Id of the synthetic status command published when an adapter is destroyed
    /// Default: "Disconnected"
    pub disconnected_command_id: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_command_delay: Duration::from_millis(500),
            power_on_delay: Duration::from_secs(3),
            refresh_on_create: true,
            disconnected_command_id: "Disconnected".to_string(),
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timings for devices that react instantly, mostly useful in tests
    pub fn immediate() -> Self {
        Self {
            default_command_delay: Duration::ZERO,
            power_on_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ManagerError> {
        if self.disconnected_command_id.trim().is_empty() {
            return Err(ManagerError::Configuration(
                "Disconnected command id must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_default_command_delay(mut self, delay: Duration) -> Self {
        self.default_command_delay = delay;
        self
    }

    pub fn with_power_on_delay(mut self, delay: Duration) -> Self {
        self.power_on_delay = delay;
        self
    }

    pub fn with_refresh_on_create(mut self, enabled: bool) -> Self {
        self.refresh_on_create = enabled;
        self
    }

    pub fn with_disconnected_command_id(mut self, id: impl Into<String>) -> Self {
        self.disconnected_command_id = id.into();
        self
    }
}

/// Serialize a `Duration` as integer milliseconds
pub mod serde_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serialize an optional `Duration` as integer milliseconds
pub mod serde_millis_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.default_command_delay, Duration::from_millis(500));
        assert_eq!(config.power_on_delay, Duration::from_secs(3));
        assert!(config.refresh_on_create);
        assert!(config.validate().is_ok());
    }

    #[rstest::rstest]
    #[case("Disconnected", true)]
    #[case("Offline", true)]
    #[case("", false)]
    #[case("  ", false)]
    fn test_config_validation(#[case] disconnected: &str, #[case] valid: bool) {
        let config = ManagerConfig::default().with_disconnected_command_id(disconnected);
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ManagerConfig::new()
            .with_default_command_delay(Duration::from_millis(250))
            .with_power_on_delay(Duration::from_secs(8))
            .with_refresh_on_create(false)
            .with_disconnected_command_id("Offline");

        assert_eq!(config.default_command_delay, Duration::from_millis(250));
        assert_eq!(config.power_on_delay, Duration::from_secs(8));
        assert!(!config.refresh_on_create);
        assert_eq!(config.disconnected_command_id, "Offline");
    }

    #[test]
    fn test_json_uses_milliseconds() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{ "default_command_delay_ms": 750, "power_on_delay_ms": 10000 }"#)
                .unwrap();
        assert_eq!(config.default_command_delay, Duration::from_millis(750));
        assert_eq!(config.power_on_delay, Duration::from_secs(10));
        assert_eq!(config.disconnected_command_id, "Disconnected");

        let json = serde_json::to_value(ManagerConfig::immediate()).unwrap();
        assert_eq!(json["default_command_delay_ms"], 0);
    }
}
