//! Identity types for configured devices

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key identifying one configured device
///
/// Used by the connection registry to resolve a device's command handler and
/// feedback provider, so device logic can address another device without a
/// direct reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceKey(String);

impl DeviceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceKey {
    fn from(s: &str) -> Self {
        DeviceKey::new(s)
    }
}

impl From<String> for DeviceKey {
    fn from(s: String) -> Self {
        DeviceKey::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_key_display() {
        let key = DeviceKey::new("Avr");
        assert_eq!(key.to_string(), "Avr");
        assert_eq!(key.as_str(), "Avr");
    }

    #[test]
    fn test_device_key_from() {
        let a: DeviceKey = "Tv".into();
        let b: DeviceKey = String::from("Tv").into();
        assert_eq!(a, b);
    }

    #[test]
    fn test_device_key_serializes_as_plain_string() {
        let key = DeviceKey::new("Shield");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"Shield\"");

        let parsed: DeviceKey = serde_json::from_str("\"Shield\"").unwrap();
        assert_eq!(parsed, key);
    }
}
