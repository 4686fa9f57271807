//! Error types for device managers and the connection registry

use device_adapter::AdapterError;
use device_model::{DeviceKey, ModelError};
use thiserror::Error;

/// Errors surfaced by [`DeviceManager`](crate::DeviceManager) operations
#[derive(Error, Debug, Clone)]
pub enum ManagerError {
    /// The adapter failed or rejected the request
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// A feedback value did not fit its definition
    #[error("Invalid value: {0}")]
    Model(#[from] ModelError),

    /// The host rejected a registration
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The manager has been cancelled or shut down
    #[error("Device manager is not running")]
    NotRunning,

    /// The caller cancelled the request
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ManagerError {
    /// True for every flavor of cancellation, which is never logged as an error
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ManagerError::Cancelled
                | ManagerError::NotRunning
                | ManagerError::Adapter(AdapterError::Cancelled)
        )
    }

    /// True if the request referenced an id the device does not have
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ManagerError::Adapter(AdapterError::CommandNotFound(_))
                | ManagerError::Adapter(AdapterError::FeedbackNotFound(_))
        )
    }
}

/// A host-side publish or registration failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Host publish failed: {0}")]
pub struct PublishError(pub String);

/// Errors from [`ConnectionRegistry`](crate::ConnectionRegistry) lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The device is not configured, or is disabled
    #[error("Device not found: {0}")]
    NotFound(DeviceKey),
}

/// Result type for manager operations
pub type Result<T> = std::result::Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_flavors() {
        assert!(ManagerError::Cancelled.is_cancelled());
        assert!(ManagerError::NotRunning.is_cancelled());
        assert!(ManagerError::Adapter(AdapterError::Cancelled).is_cancelled());
        assert!(!ManagerError::Adapter(AdapterError::Connection("reset".into())).is_cancelled());
    }

    #[test]
    fn test_not_found() {
        let error: ManagerError = AdapterError::CommandNotFound("Eject".to_string()).into();
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "Adapter error: Command not found: Eject");
    }

    #[test]
    fn test_registry_error_display() {
        let error = RegistryError::NotFound(DeviceKey::new("Projector"));
        assert_eq!(error.to_string(), "Device not found: Projector");
    }

    #[test]
    fn test_publish_error_is_transparent() {
        let error: ManagerError = PublishError("tree locked".to_string()).into();
        assert_eq!(error.to_string(), "Host publish failed: tree locked");
    }
}
