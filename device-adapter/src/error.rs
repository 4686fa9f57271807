//! Error types for device adapters

use device_model::ModelError;

/// Errors an adapter raises while executing commands
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// The command id is not in the adapter's registry
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// The feedback id is not in the adapter's registry
    #[error("Feedback not found: {0}")]
    FeedbackNotFound(String),

    /// The feedback exists but the host may not set it
    #[error("Feedback is not settable: {0}")]
    NotSettable(String),

    /// The pre-connect liveness probe failed
    #[error("Device {device} is powered off: {reason}")]
    DevicePoweredOff { device: String, reason: String },

    /// The device rejected a command with an explicit protocol error
    #[error("Device protocol error: {0}")]
    DeviceProtocolError(String),

    /// The transport failed after the device was reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// A value did not fit the registry
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl AdapterError {
    /// True if the adapter's connection should be recreated before the next command
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AdapterError::DevicePoweredOff { .. }
                | AdapterError::DeviceProtocolError(_)
                | AdapterError::Connection(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdapterError::Cancelled)
    }
}

impl From<std::io::Error> for AdapterError {
    fn from(err: std::io::Error) -> Self {
        AdapterError::Connection(err.to_string())
    }
}

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AdapterError::DevicePoweredOff { device: "Tv".into(), reason: "refused".into() }, true)]
    #[case(AdapterError::DeviceProtocolError("bad frame".into()), true)]
    #[case(AdapterError::Connection("reset".into()), true)]
    #[case(AdapterError::CommandNotFound("Eject".into()), false)]
    #[case(AdapterError::NotSettable("Power".into()), false)]
    #[case(AdapterError::Cancelled, false)]
    fn test_connection_errors(#[case] error: AdapterError, #[case] expected: bool) {
        assert_eq!(error.is_connection_error(), expected);
    }

    #[test]
    fn test_display() {
        let error = AdapterError::DevicePoweredOff {
            device: "Avr".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Device Avr is powered off: connection refused"
        );
        assert_eq!(AdapterError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let error: AdapterError = io.into();
        assert!(error.is_connection_error());
    }
}
