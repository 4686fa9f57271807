use device_manager::{ManagerError, RegistryError};
use device_model::DeviceKey;
use macro_orchestrator::OrchestratorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceKey),

    #[error("No adapter factory registered for {0}")]
    MissingAdapter(DeviceKey),
}

impl From<OrchestratorError> for SystemError {
    fn from(error: OrchestratorError) -> Self {
        SystemError::Config(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SystemError>;
