//! # Home Theater
//!
//! Device-control dispatch and multi-device orchestration for a home theater.
//!
//! Each configured device gets a [`DeviceManager`] that serializes commands
//! against one [`DeviceAdapter`] and publishes the adapter's feedback to the
//! host. A [`MacroOrchestrator`] registered as one more device sequences
//! commands across several devices: full-system power on and off, input
//! switching, lighting sync, and game mode.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hometheater::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SystemError> {
//!     hometheater::logging::init_logging_from_env().ok();
//!
//!     let system = HomeTheaterSystem::builder()
//!         .with_config(SystemConfig::load_default()?)
//!         .with_adapter("Avr", AvrFactory::new(avr_addr))
//!         .build()?;
//!
//!     let cancel = CancellationToken::new();
//!     system.invoke(&DeviceKey::new("Avr"), "Zone1PowerOn", &cancel).await?;
//!
//!     system.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! [`DeviceManager`]: device_manager::DeviceManager
//! [`DeviceAdapter`]: device_adapter::DeviceAdapter
//! [`MacroOrchestrator`]: macro_orchestrator::MacroOrchestrator

pub mod config;
pub mod error;
pub mod logging;
pub mod system;

pub use config::{DeviceConfig, SystemConfig};
pub use error::{Result, SystemError};
pub use system::{HomeTheaterSystem, HomeTheaterSystemBuilder};

pub use device_adapter;
pub use device_manager;
pub use device_model;
pub use macro_orchestrator;

pub mod prelude {
    pub use crate::config::{DeviceConfig, SystemConfig};
    pub use crate::error::SystemError;
    pub use crate::system::HomeTheaterSystem;

    pub use device_adapter::{
        AdapterError, AdapterFactory, CancellationToken, DeviceAdapter, EventSink,
    };
    pub use device_manager::{
        CommandHandler, ConnectionRegistry, DeviceManager, FeedbackProvider, HostPublisher,
        ManagerConfig, RootHandle,
    };
    pub use device_model::{
        Command, CommandKind, DeviceKey, DeviceRegistry, Feedback, FeedbackValue, Value,
    };
    pub use macro_orchestrator::{
        ConvergencePolicy, MacroState, OrchestratorConfig, SourceDevice, StepOutcome,
    };
}
