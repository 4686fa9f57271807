//! # Device Manager
//!
//! Owns one device adapter's lifecycle and exposes the host-visible command and
//! feedback API with correct serialization.
//!
//! ## Overview
//!
//! - [`DeviceManager`] - lazy adapter creation, recreation on invalidation,
//!   at most one in-flight command per device, and two background loops that
//!   drain adapter-raised commands and feedback to the host
//! - [`HostPublisher`] - the narrow interface toward the home-automation host
//! - [`ConnectionRegistry`] - resolves a [`DeviceKey`] to a device's
//!   [`CommandHandler`] and [`FeedbackProvider`] capabilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use device_manager::{DeviceManager, ManagerConfig, NullPublisher};
//!
//! let shutdown = CancellationToken::new();
//! let manager = Arc::new(DeviceManager::new(
//!     DeviceKey::new("Avr"),
//!     ManagerConfig::default(),
//!     Arc::new(AvrFactory::new(addr)),
//!     Arc::new(NullPublisher::new()),
//!     &shutdown,
//! ));
//! manager.start()?;
//!
//! manager.handle_command("PowerOn", &CancellationToken::new()).await?;
//! let power = manager.feedback_value("Power");
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod manager;
pub mod registry;
mod worker;

pub use config::ManagerConfig;
pub use error::{ManagerError, PublishError, RegistryError, Result};
pub use host::{HostPublisher, NullPublisher, RootHandle};
pub use manager::DeviceManager;
pub use registry::{CommandHandler, ConnectionRegistry, FeedbackProvider};

#[cfg(any(test, feature = "test-support"))]
pub use host::{RecordingPublisher, Registration};

pub use device_adapter::CancellationToken;
pub use device_model::{DeviceKey, Value};
