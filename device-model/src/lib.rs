//! # Device Model
//!
//! Immutable value types describing what a home-theater device can do and what
//! it can report:
//!
//! - [`Command`] - a controllable action, dispatched by its stable string id
//! - [`Feedback`] - an observable state channel (bool, double or text)
//! - [`FeedbackValue`] - a snapshot pairing a feedback with an observed value
//! - [`DeviceRegistry`] - one adapter's ordered command and feedback registries
//!
//! Command and feedback ids are the identity space shared with the host: they
//! are used as dictionary keys and as host-visible labels, so renaming one
//! breaks persisted host-side associations.
//!
//! ```rust
//! use device_model::{Command, DeviceRegistry, Feedback, Value};
//!
//! let mut registry = DeviceRegistry::new();
//! registry
//!     .command(Command::new("On").with_fixed_status_value(1))?
//!     .command(Command::new("Off").with_fixed_status_value(2))?
//!     .feedback(Feedback::bool("Power"))?;
//!
//! let power = registry.feedback_value("Power", Value::Bool(true))?;
//! assert_eq!(power.value(), &Value::Bool(true));
//! # Ok::<(), device_model::ModelError>(())
//! ```

pub mod command;
pub mod error;
pub mod feedback;
pub mod id_types;
pub mod registry;
pub mod value;

pub use command::{Command, CommandKind};
pub use error::{ModelError, Result};
pub use feedback::{Feedback, FeedbackRange, FeedbackValue};
pub use id_types::DeviceKey;
pub use registry::DeviceRegistry;
pub use value::{Value, ValueKind};
