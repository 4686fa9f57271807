//! # Device Adapter
//!
//! The contract every home-theater device adapter honors, regardless of the
//! wire protocol behind it (raw sockets, shell-over-ADB, SOAP, REST).
//!
//! An adapter owns one device's command/feedback registry, executes commands
//! against the wire, and raises state changes through an [`EventSink`] that
//! its owning manager drains. Adapters are created by an [`AdapterFactory`]
//! on first use and recreated whenever they report an invalid state.
//!
//! Also provided here:
//!
//! - [`OutOfOrderCommandDetector`] / [`OutOfOrderFilter`] - suppression of a
//!   key-down that arrives after its paired key-up
//! - [`probe::tcp_probe`] - the pre-connect liveness probe
//! - `testing` (feature `test-support`) - a scripted in-memory adapter

pub mod adapter;
pub mod error;
pub mod events;
pub mod out_of_order;
pub mod probe;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use adapter::{AdapterFactory, DeviceAdapter};
pub use error::{AdapterError, Result};
pub use events::{event_channel, EventReceivers, EventSink};
pub use out_of_order::{OutOfOrderCommandDetector, OutOfOrderFilter};

pub use device_model::{
    Command, CommandKind, DeviceKey, DeviceRegistry, Feedback, FeedbackValue, ModelError, Value,
    ValueKind,
};
pub use tokio_util::sync::CancellationToken;
