//! The device adapter contract

use async_trait::async_trait;
use device_model::{Command, DeviceRegistry, Feedback, FeedbackValue};
use tokio_util::sync::CancellationToken;

use crate::error::{AdapterError, Result};
use crate::events::EventSink;

/// One device's control surface, executed against a single wire protocol
///
/// Exactly one adapter instance is live per manager at a time, and the manager
/// calls the `&mut self` methods under its execution gate, so implementations
/// need not be internally thread-safe.
///
/// State changes observed while executing are raised synchronously through the
/// [`EventSink`] the adapter was created with.
///
/// # Example
///
/// ```rust,ignore
/// struct ProjectorAdapter {
///     registry: DeviceRegistry,
///     sink: EventSink,
///     socket: Option<TcpStream>,
/// }
///
/// #[async_trait]
/// impl DeviceAdapter for ProjectorAdapter {
///     fn registry(&self) -> &DeviceRegistry { &self.registry }
///     fn is_connected(&self) -> bool { self.socket.is_some() }
///     fn invalid_state(&self) -> bool { false }
///
///     async fn execute_command(&mut self, command: &Command, _cancel: &CancellationToken) -> Result<()> {
///         let socket = self.connect().await?;
///         socket.write_all(command.payload().unwrap_or_default().as_bytes()).await?;
///         Ok(())
///     }
///
///     async fn refresh(&mut self, cancel: &CancellationToken) -> Result<()> {
///         self.query_power(cancel).await
///     }
/// }
/// ```
#[async_trait]
pub trait DeviceAdapter: Send {
    /// Registered commands and feedback, in registration order
    fn registry(&self) -> &DeviceRegistry;

    fn commands(&self) -> &[Command] {
        self.registry().commands()
    }

    fn feedbacks(&self) -> &[Feedback] {
        self.registry().feedbacks()
    }

    /// Whether the adapter currently holds a live connection
    fn is_connected(&self) -> bool;

    /// True if the connection is known dead and the adapter must be torn down
    /// before the next command
    fn invalid_state(&self) -> bool;

    /// Run one command to completion
    ///
    /// Implementations acquire their connection lazily and re-establish it
    /// whenever it is not connected.
    async fn execute_command(&mut self, command: &Command, cancel: &CancellationToken)
        -> Result<()>;

    /// Push a host-set value for a settable feedback
    async fn set_feedback(
        &mut self,
        value: &FeedbackValue,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Err(AdapterError::NotSettable(value.id().to_string()))
    }

    /// Issue whatever queries re-synchronize all feedback from the live device
    async fn refresh(&mut self, cancel: &CancellationToken) -> Result<()>;

    /// Release the connection; called once before the adapter is dropped
    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Creates adapter instances for a manager
///
/// Called on first use and after every invalidation. The sink is wired to the
/// manager's event queues and must be kept by the adapter for raising changes.
pub trait AdapterFactory: Send + Sync {
    fn create(&self, sink: EventSink) -> Result<Box<dyn DeviceAdapter>>;
}

impl<F> AdapterFactory for F
where
    F: Fn(EventSink) -> Result<Box<dyn DeviceAdapter>> + Send + Sync,
{
    fn create(&self, sink: EventSink) -> Result<Box<dyn DeviceAdapter>> {
        self(sink)
    }
}
