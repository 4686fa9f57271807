//! The interface toward the home-automation host
//!
//! The host owns a per-device tree of commands and feedback. Managers register
//! each freshly created adapter's surface and then push every raised change
//! through the returned [`RootHandle`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use device_model::{Command, DeviceKey, Feedback, FeedbackValue};

use crate::error::PublishError;

/// Opaque handle to the host-side tree registered for one adapter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootHandle(u64);

impl RootHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RootHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root-{}", self.0)
    }
}

#[async_trait]
pub trait HostPublisher: Send + Sync {
    /// Register a device's commands and feedback, returning the root to publish under
    async fn register_device(
        &self,
        key: &DeviceKey,
        commands: &[Command],
        feedbacks: &[Feedback],
    ) -> Result<RootHandle, PublishError>;

    async fn publish_command(&self, root: RootHandle, command: &Command)
        -> Result<(), PublishError>;

    async fn publish_feedback(
        &self,
        root: RootHandle,
        value: &FeedbackValue,
    ) -> Result<(), PublishError>;
}

/// Publisher that accepts everything and hands out sequential roots
#[derive(Debug, Default)]
pub struct NullPublisher {
    next_root: AtomicU64,
}

impl NullPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HostPublisher for NullPublisher {
    async fn register_device(
        &self,
        key: &DeviceKey,
        _commands: &[Command],
        _feedbacks: &[Feedback],
    ) -> Result<RootHandle, PublishError> {
        let root = RootHandle::new(self.next_root.fetch_add(1, Ordering::SeqCst));
        tracing::trace!("Registered {} as {}", key, root);
        Ok(root)
    }

    async fn publish_command(&self, _root: RootHandle, _command: &Command) -> Result<(), PublishError> {
        Ok(())
    }

    async fn publish_feedback(
        &self,
        _root: RootHandle,
        _value: &FeedbackValue,
    ) -> Result<(), PublishError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use recording::{RecordingPublisher, Registration};

#[cfg(any(test, feature = "test-support"))]
mod recording {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use device_model::{Command, DeviceKey, Feedback, FeedbackValue, Value};
    use parking_lot::Mutex;

    use super::{HostPublisher, RootHandle};
    use crate::error::PublishError;

    /// One `register_device` call as seen by the host
    #[derive(Debug, Clone)]
    pub struct Registration {
        pub key: DeviceKey,
        pub root: RootHandle,
        pub command_ids: Vec<String>,
        pub feedback_ids: Vec<String>,
    }

    /// Publisher that records everything it receives, for assertions in tests
    #[derive(Debug, Default)]
    pub struct RecordingPublisher {
        next_root: AtomicU64,
        fail_feedback: AtomicBool,
        registrations: Mutex<Vec<Registration>>,
        commands: Mutex<Vec<(RootHandle, String)>>,
        feedback: Mutex<Vec<(RootHandle, String, Value)>>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent `publish_feedback` call fail
        pub fn set_fail_feedback(&self, fail: bool) {
            self.fail_feedback.store(fail, Ordering::SeqCst);
        }

        pub fn registrations(&self) -> Vec<Registration> {
            self.registrations.lock().clone()
        }

        pub fn commands(&self) -> Vec<(RootHandle, String)> {
            self.commands.lock().clone()
        }

        pub fn command_ids(&self) -> Vec<String> {
            self.commands.lock().iter().map(|(_, id)| id.clone()).collect()
        }

        pub fn feedback(&self) -> Vec<(RootHandle, String, Value)> {
            self.feedback.lock().clone()
        }

        /// Values published for one feedback id, in publish order
        pub fn feedback_values(&self, feedback_id: &str) -> Vec<Value> {
            self.feedback
                .lock()
                .iter()
                .filter(|(_, id, _)| id == feedback_id)
                .map(|(_, _, value)| value.clone())
                .collect()
        }

        /// Poll until at least `count` commands have been published
        pub async fn wait_for_commands(&self, count: usize, timeout: Duration) -> bool {
            self.wait_until(timeout, || self.commands.lock().len() >= count).await
        }

        /// Poll until at least `count` feedback values have been published
        pub async fn wait_for_feedback(&self, count: usize, timeout: Duration) -> bool {
            self.wait_until(timeout, || self.feedback.lock().len() >= count).await
        }

        async fn wait_until(&self, timeout: Duration, condition: impl Fn() -> bool) -> bool {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if condition() {
                    return true;
                }
                if tokio::time::Instant::now() >= deadline {
                    return false;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }

    #[async_trait]
    impl HostPublisher for RecordingPublisher {
        async fn register_device(
            &self,
            key: &DeviceKey,
            commands: &[Command],
            feedbacks: &[Feedback],
        ) -> Result<RootHandle, PublishError> {
            let root = RootHandle::new(self.next_root.fetch_add(1, Ordering::SeqCst));
            self.registrations.lock().push(Registration {
                key: key.clone(),
                root,
                command_ids: commands.iter().map(|c| c.id().to_string()).collect(),
                feedback_ids: feedbacks.iter().map(|f| f.id().to_string()).collect(),
            });
            Ok(root)
        }

        async fn publish_command(
            &self,
            root: RootHandle,
            command: &Command,
        ) -> Result<(), PublishError> {
            self.commands.lock().push((root, command.id().to_string()));
            Ok(())
        }

        async fn publish_feedback(
            &self,
            root: RootHandle,
            value: &FeedbackValue,
        ) -> Result<(), PublishError> {
            if self.fail_feedback.load(Ordering::SeqCst) {
                return Err(PublishError(format!("rejected {}", value.id())));
            }
            self.feedback
                .lock()
                .push((root, value.id().to_string(), value.value().clone()));
            Ok(())
        }
    }
}
