//! Background drain loops
//!
//! Each manager runs two tasks: one forwards adapter-raised commands to the
//! host, the other updates the feedback cache and forwards feedback. A failure
//! on one item is logged and never stops the loop.

use std::sync::Arc;

use dashmap::DashMap;
use device_model::{Command, DeviceKey, FeedbackValue, Value};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::host::{HostPublisher, RootHandle};

/// State shared between a manager and its drain loops
pub(crate) struct PublishContext {
    pub key: DeviceKey,
    pub publisher: Arc<dyn HostPublisher>,
    pub root: RwLock<Option<RootHandle>>,
    pub feedback_values: DashMap<String, Value>,
    /// Count of feedback items fully processed by the feedback drain
    pub processed_feedback: watch::Sender<u64>,
}

impl PublishContext {
    pub fn new(key: DeviceKey, publisher: Arc<dyn HostPublisher>) -> Self {
        let (processed_feedback, _) = watch::channel(0);
        Self {
            key,
            publisher,
            root: RwLock::new(None),
            feedback_values: DashMap::new(),
            processed_feedback,
        }
    }

    pub fn root(&self) -> Option<RootHandle> {
        *self.root.read()
    }

    pub async fn publish_command(&self, command: &Command) {
        let Some(root) = self.root() else {
            tracing::debug!("{}: no host root yet, dropping command {}", self.key, command.id());
            return;
        };

        if let Err(e) = self.publisher.publish_command(root, command).await {
            tracing::warn!("{}: failed to publish command {}: {}", self.key, command.id(), e);
        }
    }

    async fn apply_feedback(&self, value: FeedbackValue) {
        self.feedback_values
            .insert(value.id().to_string(), value.value().clone());

        match self.root() {
            Some(root) => {
                if let Err(e) = self.publisher.publish_feedback(root, &value).await {
                    tracing::warn!("{}: failed to publish feedback {}: {}", self.key, value.id(), e);
                }
            }
            None => {
                tracing::debug!("{}: no host root yet, cached feedback {}", self.key, value.id());
            }
        }

        self.processed_feedback.send_modify(|count| *count += 1);
    }
}

pub(crate) fn spawn_command_drain(
    context: Arc<PublishContext>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("{}: command drain started", context.key);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = commands.recv() => match next {
                    Some(command) => context.publish_command(&command).await,
                    None => break,
                },
            }
        }

        tracing::debug!("{}: command drain stopped", context.key);
    })
}

pub(crate) fn spawn_feedback_drain(
    context: Arc<PublishContext>,
    mut feedback: mpsc::UnboundedReceiver<FeedbackValue>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("{}: feedback drain started", context.key);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = feedback.recv() => match next {
                    Some(value) => context.apply_feedback(value).await,
                    None => break,
                },
            }
        }

        tracing::debug!("{}: feedback drain stopped", context.key);
    })
}
