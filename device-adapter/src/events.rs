//! Adapter-raised change events
//!
//! Adapters never publish to the host directly. They push onto two unbounded,
//! order-preserving queues owned by their manager, one for commands and one for
//! feedback, and the manager's background loops drain them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use device_model::{Command, DeviceRegistry, FeedbackValue, Value};
use tokio::sync::mpsc;

use crate::error::Result;

/// Sending half handed to each adapter instance
///
/// Cloning is cheap. Every adapter created by the same manager shares the same
/// queues and the same raised-feedback counter.
#[derive(Debug, Clone)]
pub struct EventSink {
    commands: mpsc::UnboundedSender<Command>,
    feedback: mpsc::UnboundedSender<FeedbackValue>,
    raised_feedback: Arc<AtomicU64>,
}

/// Receiving halves, owned by the manager's drain loops
#[derive(Debug)]
pub struct EventReceivers {
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub feedback: mpsc::UnboundedReceiver<FeedbackValue>,
}

/// Create a connected sink and receiver pair
pub fn event_channel() -> (EventSink, EventReceivers) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();

    let sink = EventSink {
        commands: command_tx,
        feedback: feedback_tx,
        raised_feedback: Arc::new(AtomicU64::new(0)),
    };
    let receivers = EventReceivers {
        commands: command_rx,
        feedback: feedback_rx,
    };
    (sink, receivers)
}

impl EventSink {
    /// Raise a command change (e.g. a status command reflecting a new state)
    pub fn raise_command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Command queue closed, dropping raised command");
        }
    }

    /// Raise a feedback change
    pub fn raise_feedback(&self, value: FeedbackValue) {
        match self.feedback.send(value) {
            Ok(()) => {
                self.raised_feedback.fetch_add(1, Ordering::SeqCst);
            }
            Err(_) => tracing::debug!("Feedback queue closed, dropping raised feedback"),
        }
    }

    /// Build a feedback snapshot from the registry and raise it
    pub fn update_feedback(&self, registry: &DeviceRegistry, id: &str, value: Value) -> Result<()> {
        let snapshot = registry.feedback_value(id, value)?;
        self.raise_feedback(snapshot);
        Ok(())
    }

    /// Number of feedback items successfully queued through any clone of this sink
    pub fn raised_feedback_count(&self) -> u64 {
        self.raised_feedback.load(Ordering::SeqCst)
    }

    /// True once the receiving side has been dropped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed() && self.feedback.is_closed()
    }
}
