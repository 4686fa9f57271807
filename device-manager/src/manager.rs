//! Per-device manager: adapter lifecycle, serialized dispatch, and feedback cache

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use device_adapter::{
    event_channel, AdapterError, AdapterFactory, DeviceAdapter, EventReceivers, EventSink,
};
use device_model::{Command, CommandKind, DeviceKey, FeedbackValue, Value};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::host::{HostPublisher, RootHandle};
use crate::worker::{spawn_command_drain, spawn_feedback_drain, PublishContext};

/// The adapter slot guarded by the execution gate
#[derive(Default)]
struct AdapterSlot {
    adapter: Option<Box<dyn DeviceAdapter>>,
    /// Tear the adapter down before the next request
    recreate: bool,
    /// A refresh cycle is still owed to the current adapter
    needs_refresh: bool,
}

/// A request resolved against the live adapter's registry
enum Action {
    Command(Command),
    Feedback(FeedbackValue),
}

enum Request<'a> {
    Command(&'a str),
    Feedback(&'a str, Value),
}

/// Owns one device's adapter and serializes every request against it
///
/// Commands and host-set feedback are executed one at a time, in submission
/// order, behind a fair async mutex. The adapter is created lazily and replaced
/// whenever it reports an invalid state or a command fails with a connection
/// error. Every replacement publishes the synthetic disconnected status command.
///
/// Adapter-raised changes flow through two unbounded queues that are drained
/// by background tasks started with [`DeviceManager::start`].
pub struct DeviceManager {
    config: ManagerConfig,
    factory: Arc<dyn AdapterFactory>,
    context: Arc<PublishContext>,
    gate: Mutex<AdapterSlot>,
    sink: EventSink,
    receivers: parking_lot::Mutex<Option<EventReceivers>>,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl DeviceManager {
    /// Create a manager whose working token is a child of `shutdown`
    pub fn new(
        key: DeviceKey,
        config: ManagerConfig,
        factory: Arc<dyn AdapterFactory>,
        publisher: Arc<dyn HostPublisher>,
        shutdown: &CancellationToken,
    ) -> Self {
        let (sink, receivers) = event_channel();
        Self {
            config,
            factory,
            context: Arc::new(PublishContext::new(key, publisher)),
            gate: Mutex::new(AdapterSlot::default()),
            sink,
            receivers: parking_lot::Mutex::new(Some(receivers)),
            workers: parking_lot::Mutex::new(Vec::new()),
            cancel: shutdown.child_token(),
        }
    }

    pub fn key(&self) -> &DeviceKey {
        &self.context.key
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn default_command_delay(&self) -> Duration {
        self.config.default_command_delay
    }

    pub fn power_on_delay(&self) -> Duration {
        self.config.power_on_delay
    }

    /// The manager's working token, cancelled by [`cancel`](Self::cancel) or the parent
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start the two drain loops; must be called from within a tokio runtime
    pub fn start(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ManagerError::NotRunning);
        }

        let Some(receivers) = self.receivers.lock().take() else {
            tracing::debug!("{}: drain loops already started", self.key());
            return Ok(());
        };

        let mut workers = self.workers.lock();
        workers.push(spawn_command_drain(
            Arc::clone(&self.context),
            receivers.commands,
            self.cancel.clone(),
        ));
        workers.push(spawn_feedback_drain(
            Arc::clone(&self.context),
            receivers.feedback,
            self.cancel.clone(),
        ));

        tracing::info!("{}: device manager started", self.key());
        Ok(())
    }

    /// True once started and until cancelled
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.receivers.lock().is_none()
    }

    /// Execute a command by id
    ///
    /// Fails with `CommandNotFound` if the live adapter does not register the
    /// id. Connection errors mark the adapter for recreation and propagate.
    pub async fn handle_command(&self, command_id: &str, cancel: &CancellationToken) -> Result<()> {
        self.dispatch(Request::Command(command_id), cancel).await
    }

    /// Push a host-set value for a settable feedback
    pub async fn handle_feedback(
        &self,
        feedback_id: &str,
        value: Value,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.dispatch(Request::Feedback(feedback_id, value), cancel)
            .await
    }

    /// The last value drained for a feedback id
    pub fn feedback_value(&self, feedback_id: &str) -> Option<Value> {
        self.context
            .feedback_values
            .get(feedback_id)
            .map(|entry| entry.value().clone())
    }

    /// Snapshot of the whole feedback cache
    pub fn feedback_values(&self) -> HashMap<String, Value> {
        self.context
            .feedback_values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Wait until every feedback raised so far has reached the cache
    ///
    /// Returns immediately when the drain loops are not running.
    pub async fn synchronized(&self, cancel: &CancellationToken) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        let target = self.sink.raised_feedback_count();
        let mut processed = self.context.processed_feedback.subscribe();

        tokio::select! {
            _ = cancel.cancelled() => Err(ManagerError::Cancelled),
            _ = self.cancel.cancelled() => Err(ManagerError::NotRunning),
            result = processed.wait_for(|count| *count >= target) => {
                result.map(|_| ()).map_err(|_| ManagerError::NotRunning)
            }
        }
    }

    /// The host root of the current adapter, if one has been registered
    pub fn root_handle(&self) -> Option<RootHandle> {
        self.context.root()
    }

    /// Cancel the working token; background loops stop and in-flight work aborts
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel, wait for the drain loops, dispose the adapter, and publish disconnected
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!("{}: drain loop ended abnormally: {}", self.key(), e);
            }
        }

        let mut slot = self.gate.lock().await;
        if let Some(mut adapter) = slot.adapter.take() {
            if let Err(e) = adapter.dispose().await {
                tracing::warn!("{}: failed to dispose adapter: {}", self.key(), e);
            }
            self.context
                .publish_command(&self.disconnected_command())
                .await;
        }

        tracing::info!("{}: device manager shut down", self.key());
    }

    fn disconnected_command(&self) -> Command {
        Command::new(self.config.disconnected_command_id.as_str()).with_kind(CommandKind::Status)
    }

    async fn dispatch(&self, request: Request<'_>, cancel: &CancellationToken) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ManagerError::NotRunning);
        }

        let mut slot = self.lock_gate(cancel).await?;
        self.ensure_adapter(&mut slot, cancel).await?;

        let Some(adapter) = slot.adapter.as_mut() else {
            return Err(ManagerError::NotRunning);
        };

        let action = match request {
            Request::Command(id) => {
                let command = adapter
                    .registry()
                    .get_command(id)
                    .cloned()
                    .ok_or_else(|| AdapterError::CommandNotFound(id.to_string()))?;
                Action::Command(command)
            }
            Request::Feedback(id, value) => {
                let feedback = adapter
                    .registry()
                    .get_feedback(id)
                    .cloned()
                    .ok_or_else(|| AdapterError::FeedbackNotFound(id.to_string()))?;
                if !feedback.is_settable() {
                    return Err(AdapterError::NotSettable(id.to_string()).into());
                }
                Action::Feedback(FeedbackValue::new(feedback, value)?)
            }
        };

        let label = match &action {
            Action::Command(command) => command.id().to_string(),
            Action::Feedback(value) => format!("{}={}", value.id(), value.value()),
        };

        let working = &self.cancel;
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(AdapterError::Cancelled),
            _ = working.cancelled() => Err(AdapterError::Cancelled),
            result = async {
                match &action {
                    Action::Command(command) => adapter.execute_command(command, working).await,
                    Action::Feedback(value) => adapter.set_feedback(value, working).await,
                }
            } => result,
        };

        match &result {
            Ok(()) => tracing::debug!("{}: executed {}", self.key(), label),
            Err(e) if e.is_cancelled() => {
                tracing::debug!("{}: {} cancelled", self.key(), label);
                slot.recreate = true;
            }
            Err(e) if e.is_connection_error() => {
                tracing::warn!("{}: {} failed, adapter will be recreated: {}", self.key(), label, e);
                slot.recreate = true;
            }
            Err(e) => tracing::warn!("{}: {} failed: {}", self.key(), label, e),
        }

        result.map_err(ManagerError::from)
    }

    async fn lock_gate(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, AdapterSlot>> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ManagerError::Cancelled),
            _ = self.cancel.cancelled() => Err(ManagerError::NotRunning),
            slot = self.gate.lock() => Ok(slot),
        }
    }

    /// Make sure a valid, refreshed adapter sits in the slot
    async fn ensure_adapter(&self, slot: &mut AdapterSlot, cancel: &CancellationToken) -> Result<()> {
        let stale = slot
            .adapter
            .as_ref()
            .is_some_and(|adapter| slot.recreate || adapter.invalid_state());
        if stale {
            self.destroy_adapter(slot).await;
        }

        if slot.adapter.is_none() {
            let mut adapter = self.factory.create(self.sink.clone())?;
            let commands = adapter.commands().to_vec();
            let feedbacks = adapter.feedbacks().to_vec();
            let registered = self
                .context
                .publisher
                .register_device(self.key(), &commands, &feedbacks)
                .await;

            let root = match registered {
                Ok(root) => root,
                Err(e) => {
                    tracing::warn!("{}: host registration failed: {}", self.key(), e);
                    if let Err(e) = adapter.dispose().await {
                        tracing::debug!("{}: dispose after failed registration: {}", self.key(), e);
                    }
                    return Err(e.into());
                }
            };

            tracing::info!("{}: created adapter, registered as {}", self.key(), root);
            *self.context.root.write() = Some(root);
            slot.adapter = Some(adapter);
            slot.recreate = false;
            slot.needs_refresh = self.config.refresh_on_create;
        }

        if slot.needs_refresh {
            let Some(adapter) = slot.adapter.as_mut() else {
                return Ok(());
            };
            let working = &self.cancel;
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(AdapterError::Cancelled),
                _ = working.cancelled() => Err(AdapterError::Cancelled),
                result = adapter.refresh(working) => result,
            };

            match result {
                Ok(()) => slot.needs_refresh = false,
                Err(e) if e.is_cancelled() => {
                    slot.recreate = true;
                    return Err(ManagerError::Cancelled);
                }
                Err(e) => {
                    tracing::warn!("{}: refresh failed, retrying before next request: {}", self.key(), e);
                }
            }
        }

        Ok(())
    }

    async fn destroy_adapter(&self, slot: &mut AdapterSlot) {
        let Some(mut adapter) = slot.adapter.take() else {
            return;
        };

        tracing::info!("{}: recreating adapter", self.key());
        if let Err(e) = adapter.dispose().await {
            tracing::warn!("{}: failed to dispose adapter: {}", self.key(), e);
        }
        // Published against the old root before the replacement registers
        self.context
            .publish_command(&self.disconnected_command())
            .await;
        slot.recreate = false;
        slot.needs_refresh = false;
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("key", self.key())
            .field("running", &self.is_running())
            .field("root", &self.root_handle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullPublisher;
    use device_adapter::testing::ScriptedFactory;
    use device_model::{DeviceRegistry, Feedback};

    fn manager(factory: ScriptedFactory) -> DeviceManager {
        DeviceManager::new(
            DeviceKey::new("Tv"),
            ManagerConfig::immediate(),
            Arc::new(factory),
            Arc::new(NullPublisher::new()),
            &CancellationToken::new(),
        )
    }

    fn tv() -> ScriptedFactory {
        let mut registry = DeviceRegistry::new();
        registry.command(Command::new("PowerOn")).unwrap();
        registry.feedback(Feedback::bool("Power")).unwrap();
        ScriptedFactory::new("Tv", registry).with_value("Power", false)
    }

    #[tokio::test]
    async fn test_adapter_created_lazily() {
        let factory = tv();
        let manager = manager(factory.clone());
        assert_eq!(factory.created_count(), 0);

        manager
            .handle_command("PowerOn", &CancellationToken::new())
            .await
            .unwrap();
        manager
            .handle_command("PowerOn", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(factory.created_count(), 1);
        assert_eq!(factory.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_manager_rejects_requests() {
        let manager = manager(tv());
        manager.cancel();

        let result = manager
            .handle_command("PowerOn", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ManagerError::NotRunning)));
        assert!(manager.start().is_err());
    }

    #[tokio::test]
    async fn test_synchronized_returns_when_not_started() {
        let manager = manager(tv());
        manager.synchronized(&CancellationToken::new()).await.unwrap();
    }
}
