//! Capability lookup between devices
//!
//! Orchestration code addresses other devices only through the
//! [`CommandHandler`] and [`FeedbackProvider`] capabilities resolved here,
//! never through concrete adapter types.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use device_model::{DeviceKey, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{RegistryError, Result};
use crate::manager::DeviceManager;

/// Command side of a device
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn key(&self) -> &DeviceKey;

    /// Typical time the device needs to apply a command
    fn default_command_delay(&self) -> Duration;

    /// Time the device needs after power-on before it accepts commands
    fn power_on_delay(&self) -> Duration;

    async fn handle_command(&self, command_id: &str, cancel: &CancellationToken) -> Result<()>;

    async fn handle_feedback(
        &self,
        feedback_id: &str,
        value: Value,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Feedback side of a device
#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    /// Last known value, without blocking
    fn feedback_value(&self, feedback_id: &str) -> Option<Value>;

    /// Wait until every feedback raised so far is visible through `feedback_value`
    async fn synchronized(&self, cancel: &CancellationToken) -> Result<()>;
}

#[async_trait]
impl CommandHandler for DeviceManager {
    fn key(&self) -> &DeviceKey {
        DeviceManager::key(self)
    }

    fn default_command_delay(&self) -> Duration {
        DeviceManager::default_command_delay(self)
    }

    fn power_on_delay(&self) -> Duration {
        DeviceManager::power_on_delay(self)
    }

    async fn handle_command(&self, command_id: &str, cancel: &CancellationToken) -> Result<()> {
        DeviceManager::handle_command(self, command_id, cancel).await
    }

    async fn handle_feedback(
        &self,
        feedback_id: &str,
        value: Value,
        cancel: &CancellationToken,
    ) -> Result<()> {
        DeviceManager::handle_feedback(self, feedback_id, value, cancel).await
    }
}

#[async_trait]
impl FeedbackProvider for DeviceManager {
    fn feedback_value(&self, feedback_id: &str) -> Option<Value> {
        DeviceManager::feedback_value(self, feedback_id)
    }

    async fn synchronized(&self, cancel: &CancellationToken) -> Result<()> {
        DeviceManager::synchronized(self, cancel).await
    }
}

struct Entry {
    handler: Arc<dyn CommandHandler>,
    provider: Arc<dyn FeedbackProvider>,
    enabled: bool,
}

/// Thread-safe map from device key to that device's capabilities
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: DashMap<DeviceKey, Entry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a device's capabilities, enabled
    pub fn register(
        &self,
        key: DeviceKey,
        handler: Arc<dyn CommandHandler>,
        provider: Arc<dyn FeedbackProvider>,
    ) {
        tracing::debug!("Registered device {}", key);
        self.entries.insert(
            key,
            Entry {
                handler,
                provider,
                enabled: true,
            },
        );
    }

    pub fn register_manager(&self, manager: Arc<DeviceManager>) {
        let key = manager.key().clone();
        self.register(key, manager.clone(), manager);
    }

    /// Remove a device; returns true if it was registered
    pub fn unregister(&self, key: &DeviceKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Enable or disable lookups for a device
    pub fn set_enabled(&self, key: &DeviceKey, enabled: bool) -> std::result::Result<(), RegistryError> {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.enabled = enabled;
                Ok(())
            }
            None => Err(RegistryError::NotFound(key.clone())),
        }
    }

    pub fn command_handler(
        &self,
        key: &DeviceKey,
    ) -> std::result::Result<Arc<dyn CommandHandler>, RegistryError> {
        match self.entries.get(key) {
            Some(entry) if entry.enabled => Ok(Arc::clone(&entry.handler)),
            _ => Err(RegistryError::NotFound(key.clone())),
        }
    }

    pub fn feedback_provider(
        &self,
        key: &DeviceKey,
    ) -> std::result::Result<Arc<dyn FeedbackProvider>, RegistryError> {
        match self.entries.get(key) {
            Some(entry) if entry.enabled => Ok(Arc::clone(&entry.provider)),
            _ => Err(RegistryError::NotFound(key.clone())),
        }
    }

    /// Both capabilities of an enabled device
    pub fn device(
        &self,
        key: &DeviceKey,
    ) -> std::result::Result<(Arc<dyn CommandHandler>, Arc<dyn FeedbackProvider>), RegistryError> {
        match self.entries.get(key) {
            Some(entry) if entry.enabled => {
                Ok((Arc::clone(&entry.handler), Arc::clone(&entry.provider)))
            }
            _ => Err(RegistryError::NotFound(key.clone())),
        }
    }

    /// Keys of every registered device, enabled or not, sorted
    pub fn keys(&self) -> Vec<DeviceKey> {
        let mut keys: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn is_enabled(&self, key: &DeviceKey) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.enabled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::host::NullPublisher;
    use device_adapter::testing::ScriptedFactory;
    use device_model::{Command, DeviceRegistry};

    fn manager(key: &str) -> Arc<DeviceManager> {
        let mut registry = DeviceRegistry::new();
        registry.command(Command::new("PowerOn")).unwrap();
        Arc::new(DeviceManager::new(
            DeviceKey::new(key),
            ManagerConfig::default(),
            Arc::new(ScriptedFactory::new(key, registry)),
            Arc::new(NullPublisher::new()),
            &CancellationToken::new(),
        ))
    }

    #[test]
    fn test_lookup_registered_manager() {
        let registry = ConnectionRegistry::new();
        registry.register_manager(manager("Avr"));

        let handler = registry.command_handler(&DeviceKey::new("Avr")).unwrap();
        assert_eq!(handler.key().as_str(), "Avr");
        assert_eq!(handler.power_on_delay(), Duration::from_secs(3));
        assert!(registry.feedback_provider(&DeviceKey::new("Avr")).is_ok());
    }

    #[test]
    fn test_unknown_key_not_found() {
        let registry = ConnectionRegistry::new();
        let key = DeviceKey::new("Projector");
        assert_eq!(
            registry.command_handler(&key).err(),
            Some(RegistryError::NotFound(key.clone()))
        );
        assert!(registry.feedback_provider(&key).is_err());
        tokio_test::assert_err!(registry.set_enabled(&key, true));
    }

    #[test]
    fn test_disabled_device_not_found() {
        let registry = ConnectionRegistry::new();
        registry.register_manager(manager("Tv"));
        let key = DeviceKey::new("Tv");

        tokio_test::assert_ok!(registry.set_enabled(&key, false));
        assert!(registry.command_handler(&key).is_err());
        assert!(registry.device(&key).is_err());
        assert_eq!(registry.keys(), vec![key.clone()]);

        tokio_test::assert_ok!(registry.set_enabled(&key, true));
        assert!(registry.device(&key).is_ok());
    }

    #[test]
    fn test_keys_sorted_and_clear() {
        let registry = ConnectionRegistry::new();
        registry.register_manager(manager("Tv"));
        registry.register_manager(manager("Avr"));
        registry.register_manager(manager("AppleTv"));

        let keys: Vec<_> = registry.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["AppleTv", "Avr", "Tv"]);

        assert!(registry.unregister(&DeviceKey::new("Tv")));
        assert!(!registry.unregister(&DeviceKey::new("Tv")));
        registry.clear();
        assert!(registry.is_empty());
    }
}
