//! HomeTheaterSystem - assembles managers, registry and orchestrator

use std::collections::HashMap;
use std::sync::Arc;

use device_adapter::{AdapterFactory, CancellationToken};
use device_manager::{ConnectionRegistry, DeviceManager, HostPublisher, NullPublisher};
use device_model::{DeviceKey, Value};
use futures::future::join_all;
use macro_orchestrator::OrchestratorFactory;
use parking_lot::RwLock;

use crate::config::{DeviceConfig, SystemConfig};
use crate::error::{Result, SystemError};

/// Every configured device, each behind its own started [`DeviceManager`]
///
/// # Example
///
/// ```rust,ignore
/// use hometheater::prelude::*;
///
/// let system = HomeTheaterSystem::builder()
///     .with_config(SystemConfig::load_default()?)
///     .with_publisher(Arc::new(MyHostPublisher::new()))
///     .with_adapter("Avr", AvrFactory::new(avr_addr))
///     .with_adapter("Tv", TvFactory::new(tv_addr))
///     .build()?;
///
/// system.invoke(&DeviceKey::new("GlobalMacros"), "TurnOn.AppleTv", &cancel).await?;
/// let input = system.feedback_value(&DeviceKey::new("Avr"), "Input");
///
/// system.shutdown().await;
/// ```
pub struct HomeTheaterSystem {
    config: RwLock<SystemConfig>,
    registry: Arc<ConnectionRegistry>,
    managers: RwLock<HashMap<DeviceKey, Arc<DeviceManager>>>,
    factories: HashMap<DeviceKey, Arc<dyn AdapterFactory>>,
    publisher: Arc<dyn HostPublisher>,
    shutdown: CancellationToken,
}

impl HomeTheaterSystem {
    pub fn builder() -> HomeTheaterSystemBuilder {
        HomeTheaterSystemBuilder::new()
    }

    /// Drive a device by command id
    pub async fn invoke(
        &self,
        key: &DeviceKey,
        command_id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let handler = self.registry.command_handler(key)?;
        handler.handle_command(command_id, cancel).await?;
        Ok(())
    }

    /// Push a value to a host-settable feedback
    pub async fn invoke_feedback(
        &self,
        key: &DeviceKey,
        feedback_id: &str,
        value: Value,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let handler = self.registry.command_handler(key)?;
        handler.handle_feedback(feedback_id, value, cancel).await?;
        Ok(())
    }

    pub fn feedback_value(&self, key: &DeviceKey, feedback_id: &str) -> Option<Value> {
        self.registry
            .feedback_provider(key)
            .ok()?
            .feedback_value(feedback_id)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn device_keys(&self) -> Vec<DeviceKey> {
        self.registry.keys()
    }

    pub fn manager(&self, key: &DeviceKey) -> Option<Arc<DeviceManager>> {
        self.managers.read().get(key).cloned()
    }

    pub fn config(&self) -> SystemConfig {
        self.config.read().clone()
    }

    /// Apply an edited device configuration
    ///
    /// The old manager, if any, is cancelled and shut down. A new one is
    /// created if the device is still enabled.
    pub async fn reconfigure_device(&self, device: DeviceConfig) -> Result<()> {
        if device.key == self.config.read().orchestrator_key {
            return Err(SystemError::Config(format!(
                "'{}' is the orchestrator and cannot be reconfigured",
                device.key
            )));
        }
        if device.enabled && !self.factories.contains_key(&device.key) {
            return Err(SystemError::MissingAdapter(device.key));
        }

        let old = self.managers.write().remove(&device.key);
        if let Some(old) = old {
            tracing::info!("Replacing device manager for {}", device.key);
            self.registry.unregister(&device.key);
            old.cancel();
            old.shutdown().await;
        }

        let manager_config = {
            let mut config = self.config.write();
            match config.devices.iter_mut().find(|d| d.key == device.key) {
                Some(existing) => *existing = device.clone(),
                None => config.devices.push(device.clone()),
            }
            device.manager_config(&config.manager)
        };

        if device.enabled {
            let factory = self.factory(&device.key)?;
            let manager = self.start_manager(device.key.clone(), manager_config, factory)?;
            self.registry.register_manager(Arc::clone(&manager));
            self.managers.write().insert(device.key, manager);
        }

        Ok(())
    }

    /// Enable or disable a configured device
    pub async fn set_device_enabled(&self, key: &DeviceKey, enabled: bool) -> Result<()> {
        let device = self
            .config
            .read()
            .device(key)
            .cloned()
            .ok_or_else(|| SystemError::UnknownDevice(key.clone()))?;
        self.reconfigure_device(device.with_enabled(enabled)).await
    }

    /// Cancel everything, shut every manager down, and clear the registry
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down home theater system");
        self.shutdown.cancel();

        let managers: Vec<_> = self.managers.write().drain().map(|(_, m)| m).collect();
        join_all(managers.iter().map(|manager| manager.shutdown())).await;

        self.registry.clear();
    }

    fn factory(&self, key: &DeviceKey) -> Result<Arc<dyn AdapterFactory>> {
        self.factories
            .get(key)
            .cloned()
            .ok_or_else(|| SystemError::MissingAdapter(key.clone()))
    }

    fn start_manager(
        &self,
        key: DeviceKey,
        config: device_manager::ManagerConfig,
        factory: Arc<dyn AdapterFactory>,
    ) -> Result<Arc<DeviceManager>> {
        let manager = Arc::new(DeviceManager::new(
            key,
            config,
            factory,
            Arc::clone(&self.publisher),
            &self.shutdown,
        ));
        manager.start()?;
        Ok(manager)
    }
}

impl std::fmt::Debug for HomeTheaterSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeTheaterSystem")
            .field("devices", &self.device_keys())
            .finish()
    }
}

/// Builder for [`HomeTheaterSystem`]
pub struct HomeTheaterSystemBuilder {
    config: SystemConfig,
    publisher: Option<Arc<dyn HostPublisher>>,
    factories: HashMap<DeviceKey, Arc<dyn AdapterFactory>>,
    shutdown: Option<CancellationToken>,
}

impl HomeTheaterSystemBuilder {
    pub fn new() -> Self {
        Self {
            config: SystemConfig::default(),
            publisher: None,
            factories: HashMap::new(),
            shutdown: None,
        }
    }

    pub fn with_config(mut self, config: SystemConfig) -> Self {
        self.config = config;
        self
    }

    /// Host integration; defaults to [`NullPublisher`]
    pub fn with_publisher(mut self, publisher: Arc<dyn HostPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Adapter factory for a configured device
    pub fn with_adapter(
        mut self,
        key: impl Into<DeviceKey>,
        factory: impl AdapterFactory + 'static,
    ) -> Self {
        self.factories.insert(key.into(), Arc::new(factory));
        self
    }

    /// Process-wide token; every manager's token is a child of it
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Create and start every manager; must run inside a tokio runtime
    pub fn build(self) -> Result<HomeTheaterSystem> {
        self.config.validate()?;

        let system = HomeTheaterSystem {
            registry: Arc::new(ConnectionRegistry::new()),
            managers: RwLock::new(HashMap::new()),
            factories: self.factories,
            publisher: self
                .publisher
                .unwrap_or_else(|| Arc::new(NullPublisher::new())),
            shutdown: self.shutdown.unwrap_or_default(),
            config: RwLock::new(self.config),
        };

        let config = system.config();
        for device in &config.devices {
            if !device.enabled {
                tracing::debug!("Device {} is disabled", device.key);
                continue;
            }
            let Some(factory) = system.factories.get(&device.key).cloned() else {
                tracing::warn!("No adapter factory for {}, skipping", device.key);
                continue;
            };

            let manager = system.start_manager(
                device.key.clone(),
                device.manager_config(&config.manager),
                factory,
            )?;
            system.registry.register_manager(Arc::clone(&manager));
            system.managers.write().insert(device.key.clone(), manager);
        }

        if let Some(orchestrator) = &config.orchestrator {
            let factory = OrchestratorFactory::new(orchestrator.clone(), Arc::clone(&system.registry))?;
            let manager = system.start_manager(
                config.orchestrator_key.clone(),
                config.manager.clone(),
                Arc::new(factory),
            )?;
            system.registry.register_manager(Arc::clone(&manager));
            system
                .managers
                .write()
                .insert(config.orchestrator_key.clone(), manager);
        }

        tracing::info!(
            "Home theater system started with {} devices",
            system.managers.read().len()
        );
        Ok(system)
    }
}

impl Default for HomeTheaterSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
