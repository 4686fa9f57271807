//! The orchestrator as a device: macros are its commands

use std::sync::Arc;

use async_trait::async_trait;
use device_adapter::{AdapterError, AdapterFactory, DeviceAdapter, EventSink, Result};
use device_manager::ConnectionRegistry;
use device_model::{Command, CommandKind, DeviceRegistry};
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::game_mode::set_game_mode;
use crate::macros::{lighting_sync, switch_input, turn_off_everything, turn_on, MacroContext};
use crate::outcome::MacroState;
use crate::status::StatusReporter;

pub const TURN_OFF_EVERYTHING: &str = "TurnOffEverything";
pub const GAME_MODE_ON: &str = "GameModeOn";
pub const GAME_MODE_OFF: &str = "GameModeOff";
pub const LIGHTING_SYNC_ON: &str = "LightingSyncOn";
pub const LIGHTING_SYNC_OFF: &str = "LightingSyncOff";

pub fn turn_on_command(source_name: &str) -> String {
    format!("TurnOn.{source_name}")
}

pub fn switch_input_command(source_name: &str) -> String {
    format!("SwitchInput.{source_name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacroCommand {
    TurnOn(usize),
    SwitchInput(usize),
    TurnOffEverything,
    GameMode(bool),
    LightingSync(bool),
}

impl MacroCommand {
    fn parse(id: &str, config: &OrchestratorConfig) -> Option<Self> {
        let source_index = |name: &str| config.sources.iter().position(|s| s.name == name);

        if let Some(name) = id.strip_prefix("TurnOn.") {
            return source_index(name).map(MacroCommand::TurnOn);
        }
        if let Some(name) = id.strip_prefix("SwitchInput.") {
            return source_index(name).map(MacroCommand::SwitchInput);
        }

        match id {
            TURN_OFF_EVERYTHING => Some(MacroCommand::TurnOffEverything),
            GAME_MODE_ON => Some(MacroCommand::GameMode(true)),
            GAME_MODE_OFF => Some(MacroCommand::GameMode(false)),
            LIGHTING_SYNC_ON if config.lighting.is_some() => Some(MacroCommand::LightingSync(true)),
            LIGHTING_SYNC_OFF if config.lighting.is_some() => Some(MacroCommand::LightingSync(false)),
            _ => None,
        }
    }
}

/// Adapter whose commands are multi-device macros
///
/// Each macro runs under a child of the manager's token, bounded by the
/// configured macro timeout. On expiry the child token is cancelled, in-flight
/// device calls are abandoned, and the cleanup stage publishes the terminal
/// state followed by `Idle`.
pub struct MacroOrchestrator {
    config: Arc<OrchestratorConfig>,
    devices: Arc<ConnectionRegistry>,
    registry: DeviceRegistry,
    reporter: StatusReporter,
}

impl MacroOrchestrator {
    pub fn new(
        config: Arc<OrchestratorConfig>,
        devices: Arc<ConnectionRegistry>,
        sink: EventSink,
    ) -> Result<Self> {
        let reporter = StatusReporter::new(sink);
        let mut registry = DeviceRegistry::new();

        for source in &config.sources {
            registry.command(
                Command::new(turn_on_command(&source.name)).with_kind(CommandKind::Control),
            )?;
            registry.command(
                Command::new(switch_input_command(&source.name)).with_kind(CommandKind::Control),
            )?;
        }

        let mut global = vec![TURN_OFF_EVERYTHING, GAME_MODE_ON, GAME_MODE_OFF];
        if config.lighting.is_some() {
            global.extend([LIGHTING_SYNC_ON, LIGHTING_SYNC_OFF]);
        }
        for id in global {
            registry.command(Command::new(id).with_kind(CommandKind::Control))?;
        }

        for feedback in reporter.feedbacks() {
            registry.feedback(feedback)?;
        }

        Ok(Self {
            config,
            devices,
            registry,
            reporter,
        })
    }

    async fn run(&self, command: MacroCommand, ctx: &MacroContext<'_>) -> MacroState {
        match command {
            MacroCommand::TurnOn(index) => match self.config.sources.get(index) {
                Some(source) => turn_on(ctx, source).await,
                None => MacroState::Converged,
            },
            MacroCommand::SwitchInput(index) => match self.config.sources.get(index) {
                Some(source) => switch_input(ctx, source).await,
                None => MacroState::Converged,
            },
            MacroCommand::TurnOffEverything => turn_off_everything(ctx).await,
            MacroCommand::GameMode(enable) => set_game_mode(ctx, enable).await,
            MacroCommand::LightingSync(enable) => lighting_sync(ctx, enable).await,
        }
    }
}

#[async_trait]
impl DeviceAdapter for MacroOrchestrator {
    fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn invalid_state(&self) -> bool {
        false
    }

    async fn execute_command(&mut self, command: &Command, cancel: &CancellationToken) -> Result<()> {
        let Some(macro_command) = MacroCommand::parse(command.id(), &self.config) else {
            return Err(AdapterError::CommandNotFound(command.id().to_string()));
        };

        tracing::info!("Running macro {}", command.id());
        self.reporter.state(MacroState::Running);
        let mut cleanup = Cleanup::new(&self.reporter, command.id());

        let token = cancel.child_token();
        let ctx = MacroContext {
            config: &self.config,
            devices: &self.devices,
            status: &self.reporter,
            cancel: token.clone(),
            background: cancel.clone(),
        };

        let timeout = self.config.macro_timeout;
        let state = match tokio::time::timeout(timeout, self.run(macro_command, &ctx)).await {
            Ok(state) => state,
            Err(_) => {
                token.cancel();
                tracing::warn!("Macro {} timed out after {:?}", command.id(), timeout);
                MacroState::Cancelled
            }
        };

        cleanup.finish(state);

        if cancel.is_cancelled() {
            return Err(AdapterError::Cancelled);
        }
        Ok(())
    }

    async fn refresh(&mut self, _cancel: &CancellationToken) -> Result<()> {
        self.reporter.state(MacroState::Idle);
        self.reporter.status("");
        Ok(())
    }
}

/// Publishes the terminal state and `Idle` exactly once
///
/// If the macro future is dropped before finishing (the caller cancelled it),
/// the drop publishes `Cancelled`.
struct Cleanup<'a> {
    reporter: &'a StatusReporter,
    macro_id: &'a str,
    done: bool,
}

impl<'a> Cleanup<'a> {
    fn new(reporter: &'a StatusReporter, macro_id: &'a str) -> Self {
        Self {
            reporter,
            macro_id,
            done: false,
        }
    }

    fn finish(&mut self, state: MacroState) {
        if self.done {
            return;
        }
        self.done = true;
        self.reporter.status("");
        self.reporter.state(state);
        self.reporter.state(MacroState::Idle);
        tracing::info!("Macro {} finished: {}", self.macro_id, state);
    }
}

impl Drop for Cleanup<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!("Macro {} abandoned by its caller", self.macro_id);
        }
        self.finish(MacroState::Cancelled);
    }
}

/// Creates a [`MacroOrchestrator`] for the orchestrator's device manager
#[derive(Clone)]
pub struct OrchestratorFactory {
    config: Arc<OrchestratorConfig>,
    devices: Arc<ConnectionRegistry>,
}

impl OrchestratorFactory {
    pub fn new(
        config: OrchestratorConfig,
        devices: Arc<ConnectionRegistry>,
    ) -> std::result::Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            devices,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

impl AdapterFactory for OrchestratorFactory {
    fn create(&self, sink: EventSink) -> Result<Box<dyn DeviceAdapter>> {
        let orchestrator =
            MacroOrchestrator::new(Arc::clone(&self.config), Arc::clone(&self.devices), sink)?;
        Ok(Box::new(orchestrator))
    }
}
