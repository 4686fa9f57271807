//! A simulated living room: AVR, TV, two sources and a lighting box.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use device_adapter::testing::{Effect, ScriptedFactory};
use device_manager::{
    CancellationToken, ConnectionRegistry, DeviceManager, ManagerConfig, NullPublisher,
    RecordingPublisher,
};
use device_model::{Command, DeviceKey, DeviceRegistry, Feedback, Value};
use macro_orchestrator::{OrchestratorConfig, OrchestratorFactory, SourceDevice};

pub const ORCHESTRATOR: &str = "GlobalMacros";

fn set(id: &str, value: impl Into<Value>) -> Effect {
    Effect::Set(id.to_string(), value.into())
}

fn report(id: &str) -> Effect {
    Effect::Report(id.to_string())
}

fn registry(commands: &[&str], feedbacks: Vec<Feedback>) -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    for id in commands {
        registry.command(Command::new(*id)).unwrap();
    }
    for feedback in feedbacks {
        registry.feedback(feedback).unwrap();
    }
    registry
}

pub fn avr() -> ScriptedFactory {
    let registry = registry(
        &[
            "Zone1PowerOn",
            "Zone1PowerOff",
            "Zone1PowerQuery",
            "InputQuery",
            "InputMediaPlayer",
            "InputBluRay",
            "InputNext",
            "DialogEnhancerQuery",
            "DialogEnhancerOff",
            "SubwooferLevelQuery",
            "SubwooferLevelStep",
            "DynamicVolumeQuery",
            "DynamicVolumeOff",
        ],
        vec![
            Feedback::bool("Zone1Power"),
            Feedback::text("Input"),
            Feedback::text("DialogEnhancer"),
            Feedback::double("SubwooferLevel"),
            Feedback::text("DynamicVolume"),
        ],
    );

    ScriptedFactory::new("Avr", registry)
        .with_value("Zone1Power", false)
        .with_value("Input", "BD")
        .with_value("DialogEnhancer", "OFF")
        .with_value("SubwooferLevel", 0.0)
        .with_value("DynamicVolume", "OFF")
        .on_command("Zone1PowerOn", vec![set("Zone1Power", true)])
        .on_command("Zone1PowerOff", vec![set("Zone1Power", false)])
        .on_command("Zone1PowerQuery", vec![report("Zone1Power")])
        .on_command("InputQuery", vec![report("Input")])
        .on_command("InputMediaPlayer", vec![set("Input", "MPLAY")])
        .on_command("InputBluRay", vec![set("Input", "BD")])
        .on_command("DialogEnhancerQuery", vec![report("DialogEnhancer")])
        .on_command("DialogEnhancerOff", vec![set("DialogEnhancer", "OFF")])
        .on_command("SubwooferLevelQuery", vec![report("SubwooferLevel")])
        .on_command(
            "SubwooferLevelStep",
            vec![Effect::Step(
                "SubwooferLevel".to_string(),
                vec![Value::Double(-2.0), Value::Double(-1.0), Value::Double(0.0)],
            )],
        )
        .on_command("DynamicVolumeQuery", vec![report("DynamicVolume")])
        .on_command("DynamicVolumeOff", vec![set("DynamicVolume", "OFF")])
}

pub fn tv() -> ScriptedFactory {
    let registry = registry(
        &[
            "PowerOn", "PowerOff", "PowerQuery", "KeyMenu", "KeyUp", "KeyDown", "KeyLeft",
            "KeyRight", "KeyEnter", "KeyBack",
        ],
        vec![Feedback::bool("Power")],
    );
    power_script(ScriptedFactory::new("Tv", registry))
}

pub fn source(name: &str) -> ScriptedFactory {
    let registry = registry(
        &["PowerOn", "PowerOff", "PowerQuery"],
        vec![Feedback::bool("Power")],
    );
    power_script(ScriptedFactory::new(name, registry))
}

pub fn lighting() -> ScriptedFactory {
    let registry = registry(
        &["SyncOn", "SyncOff", "SyncVideo", "PowerOff"],
        vec![Feedback::text("Mode")],
    );
    ScriptedFactory::new("HueSync", registry)
        .with_value("Mode", "Off")
        .on_command("SyncOn", vec![set("Mode", "Sync")])
        .on_command("SyncVideo", vec![set("Mode", "Video")])
        .on_command("SyncOff", vec![set("Mode", "Off")])
        .on_command("PowerOff", vec![set("Mode", "Off")])
}

fn power_script(factory: ScriptedFactory) -> ScriptedFactory {
    factory
        .with_value("Power", false)
        .on_command("PowerOn", vec![set("Power", true)])
        .on_command("PowerOff", vec![set("Power", false)])
        .on_command("PowerQuery", vec![report("Power")])
}

pub fn orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig::new("Avr", "Tv")
        .with_lighting("HueSync")
        .with_source(
            SourceDevice::new("AppleTv", "MPLAY", "InputMediaPlayer").with_lighting_mode("SyncVideo"),
        )
        .with_source(SourceDevice::new("Roku", "BD", "InputBluRay"))
}

pub fn device_config() -> ManagerConfig {
    ManagerConfig::default()
        .with_default_command_delay(Duration::from_millis(100))
        .with_power_on_delay(Duration::from_secs(2))
}

pub struct LivingRoom {
    pub avr: ScriptedFactory,
    pub tv: ScriptedFactory,
    pub apple_tv: ScriptedFactory,
    pub roku: ScriptedFactory,
    pub lighting: ScriptedFactory,
    pub registry: Arc<ConnectionRegistry>,
    pub orchestrator: Arc<DeviceManager>,
    pub publisher: Arc<RecordingPublisher>,
    pub shutdown: CancellationToken,
    managers: Vec<Arc<DeviceManager>>,
}

impl LivingRoom {
    pub fn new() -> Self {
        Self::with_config(orchestrator_config())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self::build(avr(), tv(), source("AppleTv"), source("Roku"), lighting(), config)
    }

    pub fn build(
        avr: ScriptedFactory,
        tv: ScriptedFactory,
        apple_tv: ScriptedFactory,
        roku: ScriptedFactory,
        lighting: ScriptedFactory,
        config: OrchestratorConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let registry = Arc::new(ConnectionRegistry::new());
        let mut managers = Vec::new();

        for (key, factory) in [
            ("Avr", &avr),
            ("Tv", &tv),
            ("AppleTv", &apple_tv),
            ("Roku", &roku),
            ("HueSync", &lighting),
        ] {
            let manager = Arc::new(DeviceManager::new(
                DeviceKey::new(key),
                device_config(),
                Arc::new(factory.clone()),
                Arc::new(NullPublisher::new()),
                &shutdown,
            ));
            manager.start().unwrap();
            registry.register_manager(Arc::clone(&manager));
            managers.push(manager);
        }

        let publisher = Arc::new(RecordingPublisher::new());
        let factory = OrchestratorFactory::new(config, Arc::clone(&registry)).unwrap();
        let orchestrator = Arc::new(DeviceManager::new(
            DeviceKey::new(ORCHESTRATOR),
            ManagerConfig::immediate(),
            Arc::new(factory),
            publisher.clone(),
            &shutdown,
        ));
        orchestrator.start().unwrap();
        registry.register_manager(Arc::clone(&orchestrator));

        Self {
            avr,
            tv,
            apple_tv,
            roku,
            lighting,
            registry,
            orchestrator,
            publisher,
            shutdown,
            managers,
        }
    }

    /// Run a macro and wait for its feedback to be published
    pub async fn run(&self, macro_id: &str) {
        let token = CancellationToken::new();
        self.orchestrator.handle_command(macro_id, &token).await.unwrap();
        self.orchestrator.synchronized(&token).await.unwrap();
    }

    pub fn macro_states(&self) -> Vec<String> {
        self.publisher
            .feedback_values("MacroState")
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    pub fn macro_statuses(&self) -> Vec<String> {
        self.publisher
            .feedback_values("MacroStatus")
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    pub fn manager(&self, key: &str) -> Arc<DeviceManager> {
        self.managers
            .iter()
            .find(|m| m.key().as_str() == key)
            .cloned()
            .unwrap()
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.orchestrator.shutdown().await;
        for manager in &self.managers {
            manager.shutdown().await;
        }
        self.registry.clear();
    }
}

/// Poll until `condition` holds, advancing paused time
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
