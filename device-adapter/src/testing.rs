//! Scripted in-memory adapter for tests
//!
//! [`ScriptedFactory`] simulates one device. Its simulated state lives in the
//! factory and survives adapter recreation, the way a real device keeps its
//! state while the control connection comes and goes. Each command runs a
//! script of [`Effect`]s against that state, and every call is counted so
//! tests can assert on lifecycle and serialization.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use device_model::{Command, DeviceRegistry, FeedbackValue, Value};
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterFactory, DeviceAdapter};
use crate::error::{AdapterError, Result};
use crate::events::EventSink;

/// What a scripted command does to the simulated device
#[derive(Debug, Clone)]
pub enum Effect {
    /// Store a value and raise it
    Set(String, Value),
    /// Raise the currently stored value (a query)
    Report(String),
    /// Advance to the next value in a cycle and raise it (a relative step)
    Step(String, Vec<Value>),
    /// Fail with a protocol error
    Fail(String),
    /// Fail as if the liveness probe could not reach the device
    PoweredOff,
}

/// Enter/exit instants of one command execution
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub command_id: String,
    pub entered: Instant,
    pub exited: Instant,
}

#[derive(Debug, Default)]
struct Simulation {
    values: HashMap<String, Value>,
    scripts: HashMap<String, Vec<Effect>>,
    execute_delay: Duration,
    fail_refresh: bool,
    invalid_through: u32,
    created: u32,
    disposed: u32,
    refreshes: u32,
    executed: Vec<String>,
    records: Vec<ExecutionRecord>,
    in_flight: u32,
    max_in_flight: u32,
}

/// Factory for a simulated device
#[derive(Clone)]
pub struct ScriptedFactory {
    name: String,
    registry: DeviceRegistry,
    sim: Arc<Mutex<Simulation>>,
}

impl ScriptedFactory {
    pub fn new(name: impl Into<String>, registry: DeviceRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
            sim: Arc::new(Mutex::new(Simulation::default())),
        }
    }

    /// Seed a simulated feedback value
    pub fn with_value(self, feedback_id: &str, value: impl Into<Value>) -> Self {
        self.set_value(feedback_id, value);
        self
    }

    /// Script the effects of one command
    pub fn on_command(self, command_id: &str, effects: Vec<Effect>) -> Self {
        self.sim
            .lock()
            .scripts
            .insert(command_id.to_string(), effects);
        self
    }

    /// Make every execution take this long
    pub fn with_execute_delay(self, delay: Duration) -> Self {
        self.sim.lock().execute_delay = delay;
        self
    }

    /// Change the simulated device state without raising anything
    pub fn set_value(&self, feedback_id: &str, value: impl Into<Value>) {
        self.sim
            .lock()
            .values
            .insert(feedback_id.to_string(), value.into());
    }

    pub fn value(&self, feedback_id: &str) -> Option<Value> {
        self.sim.lock().values.get(feedback_id).cloned()
    }

    /// Mark every adapter created so far as invalid
    pub fn invalidate_current(&self) {
        let mut sim = self.sim.lock();
        sim.invalid_through = sim.created;
    }

    pub fn set_fail_refresh(&self, fail: bool) {
        self.sim.lock().fail_refresh = fail;
    }

    pub fn created_count(&self) -> u32 {
        self.sim.lock().created
    }

    pub fn disposed_count(&self) -> u32 {
        self.sim.lock().disposed
    }

    pub fn refresh_count(&self) -> u32 {
        self.sim.lock().refreshes
    }

    /// Every command id executed, in order
    pub fn executed(&self) -> Vec<String> {
        self.sim.lock().executed.clone()
    }

    pub fn execution_count(&self, command_id: &str) -> usize {
        self.sim
            .lock()
            .executed
            .iter()
            .filter(|id| *id == command_id)
            .count()
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.sim.lock().records.clone()
    }

    /// Highest number of executions observed in flight at once
    pub fn max_concurrent(&self) -> u32 {
        self.sim.lock().max_in_flight
    }
}

impl AdapterFactory for ScriptedFactory {
    fn create(&self, sink: EventSink) -> Result<Box<dyn DeviceAdapter>> {
        let generation = {
            let mut sim = self.sim.lock();
            sim.created += 1;
            sim.created
        };
        Ok(Box::new(ScriptedAdapter {
            name: self.name.clone(),
            generation,
            registry: self.registry.clone(),
            sink,
            sim: Arc::clone(&self.sim),
            connected: false,
        }))
    }
}

/// One adapter instance over the shared simulation
pub struct ScriptedAdapter {
    name: String,
    generation: u32,
    registry: DeviceRegistry,
    sink: EventSink,
    sim: Arc<Mutex<Simulation>>,
    connected: bool,
}

impl ScriptedAdapter {
    fn apply(&self, effects: &[Effect]) -> Result<Vec<FeedbackValue>> {
        let mut sim = self.sim.lock();
        let mut raised = Vec::new();

        for effect in effects {
            match effect {
                Effect::Set(id, value) => {
                    sim.values.insert(id.clone(), value.clone());
                    raised.push(self.registry.feedback_value(id, value.clone())?);
                }
                Effect::Report(id) => {
                    if let Some(value) = sim.values.get(id) {
                        raised.push(self.registry.feedback_value(id, value.clone())?);
                    }
                }
                Effect::Step(id, cycle) => {
                    if cycle.is_empty() {
                        continue;
                    }
                    let next = sim
                        .values
                        .get(id)
                        .and_then(|current| cycle.iter().position(|v| v == current))
                        .map(|index| (index + 1) % cycle.len())
                        .unwrap_or(0);
                    let value = cycle[next].clone();
                    sim.values.insert(id.clone(), value.clone());
                    raised.push(self.registry.feedback_value(id, value)?);
                }
                Effect::Fail(message) => {
                    return Err(AdapterError::DeviceProtocolError(message.clone()));
                }
                Effect::PoweredOff => {
                    return Err(AdapterError::DevicePoweredOff {
                        device: self.name.clone(),
                        reason: "scripted".to_string(),
                    });
                }
            }
        }

        Ok(raised)
    }
}

#[async_trait]
impl DeviceAdapter for ScriptedAdapter {
    fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn invalid_state(&self) -> bool {
        self.generation <= self.sim.lock().invalid_through
    }

    async fn execute_command(&mut self, command: &Command, cancel: &CancellationToken) -> Result<()> {
        let entered = Instant::now();
        let (delay, effects) = {
            let mut sim = self.sim.lock();
            sim.in_flight += 1;
            sim.max_in_flight = sim.max_in_flight.max(sim.in_flight);
            sim.executed.push(command.id().to_string());
            (
                sim.execute_delay,
                sim.scripts.get(command.id()).cloned().unwrap_or_default(),
            )
        };

        let waited = tokio::select! {
            _ = cancel.cancelled() => Err(AdapterError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        };

        let result = waited.and_then(|()| self.apply(&effects));

        {
            let mut sim = self.sim.lock();
            sim.in_flight -= 1;
            sim.records.push(ExecutionRecord {
                command_id: command.id().to_string(),
                entered,
                exited: Instant::now(),
            });
        }

        match result {
            Ok(raised) => {
                self.connected = true;
                for value in raised {
                    self.sink.raise_feedback(value);
                }
                Ok(())
            }
            Err(e) => {
                if e.is_connection_error() {
                    self.connected = false;
                }
                Err(e)
            }
        }
    }

    async fn set_feedback(&mut self, value: &FeedbackValue, _cancel: &CancellationToken) -> Result<()> {
        self.sim
            .lock()
            .values
            .insert(value.id().to_string(), value.value().clone());
        self.sink.raise_feedback(value.clone());
        Ok(())
    }

    async fn refresh(&mut self, _cancel: &CancellationToken) -> Result<()> {
        let snapshot: Vec<(String, Value)> = {
            let mut sim = self.sim.lock();
            sim.refreshes += 1;
            if sim.fail_refresh {
                return Err(AdapterError::DevicePoweredOff {
                    device: self.name.clone(),
                    reason: "scripted refresh failure".to_string(),
                });
            }
            self.registry
                .feedbacks()
                .iter()
                .filter_map(|f| sim.values.get(f.id()).map(|v| (f.id().to_string(), v.clone())))
                .collect()
        };

        self.connected = true;
        for (id, value) in snapshot {
            self.sink.update_feedback(&self.registry, &id, value)?;
        }
        Ok(())
    }

    async fn dispose(&mut self) -> Result<()> {
        self.sim.lock().disposed += 1;
        self.connected = false;
        Ok(())
    }
}
