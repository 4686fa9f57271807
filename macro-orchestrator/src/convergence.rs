//! Query-and-correct polling for state that can only be changed relatively

use std::sync::Arc;
use std::time::Duration;

use device_manager::{CommandHandler, ConnectionRegistry, DeviceKey, FeedbackProvider, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::outcome::{handle_command_best_effort, StepOutcome};
use crate::policy::ConvergencePolicy;

/// Both capabilities of one device, resolved from the connection registry
#[derive(Clone)]
pub struct Device {
    pub handler: Arc<dyn CommandHandler>,
    pub provider: Arc<dyn FeedbackProvider>,
}

impl Device {
    /// Resolve a device, logging when it is missing or disabled
    pub fn lookup(registry: &ConnectionRegistry, key: &DeviceKey) -> Option<Self> {
        match registry.device(key) {
            Ok((handler, provider)) => Some(Self { handler, provider }),
            Err(e) => {
                tracing::warn!("Skipping macro steps for {}: {}", key, e);
                None
            }
        }
    }

    pub fn key(&self) -> &DeviceKey {
        self.handler.key()
    }

    pub fn value(&self, feedback_id: &str) -> Option<Value> {
        self.provider.feedback_value(feedback_id)
    }

    pub async fn command(&self, command_id: &str, cancel: &CancellationToken) -> StepOutcome {
        handle_command_best_effort(self.handler.as_ref(), command_id, cancel).await
    }

    /// Issue a query and wait for its feedback to land in the cache
    pub async fn query(&self, command_id: &str, cancel: &CancellationToken) -> StepOutcome {
        query(self.handler.as_ref(), self.provider.as_ref(), command_id, cancel).await
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("key", self.key()).finish()
    }
}

/// The state one poll drives a device toward
#[derive(Debug, Clone, PartialEq)]
pub struct StateTarget {
    pub feedback: String,
    pub desired: Value,
    pub query: String,
    pub change: String,
}

impl StateTarget {
    pub fn new(
        feedback: impl Into<String>,
        desired: impl Into<Value>,
        query: impl Into<String>,
        change: impl Into<String>,
    ) -> Self {
        Self {
            feedback: feedback.into(),
            desired: desired.into(),
            query: query.into(),
            change: change.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceOutcome {
    /// Already at the desired value on the first query
    Unchanged,
    Converged,
    RetriesExhausted,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceReport {
    pub outcome: ConvergenceOutcome,
    /// Change commands issued, failed ones included
    pub change_attempts: u32,
}

impl ConvergenceReport {
    fn new(outcome: ConvergenceOutcome, change_attempts: u32) -> Self {
        Self {
            outcome,
            change_attempts,
        }
    }

    /// Whether any change command was issued
    pub fn changed(&self) -> bool {
        self.change_attempts > 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == ConvergenceOutcome::Cancelled
    }
}

/// Sleep unless cancelled first; returns false on cancellation
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Drive a device toward `target.desired`
///
/// Queries once; if the feedback already matches, returns `Unchanged` without
/// issuing a change. Otherwise repeats change, wait the device's default
/// command delay, re-query, until the value matches or the policy is
/// exhausted. Failed commands are logged and count as attempts.
pub async fn ensure_state(
    handler: &dyn CommandHandler,
    provider: &dyn FeedbackProvider,
    target: &StateTarget,
    policy: &ConvergencePolicy,
    cancel: &CancellationToken,
) -> ConvergenceReport {
    let started = Instant::now();
    let key = handler.key();

    if query(handler, provider, &target.query, cancel).await.is_cancelled() {
        return ConvergenceReport::new(ConvergenceOutcome::Cancelled, 0);
    }
    if matches(provider, target) {
        tracing::debug!("{}: {} already {}", key, target.feedback, target.desired);
        return ConvergenceReport::new(ConvergenceOutcome::Unchanged, 0);
    }

    let mut attempts = 0;
    loop {
        if policy.is_exhausted(attempts, started.elapsed()) {
            tracing::warn!(
                "{}: {} did not reach {} after {} attempts",
                key,
                target.feedback,
                target.desired,
                attempts
            );
            return ConvergenceReport::new(ConvergenceOutcome::RetriesExhausted, attempts);
        }

        let outcome = handle_command_best_effort(handler, &target.change, cancel).await;
        if outcome.is_cancelled() {
            return ConvergenceReport::new(ConvergenceOutcome::Cancelled, attempts);
        }
        attempts += 1;

        if !pause(handler.default_command_delay(), cancel).await {
            return ConvergenceReport::new(ConvergenceOutcome::Cancelled, attempts);
        }

        if query(handler, provider, &target.query, cancel).await.is_cancelled() {
            return ConvergenceReport::new(ConvergenceOutcome::Cancelled, attempts);
        }
        if matches(provider, target) {
            tracing::debug!(
                "{}: {} reached {} after {} attempts",
                key,
                target.feedback,
                target.desired,
                attempts
            );
            return ConvergenceReport::new(ConvergenceOutcome::Converged, attempts);
        }
    }
}

/// [`ensure_state`] against a resolved [`Device`]
pub async fn ensure_device_state(
    device: &Device,
    target: &StateTarget,
    policy: &ConvergencePolicy,
    cancel: &CancellationToken,
) -> ConvergenceReport {
    ensure_state(
        device.handler.as_ref(),
        device.provider.as_ref(),
        target,
        policy,
        cancel,
    )
    .await
}

async fn query(
    handler: &dyn CommandHandler,
    provider: &dyn FeedbackProvider,
    command_id: &str,
    cancel: &CancellationToken,
) -> StepOutcome {
    let outcome = handle_command_best_effort(handler, command_id, cancel).await;
    if outcome.is_cancelled() {
        return outcome;
    }

    match provider.synchronized(cancel).await {
        Ok(()) => outcome,
        Err(_) if cancel.is_cancelled() => StepOutcome::Cancelled,
        Err(e) => StepOutcome::Failed(e.to_string()),
    }
}

fn matches(provider: &dyn FeedbackProvider, target: &StateTarget) -> bool {
    provider.feedback_value(&target.feedback).as_ref() == Some(&target.desired)
}
