//! Best-effort step results and macro state

use std::fmt;

use device_manager::CommandHandler;
use tokio_util::sync::CancellationToken;

use crate::convergence::{ConvergenceOutcome, ConvergenceReport};

/// Result of one best-effort macro step
///
/// Macro steps never propagate device errors; they report them here so the
/// macro can keep making progress on the remaining devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    Failed(String),
    Cancelled,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepOutcome::Ok)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepOutcome::Cancelled)
    }
}

/// Issue a command, folding any failure into a [`StepOutcome`]
///
/// Only the macro's own token decides cancellation. A device whose manager was
/// stopped or cancelled on its own is a failed step like any other. The manager
/// already logs the failure itself, so this only traces it.
pub async fn handle_command_best_effort(
    handler: &dyn CommandHandler,
    command_id: &str,
    cancel: &CancellationToken,
) -> StepOutcome {
    if cancel.is_cancelled() {
        return StepOutcome::Cancelled;
    }

    match handler.handle_command(command_id, cancel).await {
        Ok(()) => StepOutcome::Ok,
        Err(_) if cancel.is_cancelled() => StepOutcome::Cancelled,
        Err(e) => {
            tracing::debug!("{}: ignoring failed {}: {}", handler.key(), command_id, e);
            StepOutcome::Failed(e.to_string())
        }
    }
}

/// Observable lifecycle of the macro in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacroState {
    #[default]
    Idle,
    Running,
    Converged,
    RetriesExhausted,
    Cancelled,
}

impl MacroState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacroState::Idle => "Idle",
            MacroState::Running => "Running",
            MacroState::Converged => "Converged",
            MacroState::RetriesExhausted => "RetriesExhausted",
            MacroState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for MacroState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folds the convergence polls of one macro into its terminal state
#[derive(Debug, Default)]
pub struct MacroTally {
    exhausted: bool,
    cancelled: bool,
}

impl MacroTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &ConvergenceReport) {
        match report.outcome {
            ConvergenceOutcome::RetriesExhausted => self.exhausted = true,
            ConvergenceOutcome::Cancelled => self.cancelled = true,
            ConvergenceOutcome::Unchanged | ConvergenceOutcome::Converged => {}
        }
    }

    pub fn record_step(&mut self, outcome: &StepOutcome) {
        if outcome.is_cancelled() {
            self.cancelled = true;
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Cancellation dominates exhaustion
    pub fn state(&self) -> MacroState {
        if self.cancelled {
            MacroState::Cancelled
        } else if self.exhausted {
            MacroState::RetriesExhausted
        } else {
            MacroState::Converged
        }
    }
}
