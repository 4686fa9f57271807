//! # Macro Orchestrator
//!
//! Compound, order-sensitive operations spanning several devices, exposed as
//! the commands of one more device adapter.
//!
//! Orchestration only depends on the [`CommandHandler`] and
//! [`FeedbackProvider`] capabilities resolved through a shared
//! [`ConnectionRegistry`]; it never sees a concrete adapter.
//!
//! ## Convergence polling
//!
//! State that can only be changed relatively (a toggle, an input step) is
//! driven with [`ensure_state`]: query, compare, change, wait, re-query,
//! bounded by a [`ConvergencePolicy`].
//!
//! ```rust,ignore
//! let (handler, provider) = registry.device(&DeviceKey::new("Avr"))?;
//! let report = ensure_state(
//!     handler.as_ref(),
//!     provider.as_ref(),
//!     &StateTarget::new("Input", "MPLAY", "InputQuery", "InputNext"),
//!     &ConvergencePolicy::bounded(3),
//!     &cancel,
//! )
//! .await;
//! if report.changed() {
//!     // re-apply levels that an input change resets
//! }
//! ```
//!
//! [`CommandHandler`]: device_manager::CommandHandler
//! [`FeedbackProvider`]: device_manager::FeedbackProvider
//! [`ConnectionRegistry`]: device_manager::ConnectionRegistry

pub mod config;
pub mod convergence;
pub mod error;
pub mod game_mode;
mod macros;
pub mod orchestrator;
pub mod outcome;
pub mod policy;
mod status;

pub use config::{
    AvrProfile, LightingProfile, MenuKeys, OrchestratorConfig, PolicySet, PowerProfile,
    SettingDefault, SourceDevice, TvProfile,
};
pub use convergence::{
    ensure_device_state, ensure_state, ConvergenceOutcome, ConvergenceReport, Device, StateTarget,
};
pub use error::{OrchestratorError, Result};
pub use orchestrator::{
    switch_input_command, turn_on_command, MacroOrchestrator, OrchestratorFactory, GAME_MODE_OFF,
    GAME_MODE_ON, LIGHTING_SYNC_OFF, LIGHTING_SYNC_ON, TURN_OFF_EVERYTHING,
};
pub use outcome::{handle_command_best_effort, MacroState, MacroTally, StepOutcome};
pub use policy::ConvergencePolicy;
pub use status::{MACRO_STATE, MACRO_STATUS};
