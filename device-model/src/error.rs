//! Error types for the device model

use crate::value::ValueKind;

/// Errors raised while building registries or feedback snapshots
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// A command with this id is already registered
    #[error("Duplicate command id: {0}")]
    DuplicateCommand(String),

    /// A feedback with this id is already registered
    #[error("Duplicate feedback id: {0}")]
    DuplicateFeedback(String),

    /// No command with this id is registered
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// No feedback with this id is registered
    #[error("Feedback not found: {0}")]
    FeedbackNotFound(String),

    /// The value does not match the feedback's declared kind
    #[error("Feedback {feedback} expects a {expected:?} value, got {actual:?}")]
    KindMismatch {
        feedback: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// The value lies outside a ranged feedback's bounds
    #[error("Value {value} for feedback {feedback} is outside [{low}, {high}]")]
    OutOfRange {
        feedback: String,
        value: f64,
        low: f64,
        high: f64,
    },

    /// A ranged feedback was declared with low above high
    #[error("Invalid range for feedback {feedback}: low {low} is above high {high}")]
    InvalidRange { feedback: String, low: f64, high: f64 },
}

/// Result type for device model operations
pub type Result<T> = std::result::Result<T, ModelError>;
