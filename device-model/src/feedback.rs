//! Observable device state channels

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::value::{Value, ValueKind};

/// Bounds of a host-settable numeric feedback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRange {
    pub low: f64,
    pub high: f64,
    pub decimals: u8,
}

impl FeedbackRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Round a value to the range's number of decimals
    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(i32::from(self.decimals));
        (value * scale).round() / scale
    }
}

/// One observable state channel of a device
///
/// A feedback with a range is host-settable: the host may push a value back
/// through the manager rather than only observe it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    id: String,
    kind: ValueKind,
    range: Option<FeedbackRange>,
}

impl Feedback {
    pub fn new(id: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            id: id.into(),
            kind,
            range: None,
        }
    }

    pub fn bool(id: impl Into<String>) -> Self {
        Self::new(id, ValueKind::Bool)
    }

    pub fn double(id: impl Into<String>) -> Self {
        Self::new(id, ValueKind::Double)
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self::new(id, ValueKind::String)
    }

    /// A numeric feedback the host may set, bounded to `[low, high]`
    pub fn settable_ranged(id: impl Into<String>, low: f64, high: f64, decimals: u8) -> Self {
        Self {
            id: id.into(),
            kind: ValueKind::Double,
            range: Some(FeedbackRange {
                low,
                high,
                decimals,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn range(&self) -> Option<&FeedbackRange> {
        self.range.as_ref()
    }

    pub fn is_settable(&self) -> bool {
        self.range.is_some()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self.range {
            Some(range) if range.low > range.high => Err(ModelError::InvalidRange {
                feedback: self.id.clone(),
                low: range.low,
                high: range.high,
            }),
            _ => Ok(()),
        }
    }
}

/// An immutable snapshot of a feedback and its observed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackValue {
    feedback: Feedback,
    value: Value,
}

impl FeedbackValue {
    /// Pair a feedback with a value, checking kind and range
    ///
    /// Ranged values are rounded to the declared number of decimals.
    pub fn new(feedback: Feedback, value: Value) -> Result<Self> {
        if value.kind() != feedback.kind() {
            return Err(ModelError::KindMismatch {
                feedback: feedback.id.clone(),
                expected: feedback.kind(),
                actual: value.kind(),
            });
        }

        let value = match (feedback.range, value) {
            (Some(range), Value::Double(d)) => {
                if !range.contains(d) {
                    return Err(ModelError::OutOfRange {
                        feedback: feedback.id.clone(),
                        value: d,
                        low: range.low,
                        high: range.high,
                    });
                }
                Value::Double(range.round(d))
            }
            (_, value) => value,
        };

        Ok(Self { feedback, value })
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn id(&self) -> &str {
        self.feedback.id()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}
