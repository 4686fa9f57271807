//! Host-visible macro progress

use device_adapter::EventSink;
use device_model::{Feedback, FeedbackValue, Value};

use crate::outcome::MacroState;

pub const MACRO_STATE: &str = "MacroState";
pub const MACRO_STATUS: &str = "MacroStatus";

/// Raises the `MacroState` and `MacroStatus` feedback of the orchestrator
pub(crate) struct StatusReporter {
    sink: EventSink,
    state: Feedback,
    status: Feedback,
}

impl StatusReporter {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            state: Feedback::text(MACRO_STATE),
            status: Feedback::text(MACRO_STATUS),
        }
    }

    pub fn feedbacks(&self) -> [Feedback; 2] {
        [self.state.clone(), self.status.clone()]
    }

    pub fn state(&self, state: MacroState) {
        self.raise(&self.state, Value::from(state.as_str()));
    }

    pub fn status(&self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            tracing::debug!("Macro status: {}", text);
        }
        self.raise(&self.status, Value::Text(text));
    }

    fn raise(&self, feedback: &Feedback, value: Value) {
        match FeedbackValue::new(feedback.clone(), value) {
            Ok(value) => self.sink.raise_feedback(value),
            Err(e) => tracing::warn!("Dropping macro feedback: {}", e),
        }
    }
}
