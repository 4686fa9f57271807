//! Controllable device actions

use serde::{Deserialize, Serialize};

/// Whether a command is a host control, a status code, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CommandKind {
    Control,
    Status,
    #[default]
    Both,
}

impl CommandKind {
    /// True if the host should render this command as a control
    pub fn is_control(&self) -> bool {
        matches!(self, CommandKind::Control | CommandKind::Both)
    }

    /// True if the host should use this command as a status code
    pub fn is_status(&self) -> bool {
        matches!(self, CommandKind::Status | CommandKind::Both)
    }
}

/// One controllable action of a device
///
/// Commands are registered once when an adapter is constructed and never
/// mutated afterwards. `id` is the dispatch key and the host-visible label;
/// `payload` is an opaque protocol string the adapter interprets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    id: String,
    payload: Option<String>,
    kind: CommandKind,
    fixed_status_value: Option<i32>,
}

impl Command {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: None,
            kind: CommandKind::default(),
            fixed_status_value: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    /// Pin the numeric status code the host uses for this command
    pub fn with_fixed_status_value(mut self, value: i32) -> Self {
        self.fixed_status_value = Some(value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn fixed_status_value(&self) -> Option<i32> {
        self.fixed_status_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let command = Command::new("InputGame")
            .with_payload("SIGAME")
            .with_kind(CommandKind::Control)
            .with_fixed_status_value(7);

        assert_eq!(command.id(), "InputGame");
        assert_eq!(command.payload(), Some("SIGAME"));
        assert_eq!(command.kind(), CommandKind::Control);
        assert_eq!(command.fixed_status_value(), Some(7));
    }

    #[test]
    fn test_defaults() {
        let command = Command::new("Off");
        assert_eq!(command.payload(), None);
        assert_eq!(command.kind(), CommandKind::Both);
        assert!(command.kind().is_control());
        assert!(command.kind().is_status());
        assert!(!CommandKind::Control.is_status());
    }
}
