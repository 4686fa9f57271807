//! Per-adapter command and feedback registries
//!
//! Registration order is preserved because hosts lay out their UI in that
//! order. Ids are unique within one registry.

use std::collections::{HashMap, HashSet};

use crate::command::Command;
use crate::error::{ModelError, Result};
use crate::feedback::{Feedback, FeedbackValue};
use crate::value::Value;

/// The command and feedback surface of one device adapter
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    commands: Vec<Command>,
    command_index: HashMap<String, usize>,
    feedbacks: Vec<Feedback>,
    feedback_index: HashMap<String, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, failing if its id is already taken
    pub fn command(&mut self, command: Command) -> Result<&mut Self> {
        if self.command_index.contains_key(command.id()) {
            return Err(ModelError::DuplicateCommand(command.id().to_string()));
        }
        self.command_index
            .insert(command.id().to_string(), self.commands.len());
        self.commands.push(command);
        Ok(self)
    }

    /// Register a feedback, failing if its id is already taken
    pub fn feedback(&mut self, feedback: Feedback) -> Result<&mut Self> {
        feedback.validate()?;
        if self.feedback_index.contains_key(feedback.id()) {
            return Err(ModelError::DuplicateFeedback(feedback.id().to_string()));
        }
        self.feedback_index
            .insert(feedback.id().to_string(), self.feedbacks.len());
        self.feedbacks.push(feedback);
        Ok(self)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn feedbacks(&self) -> &[Feedback] {
        &self.feedbacks
    }

    pub fn get_command(&self, id: &str) -> Option<&Command> {
        self.command_index.get(id).map(|&i| &self.commands[i])
    }

    pub fn get_feedback(&self, id: &str) -> Option<&Feedback> {
        self.feedback_index.get(id).map(|&i| &self.feedbacks[i])
    }

    /// Build a validated snapshot for a registered feedback
    pub fn feedback_value(&self, id: &str, value: Value) -> Result<FeedbackValue> {
        let feedback = self
            .get_feedback(id)
            .ok_or_else(|| ModelError::FeedbackNotFound(id.to_string()))?;
        FeedbackValue::new(feedback.clone(), value)
    }

    /// Numeric status codes the host uses for every command, in registration order
    ///
    /// Pinned values are used as-is. Other commands are numbered sequentially
    /// from 0, skipping numbers pinned anywhere in the registry.
    pub fn status_values(&self) -> Vec<(&str, i32)> {
        let pinned: HashSet<i32> = self
            .commands
            .iter()
            .filter_map(Command::fixed_status_value)
            .collect();

        let mut next = 0;
        self.commands
            .iter()
            .map(|command| match command.fixed_status_value() {
                Some(fixed) => (command.id(), fixed),
                None => {
                    while pinned.contains(&next) {
                        next += 1;
                    }
                    let assigned = next;
                    next += 1;
                    (command.id(), assigned)
                }
            })
            .collect()
    }

    pub fn status_value(&self, id: &str) -> Option<i32> {
        self.status_values()
            .into_iter()
            .find(|(command_id, _)| *command_id == id)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.feedbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueKind;

    fn avr_registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry
            .command(Command::new("PowerOn").with_fixed_status_value(1))
            .unwrap()
            .command(Command::new("PowerOff").with_fixed_status_value(2))
            .unwrap()
            .command(Command::new("InputMediaPlayer"))
            .unwrap()
            .command(Command::new("InputGame"))
            .unwrap()
            .command(Command::new("InputTv"))
            .unwrap()
            .feedback(Feedback::bool("Power"))
            .unwrap()
            .feedback(Feedback::text("Input"))
            .unwrap()
            .feedback(Feedback::settable_ranged("Volume", 0.0, 98.0, 1))
            .unwrap();
        registry
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let registry = avr_registry();
        let ids: Vec<_> = registry.commands().iter().map(Command::id).collect();
        assert_eq!(
            ids,
            vec!["PowerOn", "PowerOff", "InputMediaPlayer", "InputGame", "InputTv"]
        );
        let feedback_ids: Vec<_> = registry.feedbacks().iter().map(Feedback::id).collect();
        assert_eq!(feedback_ids, vec!["Power", "Input", "Volume"]);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut registry = avr_registry();
        assert_eq!(
            registry.command(Command::new("PowerOn")).unwrap_err(),
            ModelError::DuplicateCommand("PowerOn".to_string())
        );
        assert_eq!(
            registry.feedback(Feedback::double("Power")).unwrap_err(),
            ModelError::DuplicateFeedback("Power".to_string())
        );
    }

    #[test]
    fn test_lookup() {
        let registry = avr_registry();
        assert_eq!(registry.get_command("InputGame").unwrap().id(), "InputGame");
        assert!(registry.get_command("Eject").is_none());
        assert_eq!(
            registry.get_feedback("Input").unwrap().kind(),
            ValueKind::String
        );
    }

    #[test]
    fn test_status_values_skip_pinned_numbers() {
        let registry = avr_registry();
        assert_eq!(
            registry.status_values(),
            vec![
                ("PowerOn", 1),
                ("PowerOff", 2),
                ("InputMediaPlayer", 0),
                ("InputGame", 3),
                ("InputTv", 4),
            ]
        );
        assert_eq!(registry.status_value("InputTv"), Some(4));
        assert_eq!(registry.status_value("Eject"), None);
    }

    #[test]
    fn test_feedback_value_lookup() {
        let registry = avr_registry();
        let fv = registry.feedback_value("Input", Value::from("MPLAY")).unwrap();
        assert_eq!(fv.value().as_str(), Some("MPLAY"));

        assert_eq!(
            registry
                .feedback_value("Missing", Value::Bool(true))
                .unwrap_err(),
            ModelError::FeedbackNotFound("Missing".to_string())
        );
    }
}
