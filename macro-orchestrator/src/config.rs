//! Orchestrator configuration
//!
//! Which devices play which role, the command and feedback ids each role is
//! driven through, and the timing and convergence bounds for macros.

use std::collections::HashSet;
use std::time::Duration;

use device_manager::config::serde_millis;
use device_model::{DeviceKey, Value};
use serde::{Deserialize, Serialize};

use crate::convergence::StateTarget;
use crate::error::{OrchestratorError, Result};
use crate::policy::ConvergencePolicy;

/// Power control of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerProfile {
    pub feedback: String,
    pub on: String,
    pub off: String,
    pub query: String,
}

impl Default for PowerProfile {
    fn default() -> Self {
        Self {
            feedback: "Power".to_string(),
            on: "PowerOn".to_string(),
            off: "PowerOff".to_string(),
            query: "PowerQuery".to_string(),
        }
    }
}

impl PowerProfile {
    pub fn turned_on(&self) -> StateTarget {
        StateTarget::new(&self.feedback, true, &self.query, &self.on)
    }
}

/// Command and feedback ids of the AVR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvrProfile {
    /// Main zone power
    pub power: PowerProfile,
    pub input_feedback: String,
    pub input_query: String,
}

impl Default for AvrProfile {
    fn default() -> Self {
        Self {
            power: PowerProfile {
                feedback: "Zone1Power".to_string(),
                on: "Zone1PowerOn".to_string(),
                off: "Zone1PowerOff".to_string(),
                query: "Zone1PowerQuery".to_string(),
            },
            input_feedback: "Input".to_string(),
            input_query: "InputQuery".to_string(),
        }
    }
}

/// Remote-control keys used to navigate the TV's on-screen menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuKeys {
    pub menu: String,
    pub down: String,
    pub left: String,
    pub right: String,
    pub enter: String,
    pub back: String,
}

impl Default for MenuKeys {
    fn default() -> Self {
        Self {
            menu: "KeyMenu".to_string(),
            down: "KeyDown".to_string(),
            left: "KeyLeft".to_string(),
            right: "KeyRight".to_string(),
            enter: "KeyEnter".to_string(),
            back: "KeyBack".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TvProfile {
    pub power: PowerProfile,
    pub keys: MenuKeys,
}

/// Command ids of the ambient-lighting sync box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingProfile {
    pub sync_on: String,
    pub sync_off: String,
    pub power_off: String,
}

impl Default for LightingProfile {
    fn default() -> Self {
        Self {
            sync_on: "SyncOn".to_string(),
            sync_off: "SyncOff".to_string(),
            power_off: "PowerOff".to_string(),
        }
    }
}

/// A playback device wired to one AVR input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDevice {
    pub key: DeviceKey,
    /// Label used in the macro command ids, e.g. `TurnOn.<name>`
    pub name: String,
    /// Value of the AVR input feedback when this source is selected
    pub avr_input: String,
    /// AVR command that moves the input toward this source
    pub input_command: String,
    #[serde(default)]
    pub power: PowerProfile,
    /// Lighting command applied after the source is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting_mode: Option<String>,
}

impl SourceDevice {
    pub fn new(
        key: impl Into<DeviceKey>,
        avr_input: impl Into<String>,
        input_command: impl Into<String>,
    ) -> Self {
        let key = key.into();
        Self {
            name: key.to_string(),
            key,
            avr_input: avr_input.into(),
            input_command: input_command.into(),
            power: PowerProfile::default(),
            lighting_mode: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_power(mut self, power: PowerProfile) -> Self {
        self.power = power;
        self
    }

    pub fn with_lighting_mode(mut self, command: impl Into<String>) -> Self {
        self.lighting_mode = Some(command.into());
        self
    }
}

/// An AVR setting restored whenever the AVR is powered on or switches input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDefault {
    pub feedback: String,
    pub desired: Value,
    pub query: String,
    pub change: String,
}

impl SettingDefault {
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

    pub fn target(&self) -> StateTarget {
        StateTarget::new(&self.feedback, self.desired.clone(), &self.query, &self.change)
    }
}

/// Convergence bounds per kind of state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySet {
    pub power: ConvergencePolicy,
    pub input: ConvergencePolicy,
    pub settings: ConvergencePolicy,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            power: ConvergencePolicy::power(),
            input: ConvergencePolicy::input(),
            settings: ConvergencePolicy::settings(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub avr: DeviceKey,
    pub tv: DeviceKey,
    pub lighting: Option<DeviceKey>,

    pub avr_profile: AvrProfile,
    pub tv_profile: TvProfile,
    pub lighting_profile: LightingProfile,

    pub sources: Vec<SourceDevice>,

    /// Dialog enhancer, subwoofer and dynamic volume levels
    pub avr_defaults: Vec<SettingDefault>,

    /// Delay between menu keystrokes when toggling game mode
    /// Default: 400 ms
    #[serde(rename = "game_mode_key_delay_ms", with = "serde_millis")]
    pub game_mode_key_delay: Duration,

    /// Absolute bound on one macro run
    /// Default: 120 seconds
    #[serde(rename = "macro_timeout_ms", with = "serde_millis")]
    pub macro_timeout: Duration,

    pub policies: PolicySet,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            avr: DeviceKey::new("Avr"),
            tv: DeviceKey::new("Tv"),
            lighting: None,
            avr_profile: AvrProfile::default(),
            tv_profile: TvProfile::default(),
            lighting_profile: LightingProfile::default(),
            sources: Vec::new(),
            avr_defaults: vec![
                SettingDefault::new("DialogEnhancer", "OFF", "DialogEnhancerQuery", "DialogEnhancerOff"),
                SettingDefault::new("SubwooferLevel", 0.0, "SubwooferLevelQuery", "SubwooferLevelStep"),
                SettingDefault::new("DynamicVolume", "OFF", "DynamicVolumeQuery", "DynamicVolumeOff"),
            ],
            game_mode_key_delay: Duration::from_millis(400),
            macro_timeout: Duration::from_secs(120),
            policies: PolicySet::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new(avr: impl Into<DeviceKey>, tv: impl Into<DeviceKey>) -> Self {
        Self {
            avr: avr.into(),
            tv: tv.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.avr.as_str().is_empty() || self.tv.as_str().is_empty() {
            return Err(OrchestratorError::Configuration(
                "AVR and TV device keys must not be empty".to_string(),
            ));
        }

        if self.macro_timeout.is_zero() {
            return Err(OrchestratorError::Configuration(
                "Macro timeout must be greater than 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.is_empty() || source.name.contains('.') {
                return Err(OrchestratorError::Configuration(format!(
                    "Invalid source name '{}'",
                    source.name
                )));
            }
            if !names.insert(source.name.as_str()) {
                return Err(OrchestratorError::Configuration(format!(
                    "Duplicate source name '{}'",
                    source.name
                )));
            }
            if source.key == self.avr || source.key == self.tv {
                return Err(OrchestratorError::Configuration(format!(
                    "Source '{}' cannot be the AVR or TV",
                    source.name
                )));
            }
        }

        Ok(())
    }

    pub fn source(&self, name: &str) -> Option<&SourceDevice> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Every device key a macro may address
    pub fn device_keys(&self) -> Vec<&DeviceKey> {
        let mut keys = vec![&self.avr, &self.tv];
        keys.extend(self.lighting.iter());
        keys.extend(self.sources.iter().map(|s| &s.key));
        keys
    }

    pub fn with_source(mut self, source: SourceDevice) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_lighting(mut self, key: impl Into<DeviceKey>) -> Self {
        self.lighting = Some(key.into());
        self
    }

    pub fn with_avr_defaults(mut self, defaults: Vec<SettingDefault>) -> Self {
        self.avr_defaults = defaults;
        self
    }

    pub fn with_game_mode_key_delay(mut self, delay: Duration) -> Self {
        self.game_mode_key_delay = delay;
        self
    }

    pub fn with_macro_timeout(mut self, timeout: Duration) -> Self {
        self.macro_timeout = timeout;
        self
    }

    pub fn with_policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }
}
