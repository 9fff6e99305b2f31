use serde::{Deserialize, Serialize};

use super::phase::phase_window;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HapticStyle {
    Light,
    #[default]
    Medium,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualPhase {
    pub title: String,
    /// Length of this phase's window in seconds.
    pub duration_seconds: u64,
    /// Cycled while the phase is active.
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub haptic_style: HapticStyle,
    #[serde(default = "default_haptic_interval_ms")]
    pub haptic_interval_ms: u64,
    #[serde(default = "default_instruction_interval_ms")]
    pub instruction_interval_ms: u64,
    /// The seal window opens once remaining time drops to this many seconds.
    #[serde(default = "default_seal_duration_seconds")]
    pub seal_duration_seconds: u64,
    #[serde(default)]
    pub success_haptic: NotificationKind,
}

fn default_haptic_interval_ms() -> u64 {
    5_000
}
fn default_instruction_interval_ms() -> u64 {
    6_000
}
fn default_seal_duration_seconds() -> u64 {
    3
}

impl RitualPhase {
    pub fn new(title: impl Into<String>, duration_seconds: u64) -> Self {
        Self {
            title: title.into(),
            duration_seconds,
            instructions: Vec::new(),
            haptic_style: HapticStyle::default(),
            haptic_interval_ms: default_haptic_interval_ms(),
            instruction_interval_ms: default_instruction_interval_ms(),
            seal_duration_seconds: default_seal_duration_seconds(),
            success_haptic: NotificationKind::default(),
        }
    }

    pub fn with_instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions = instructions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_haptics(mut self, style: HapticStyle, interval_ms: u64) -> Self {
        self.haptic_style = style;
        self.haptic_interval_ms = interval_ms;
        self
    }

    pub fn with_instruction_interval(mut self, interval_ms: u64) -> Self {
        self.instruction_interval_ms = interval_ms;
        self
    }

    pub fn with_seal_duration(mut self, seconds: u64) -> Self {
        self.seal_duration_seconds = seconds;
        self
    }
}

/// Immutable description of one ritual instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualConfig {
    #[serde(default)]
    pub name: String,
    pub total_duration_seconds: u64,
    pub phases: Vec<RitualPhase>,
}

impl RitualConfig {
    /// The 30-second single-phase charge.
    pub fn quick_charge() -> Self {
        Self {
            name: "quick_charge".into(),
            total_duration_seconds: 30,
            phases: vec![RitualPhase::new("Charge", 30)
                .with_instructions([
                    "Hold your anchor in view",
                    "Breathe in slowly",
                    "Feel the intention settle",
                ])
                .with_haptics(HapticStyle::Medium, 5_000)
                .with_instruction_interval(5_000)
                .with_seal_duration(3)],
        }
    }

    /// The five-minute guided charge.
    pub fn deep_charge() -> Self {
        Self {
            name: "deep_charge".into(),
            total_duration_seconds: 300,
            phases: vec![
                RitualPhase::new("Settle", 60)
                    .with_instructions([
                        "Find a comfortable position",
                        "Let your shoulders drop",
                        "Breathe in for four, out for six",
                    ])
                    .with_haptics(HapticStyle::Light, 10_000)
                    .with_instruction_interval(10_000),
                RitualPhase::new("Visualize", 120)
                    .with_instructions([
                        "Trace the lines of your sigil",
                        "Picture the intention already true",
                        "Notice how it feels in your body",
                    ])
                    .with_haptics(HapticStyle::Medium, 8_000)
                    .with_instruction_interval(12_000),
                RitualPhase::new("Embody", 90)
                    .with_instructions([
                        "Let the image fill your attention",
                        "Repeat your intention silently",
                    ])
                    .with_haptics(HapticStyle::Heavy, 6_000)
                    .with_instruction_interval(15_000),
                RitualPhase::new("Seal", 30)
                    .with_instructions(["Press and hold to seal"])
                    .with_haptics(HapticStyle::Heavy, 4_000)
                    .with_instruction_interval(30_000)
                    .with_seal_duration(10),
            ],
        }
    }

    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "quick_charge" | "quick" => Some(Self::quick_charge()),
            "deep_charge" | "deep" => Some(Self::deep_charge()),
            _ => None,
        }
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Check that the config can drive a ritual.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.phases.is_empty() {
            return Err(ValidationError::EmptyCollection("ritual phases".into()));
        }
        if self.total_duration_seconds == 0 {
            return Err(invalid("total_duration_seconds", "must be greater than zero"));
        }
        for (i, phase) in self.phases.iter().enumerate() {
            if phase.duration_seconds == 0 {
                return Err(invalid(
                    &format!("phases[{i}].duration_seconds"),
                    "must be greater than zero",
                ));
            }
            if phase.haptic_interval_ms == 0 {
                return Err(invalid(
                    &format!("phases[{i}].haptic_interval_ms"),
                    "must be greater than zero",
                ));
            }
            if phase.instruction_interval_ms == 0 {
                return Err(invalid(
                    &format!("phases[{i}].instruction_interval_ms"),
                    "must be greater than zero",
                ));
            }
            // Elapsed time stops at the total, so a later phase would never run.
            let starts_in_time = phase_window(self, i)
                .is_some_and(|window| window.start < self.total_duration_seconds);
            if !starts_in_time {
                return Err(invalid(
                    &format!("phases[{i}]"),
                    "starts at or after total_duration_seconds",
                ));
            }
        }
        Ok(())
    }
}

impl Default for RitualConfig {
    fn default() -> Self {
        Self::quick_charge()
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
