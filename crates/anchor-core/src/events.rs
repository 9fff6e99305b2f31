use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every ritual state change produces an event.
/// Callers render from snapshots and react to events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RitualEvent {
    RitualStarted {
        ritual: String,
        total_seconds: u64,
        phase_count: usize,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        phase_index: usize,
        title: String,
        at: DateTime<Utc>,
    },
    /// The seal gesture became available.
    SealWindowOpened {
        remaining_seconds: u64,
        at: DateTime<Utc>,
    },
    /// Timer reached the total duration. The ritual still needs a seal.
    TimerElapsed {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    RitualPaused {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    RitualResumed {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    SealStarted {
        at: DateTime<Utc>,
    },
    SealCancelled {
        progress: f64,
        at: DateTime<Utc>,
    },
    Sealed {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    RitualReset {
        at: DateTime<Utc>,
    },
}

impl RitualEvent {
    /// Short snake_case name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            RitualEvent::RitualStarted { .. } => "ritual_started",
            RitualEvent::PhaseChanged { .. } => "phase_changed",
            RitualEvent::SealWindowOpened { .. } => "seal_window_opened",
            RitualEvent::TimerElapsed { .. } => "timer_elapsed",
            RitualEvent::RitualPaused { .. } => "ritual_paused",
            RitualEvent::RitualResumed { .. } => "ritual_resumed",
            RitualEvent::SealStarted { .. } => "seal_started",
            RitualEvent::SealCancelled { .. } => "seal_cancelled",
            RitualEvent::Sealed { .. } => "sealed",
            RitualEvent::RitualReset { .. } => "ritual_reset",
        }
    }
}
