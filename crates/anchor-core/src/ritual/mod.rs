mod clock;
mod config;
mod controller;
pub mod phase;
mod runner;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::{HapticStyle, NotificationKind, RitualConfig, RitualPhase};
pub use controller::{
    NoopObserver, RitualController, RitualObserver, RitualSnapshot, RitualState, SealTicket,
    RITUAL_TICK_MS, SEAL_HOLD_MS, SEAL_SAMPLE_INTERVAL_MS,
};
pub use runner::{RitualCommand, RitualRunner, EVENT_BUFFER};
