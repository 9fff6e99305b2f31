//! # Anchor Core Library
//!
//! This library provides the practice session engine behind the Anchor app:
//! charging rituals, consistency streaks, and reconciliation of the local
//! anchor collection with the remote API. The `anchor-cli` binary is a thin
//! front end over the same core.
//!
//! ## Architecture
//!
//! - **Ritual**: A wall-clock-based state machine ([`RitualController`])
//!   driven by the caller's ticks, plus an async [`RitualRunner`] that hosts
//!   it on a tokio task
//! - **Streak**: Pure streak calculations with a grace day per run
//! - **Sync**: Last-write-wins merge of local and remote anchors
//! - **Storage**: SQLite session log and anchor snapshot, TOML configuration
//!
//! ## Key Components
//!
//! - [`RitualController`]: Ritual timer and seal gesture
//! - [`compute_streak`]: Log-derived practice streak
//! - [`SyncReconciler`]: Remote anchor reconciliation
//! - [`Database`]: Session log and anchor persistence
//! - [`Config`]: Application configuration management

pub mod anchor;
pub mod error;
pub mod events;
pub mod platform;
pub mod ritual;
pub mod session;
pub mod storage;
pub mod streak;
pub mod sync;

pub use anchor::{Anchor, AnchorCategory, AnchorStore, SharedAnchorStore};
pub use error::{ConfigError, CoreError, DatabaseError, SyncError, ValidationError};
pub use events::RitualEvent;
pub use platform::{Haptics, NoopHaptics, NoopTelemetry, Telemetry, TracingTelemetry};
pub use ritual::{
    RitualConfig, RitualController, RitualObserver, RitualPhase, RitualRunner, RitualSnapshot,
    RitualState,
};
pub use session::{SessionLog, SessionLogEntry, SessionType};
pub use storage::{Config, Database, KeyValueStore, MemoryKvStore};
pub use streak::{compute_streak, effective_stabilize_streak, refresh_streak, StreakSnapshot};
pub use sync::{AnchorApi, FixtureAnchorApi, HttpAnchorApi, SyncOutcome, SyncReconciler, UserProfile};
