//! Ritual controller implementation.
//!
//! The controller is a wall-clock-based state machine. It does not use
//! internal threads: the caller invokes `tick()` about once a second and,
//! while a seal hold is active, `sample_seal()` at roughly 60 Hz. The async
//! driver in [`super::runner`] does exactly that.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            v
//!      AwaitingSeal -> Sealing -> Sealed
//! ```
//!
//! A seal hold may also begin while still `Running`, once remaining time is
//! inside the active phase's seal duration.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::clock::{Clock, SystemClock};
use super::config::{HapticStyle, NotificationKind, RitualConfig, RitualPhase};
use super::phase::{instruction_at, is_seal_window, phase_at};
use crate::events::RitualEvent;
use crate::platform::{fire_and_forget, Haptics, NoopHaptics, NoopTelemetry, Telemetry};

/// Ritual tick period.
pub const RITUAL_TICK_MS: u64 = 1_000;
/// How long the seal gesture must be held.
pub const SEAL_HOLD_MS: u64 = 1_500;
/// Seal progress sampling period (~60 Hz).
pub const SEAL_SAMPLE_INTERVAL_MS: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RitualState {
    Idle,
    Running,
    Paused,
    /// Timer elapsed; the ritual is not complete until sealed.
    AwaitingSeal,
    /// A seal hold is in progress.
    Sealing,
    Sealed,
}

/// Caller-supplied lifecycle callbacks. All default to no-ops.
pub trait RitualObserver: Send {
    fn on_phase_change(&mut self, _phase: &RitualPhase, _index: usize) {}

    fn on_seal_complete(&mut self) {}

    fn on_complete(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RitualObserver for NoopObserver {}

/// Identifies one seal attempt of one ritual run.
///
/// Samplers hold a ticket; a sample carrying a stale ticket (after a
/// cancel, reset, restart or disposal) is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealTicket {
    generation: u64,
    attempt: u64,
}

/// Serializable view of the controller for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualSnapshot {
    pub ritual: String,
    pub state: RitualState,
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    pub total_seconds: u64,
    pub phase_index: Option<usize>,
    pub phase_title: Option<String>,
    pub instruction: Option<String>,
    pub is_seal_phase: bool,
    pub seal_progress: f64,
    pub is_sealed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cadence {
    interval_ms: u64,
    next_due_ms: Option<u64>,
}

impl Cadence {
    fn arm(&mut self, now_ms: u64, interval_ms: u64) {
        self.interval_ms = interval_ms.max(1);
        self.next_due_ms = Some(now_ms.saturating_add(self.interval_ms));
    }

    fn cancel(&mut self) {
        self.next_due_ms = None;
    }

    /// Number of whole periods that came due by `now_ms`.
    fn poll(&mut self, now_ms: u64) -> u64 {
        let Some(due) = self.next_due_ms else {
            return 0;
        };
        if now_ms < due {
            return 0;
        }
        let periods = (now_ms - due) / self.interval_ms + 1;
        self.next_due_ms = Some(due + periods * self.interval_ms);
        periods
    }
}

#[derive(Debug, Clone, Copy)]
struct SealHold {
    started_at_ms: u64,
    attempt: u64,
}

/// Drives a single ritual instance.
pub struct RitualController {
    config: RitualConfig,
    clock: Arc<dyn Clock>,
    haptics: Arc<dyn Haptics>,
    telemetry: Arc<dyn Telemetry>,
    observer: Box<dyn RitualObserver>,
    /// Timer state. Never `Sealing`; the hold is tracked in `hold`.
    state: RitualState,
    elapsed_ms: u64,
    last_tick_ms: Option<u64>,
    observed_phase: Option<usize>,
    instruction_cursor: usize,
    haptic_cadence: Cadence,
    instruction_cadence: Cadence,
    hold: Option<SealHold>,
    seal_progress: f64,
    seal_attempts: u64,
    seal_window_announced: bool,
    generation: u64,
    disposed: bool,
}

impl fmt::Debug for RitualController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RitualController")
            .field("ritual", &self.config.name)
            .field("state", &self.state())
            .field("elapsed_ms", &self.elapsed_ms)
            .field("observed_phase", &self.observed_phase)
            .field("seal_progress", &self.seal_progress)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl RitualController {
    /// Create an idle controller with no-op collaborators and the system clock.
    pub fn new(config: RitualConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            haptics: Arc::new(NoopHaptics),
            telemetry: Arc::new(NoopTelemetry),
            observer: Box::new(NoopObserver),
            state: RitualState::Idle,
            elapsed_ms: 0,
            last_tick_ms: None,
            observed_phase: None,
            instruction_cursor: 0,
            haptic_cadence: Cadence::default(),
            instruction_cadence: Cadence::default(),
            hold: None,
            seal_progress: 0.0,
            seal_attempts: 0,
            seal_window_announced: false,
            generation: 0,
            disposed: false,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = haptics;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_observer(mut self, observer: impl RitualObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &RitualConfig {
        &self.config
    }

    pub fn state(&self) -> RitualState {
        match self.state {
            RitualState::Running | RitualState::AwaitingSeal if self.hold.is_some() => {
                RitualState::Sealing
            }
            state => state,
        }
    }

    /// Whether the ritual timer itself is advancing.
    pub fn is_timer_running(&self) -> bool {
        self.state == RitualState::Running && !self.disposed
    }

    /// Elapsed seconds including time since the last tick.
    pub fn elapsed_seconds(&self) -> u64 {
        self.live_elapsed_ms() / 1000
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.config
            .total_duration_seconds
            .saturating_sub(self.elapsed_seconds())
    }

    pub fn phase_index(&self) -> Option<usize> {
        self.observed_phase
    }

    pub fn current_phase(&self) -> Option<&RitualPhase> {
        self.observed_phase.and_then(|i| self.config.phases.get(i))
    }

    pub fn instruction(&self) -> Option<&str> {
        self.current_phase()
            .and_then(|p| instruction_at(p, self.instruction_cursor))
    }

    /// Inside the window where the seal gesture is accepted.
    pub fn is_seal_phase(&self) -> bool {
        !self.disposed
            && matches!(self.state, RitualState::Running | RitualState::AwaitingSeal)
            && is_seal_window(&self.config, self.elapsed_seconds())
    }

    pub fn is_sealing(&self) -> bool {
        self.hold.is_some()
    }

    pub fn seal_progress(&self) -> f64 {
        self.seal_progress
    }

    pub fn is_sealed(&self) -> bool {
        self.state == RitualState::Sealed
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Ticket for the seal hold in progress, if any.
    pub fn seal_ticket(&self) -> Option<SealTicket> {
        self.hold.map(|h| SealTicket {
            generation: self.generation,
            attempt: h.attempt,
        })
    }

    pub fn snapshot(&self) -> RitualSnapshot {
        let phase = self.current_phase();
        RitualSnapshot {
            ritual: self.config.name.clone(),
            state: self.state(),
            elapsed_seconds: self.elapsed_seconds(),
            remaining_seconds: self.remaining_seconds(),
            total_seconds: self.config.total_duration_seconds,
            phase_index: self.observed_phase,
            phase_title: phase.map(|p| p.title.clone()),
            instruction: self.instruction().map(str::to_string),
            is_seal_phase: self.is_seal_phase(),
            seal_progress: self.seal_progress,
            is_sealed: self.is_sealed(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start (or restart) the ritual from zero.
    pub fn start(&mut self) -> Vec<RitualEvent> {
        if self.disposed || self.state == RitualState::Running {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        self.clear_run();
        self.state = RitualState::Running;
        self.last_tick_ms = Some(now);

        fire_and_forget("haptic impact", self.haptics.impact(HapticStyle::Medium));
        let data = json!({
            "ritual": self.config.name,
            "total_seconds": self.config.total_duration_seconds,
            "phases": self.config.phases.len(),
        });
        fire_and_forget(
            "telemetry breadcrumb",
            self.telemetry.breadcrumb("Ritual started", "ritual", data.clone()),
        );
        fire_and_forget("telemetry track", self.telemetry.track("ritual_started", data));
        tracing::debug!(ritual = %self.config.name, "ritual started");

        let mut events = vec![RitualEvent::RitualStarted {
            ritual: self.config.name.clone(),
            total_seconds: self.config.total_duration_seconds,
            phase_count: self.config.phases.len(),
            at: Utc::now(),
        }];
        events.extend(self.advance(now));
        events
    }

    pub fn pause(&mut self) -> Vec<RitualEvent> {
        if self.disposed || self.state != RitualState::Running {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        let mut events = self.advance(now);
        if self.state != RitualState::Running {
            // Timer elapsed on this very flush; nothing left to pause.
            return events;
        }
        self.state = RitualState::Paused;
        self.last_tick_ms = None;
        self.cancel_cadences();
        if let Some(event) = self.abandon_hold() {
            events.push(event);
        }
        events.push(RitualEvent::RitualPaused {
            elapsed_seconds: self.elapsed_seconds(),
            at: Utc::now(),
        });
        events
    }

    pub fn resume(&mut self) -> Vec<RitualEvent> {
        if self.disposed || self.state != RitualState::Paused {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        self.state = RitualState::Running;
        self.last_tick_ms = Some(now);
        self.arm_cadences(now);
        vec![RitualEvent::RitualResumed {
            elapsed_seconds: self.elapsed_seconds(),
            at: Utc::now(),
        }]
    }

    /// Back to idle from any state. Cancels every timer.
    pub fn reset(&mut self) -> Vec<RitualEvent> {
        if self.disposed {
            return Vec::new();
        }
        self.clear_run();
        self.state = RitualState::Idle;
        fire_and_forget(
            "telemetry breadcrumb",
            self.telemetry
                .breadcrumb("Ritual reset", "ritual", json!({ "ritual": self.config.name })),
        );
        vec![RitualEvent::RitualReset { at: Utc::now() }]
    }

    /// Tear down. Every later command is a no-op and outstanding seal
    /// tickets are invalidated.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.generation += 1;
        self.hold = None;
        self.last_tick_ms = None;
        self.cancel_cadences();
    }

    /// Ritual tick. Advances elapsed time, phases, cadences.
    pub fn tick(&mut self) -> Vec<RitualEvent> {
        if self.disposed || self.state != RitualState::Running {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        self.advance(now)
    }

    /// Begin the seal hold. Ignored outside the seal window.
    pub fn start_seal(&mut self) -> Vec<RitualEvent> {
        if self.disposed || self.state == RitualState::Sealed || self.hold.is_some() {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        // Catch the timer up first so a gesture racing the final tick sees
        // the same window the tick would.
        let mut events = if self.state == RitualState::Running {
            self.advance(now)
        } else {
            Vec::new()
        };
        if !self.is_seal_phase() {
            tracing::debug!(elapsed = self.elapsed_seconds(), "seal requested outside seal window");
            return events;
        }

        self.seal_attempts += 1;
        self.hold = Some(SealHold {
            started_at_ms: now,
            attempt: self.seal_attempts,
        });
        self.seal_progress = 0.0;
        fire_and_forget("haptic impact", self.haptics.impact(HapticStyle::Light));
        fire_and_forget(
            "telemetry breadcrumb",
            self.telemetry.breadcrumb(
                "Seal started",
                "ritual",
                json!({ "attempt": self.seal_attempts }),
            ),
        );
        events.push(RitualEvent::SealStarted { at: Utc::now() });
        events
    }

    /// Seal sampler tick. Progress is derived from wall-clock time held,
    /// not from the number of samples, so dropped frames do not slow it.
    pub fn sample_seal(&mut self, ticket: SealTicket) -> Vec<RitualEvent> {
        if self.disposed || self.seal_ticket() != Some(ticket) {
            return Vec::new();
        }
        let Some(hold) = self.hold else {
            return Vec::new();
        };
        let held_ms = self.clock.now_ms().saturating_sub(hold.started_at_ms);
        self.seal_progress = (held_ms as f64 / SEAL_HOLD_MS as f64).min(1.0);
        if self.seal_progress >= 1.0 {
            return self.complete_seal();
        }
        Vec::new()
    }

    /// Abandon the hold; the seal window stays open for another attempt.
    pub fn cancel_seal(&mut self) -> Vec<RitualEvent> {
        if self.disposed || self.state == RitualState::Sealed {
            return Vec::new();
        }
        self.abandon_hold().into_iter().collect()
    }

    /// Finalize the ritual. Fires the success haptic and both completion
    /// callbacks exactly once.
    pub fn complete_seal(&mut self) -> Vec<RitualEvent> {
        if self.disposed || self.state == RitualState::Sealed {
            return Vec::new();
        }
        if self.hold.is_none() && !self.is_seal_phase() {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        if self.state == RitualState::Running {
            self.flush_elapsed(now);
        }
        self.state = RitualState::Sealed;
        self.hold = None;
        self.seal_progress = 1.0;
        self.last_tick_ms = None;
        self.cancel_cadences();

        let success = self
            .current_phase()
            .or_else(|| phase_at(&self.config, self.elapsed_seconds()).map(|(_, p)| p))
            .map(|p| p.success_haptic)
            .unwrap_or(NotificationKind::Success);
        fire_and_forget("haptic notification", self.haptics.notification(success));
        self.observer.on_seal_complete();
        self.observer.on_complete();

        let elapsed_seconds = self.elapsed_seconds();
        fire_and_forget(
            "telemetry track",
            self.telemetry.track(
                "ritual_sealed",
                json!({
                    "ritual": self.config.name,
                    "elapsed_seconds": elapsed_seconds,
                    "seal_attempts": self.seal_attempts,
                }),
            ),
        );
        tracing::debug!(ritual = %self.config.name, elapsed_seconds, "ritual sealed");
        vec![RitualEvent::Sealed {
            elapsed_seconds,
            at: Utc::now(),
        }]
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn total_ms(&self) -> u64 {
        self.config.total_duration_seconds.saturating_mul(1000)
    }

    fn live_elapsed_ms(&self) -> u64 {
        match (self.state, self.last_tick_ms) {
            (RitualState::Running, Some(last)) => self
                .elapsed_ms
                .saturating_add(self.clock.now_ms().saturating_sub(last))
                .min(self.total_ms()),
            _ => self.elapsed_ms,
        }
    }

    fn flush_elapsed(&mut self, now_ms: u64) {
        if let Some(last) = self.last_tick_ms {
            let delta = now_ms.saturating_sub(last);
            self.elapsed_ms = self.elapsed_ms.saturating_add(delta).min(self.total_ms());
            self.last_tick_ms = Some(now_ms);
        }
    }

    /// Flush time and run everything that depends on it. Running only.
    fn advance(&mut self, now_ms: u64) -> Vec<RitualEvent> {
        self.flush_elapsed(now_ms);
        let mut events = self.track_phase(now_ms);

        if self.elapsed_ms >= self.total_ms() {
            self.state = RitualState::AwaitingSeal;
            self.last_tick_ms = None;
            self.cancel_cadences();
            fire_and_forget(
                "telemetry breadcrumb",
                self.telemetry.breadcrumb(
                    "Ritual timer elapsed",
                    "ritual",
                    json!({ "ritual": self.config.name }),
                ),
            );
            events.push(RitualEvent::TimerElapsed {
                elapsed_seconds: self.elapsed_seconds(),
                at: Utc::now(),
            });
        } else {
            self.poll_cadences(now_ms);
        }

        if !self.seal_window_announced && self.is_seal_phase() {
            self.seal_window_announced = true;
            events.push(RitualEvent::SealWindowOpened {
                remaining_seconds: self.remaining_seconds(),
                at: Utc::now(),
            });
        }
        events
    }

    /// Detect phase changes. Every phase between the last observed one and
    /// the current one is reported, in order.
    fn track_phase(&mut self, now_ms: u64) -> Vec<RitualEvent> {
        let Some((index, _)) = phase_at(&self.config, self.elapsed_ms / 1000) else {
            return Vec::new();
        };
        let first = match self.observed_phase {
            Some(prev) if prev >= index => return Vec::new(),
            Some(prev) => prev + 1,
            None => 0,
        };

        let mut events = Vec::with_capacity(index + 1 - first);
        for i in first..=index {
            events.push(self.enter_phase(i));
        }
        self.observed_phase = Some(index);
        self.instruction_cursor = 0;
        self.arm_cadences(now_ms);
        events
    }

    fn enter_phase(&mut self, index: usize) -> RitualEvent {
        let phase = &self.config.phases[index];
        fire_and_forget("haptic impact", self.haptics.impact(phase.haptic_style));
        self.observer.on_phase_change(phase, index);
        fire_and_forget(
            "telemetry track",
            self.telemetry.track(
                "ritual_phase_changed",
                json!({ "phase_index": index, "title": phase.title }),
            ),
        );
        RitualEvent::PhaseChanged {
            phase_index: index,
            title: phase.title.clone(),
            at: Utc::now(),
        }
    }

    fn arm_cadences(&mut self, now_ms: u64) {
        let Some(phase) = self.observed_phase.and_then(|i| self.config.phases.get(i)) else {
            self.cancel_cadences();
            return;
        };
        let (haptic_ms, instruction_ms) = (phase.haptic_interval_ms, phase.instruction_interval_ms);
        self.haptic_cadence.arm(now_ms, haptic_ms);
        self.instruction_cadence.arm(now_ms, instruction_ms);
    }

    fn cancel_cadences(&mut self) {
        self.haptic_cadence.cancel();
        self.instruction_cadence.cancel();
    }

    fn poll_cadences(&mut self, now_ms: u64) {
        let Some(style) = self.current_phase().map(|p| p.haptic_style) else {
            return;
        };
        if self.haptic_cadence.poll(now_ms) > 0 {
            fire_and_forget("haptic impact", self.haptics.impact(style));
        }
        let turns = self.instruction_cadence.poll(now_ms);
        self.instruction_cursor = self.instruction_cursor.wrapping_add(turns as usize);
    }

    fn abandon_hold(&mut self) -> Option<RitualEvent> {
        self.hold.take()?;
        let progress = self.seal_progress;
        self.seal_progress = 0.0;
        Some(RitualEvent::SealCancelled {
            progress,
            at: Utc::now(),
        })
    }

    fn clear_run(&mut self) {
        self.generation += 1;
        self.elapsed_ms = 0;
        self.last_tick_ms = None;
        self.observed_phase = None;
        self.instruction_cursor = 0;
        self.hold = None;
        self.seal_progress = 0.0;
        self.seal_attempts = 0;
        self.seal_window_announced = false;
        self.cancel_cadences();
    }
}

impl Drop for RitualController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformResult;
    use crate::ritual::clock::ManualClock;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }

        fn push(&self, s: String) {
            self.calls.lock().unwrap().push(s);
        }
    }

    impl RitualObserver for Recorder {
        fn on_phase_change(&mut self, phase: &RitualPhase, index: usize) {
            self.push(format!("phase:{index}:{}", phase.title));
        }

        fn on_seal_complete(&mut self) {
            self.push("seal_complete".into());
        }

        fn on_complete(&mut self) {
            self.push("complete".into());
        }
    }

    impl Haptics for Recorder {
        fn impact(&self, style: HapticStyle) -> PlatformResult {
            self.push(format!("impact:{style:?}"));
            Ok(())
        }

        fn notification(&self, kind: NotificationKind) -> PlatformResult {
            self.push(format!("notify:{kind:?}"));
            Ok(())
        }
    }

    struct FailingHaptics;

    impl Haptics for FailingHaptics {
        fn impact(&self, _style: HapticStyle) -> PlatformResult {
            Err("no motor".into())
        }

        fn notification(&self, _kind: NotificationKind) -> PlatformResult {
            Err("no motor".into())
        }
    }

    fn three_phase_config() -> RitualConfig {
        RitualConfig {
            name: "three".into(),
            total_duration_seconds: 12,
            phases: vec![
                RitualPhase::new("Breathe", 4).with_instructions(["in", "out"]),
                RitualPhase::new("Focus", 4),
                RitualPhase::new("Seal", 4).with_seal_duration(2),
            ],
        }
    }

    fn controller(config: RitualConfig) -> (RitualController, ManualClock, Recorder, Recorder) {
        let clock = ManualClock::new();
        let observer = Recorder::default();
        let haptics = Recorder::default();
        let c = RitualController::new(config)
            .with_clock(clock.clone())
            .with_observer(observer.clone())
            .with_haptics(Arc::new(haptics.clone()));
        (c, clock, observer, haptics)
    }

    fn run_seconds(c: &mut RitualController, clock: &ManualClock, seconds: u64) -> Vec<RitualEvent> {
        let mut events = Vec::new();
        for _ in 0..seconds {
            clock.advance(RITUAL_TICK_MS);
            events.extend(c.tick());
        }
        events
    }

    fn hold_seal(c: &mut RitualController, clock: &ManualClock, ms: u64) -> Vec<RitualEvent> {
        let mut events = Vec::new();
        let Some(ticket) = c.seal_ticket() else {
            return events;
        };
        for _ in 0..ms / SEAL_SAMPLE_INTERVAL_MS {
            clock.advance(SEAL_SAMPLE_INTERVAL_MS);
            events.extend(c.sample_seal(ticket));
        }
        let rest = ms % SEAL_SAMPLE_INTERVAL_MS;
        if rest > 0 {
            clock.advance(rest);
            events.extend(c.sample_seal(ticket));
        }
        events
    }

    #[test]
    fn start_pause_resume() {
        let (mut c, clock, _, _) = controller(RitualConfig::quick_charge());
        assert_eq!(c.state(), RitualState::Idle);

        assert!(!c.start().is_empty());
        assert_eq!(c.state(), RitualState::Running);
        assert!(c.start().is_empty(), "start while running is a no-op");

        run_seconds(&mut c, &clock, 5);
        assert!(!c.pause().is_empty());
        assert_eq!(c.state(), RitualState::Paused);

        clock.advance(60_000);
        assert_eq!(c.elapsed_seconds(), 5, "paused time does not count");
        assert!(c.tick().is_empty());

        assert!(!c.resume().is_empty());
        assert_eq!(c.state(), RitualState::Running);
        run_seconds(&mut c, &clock, 2);
        assert_eq!(c.elapsed_seconds(), 7);
    }

    #[test]
    fn full_run_visits_each_phase_once() {
        let (mut c, clock, observer, _) = controller(three_phase_config());
        c.start();
        run_seconds(&mut c, &clock, 12);

        assert_eq!(
            observer.calls(),
            vec!["phase:0:Breathe", "phase:1:Focus", "phase:2:Seal"]
        );
        assert_eq!(c.state(), RitualState::AwaitingSeal);
        assert!(c.is_seal_phase());
        assert!(!c.is_sealed(), "timer completion does not finish the ritual");
    }

    #[test]
    fn large_tick_reports_skipped_phases_in_order() {
        let (mut c, clock, observer, _) = controller(three_phase_config());
        c.start();
        clock.advance(9_000);
        let events = c.tick();

        let indices: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                RitualEvent::PhaseChanged { phase_index, .. } => Some(*phase_index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(observer.count("phase:"), 3);
        assert_eq!(c.phase_index(), Some(2));
    }

    #[test]
    fn thirty_second_ritual_seals_after_hold() {
        let config = RitualConfig {
            name: "e2e".into(),
            total_duration_seconds: 30,
            phases: vec![RitualPhase::new("Charge", 30).with_seal_duration(3)],
        };
        let (mut c, clock, observer, haptics) = controller(config);
        c.start();

        run_seconds(&mut c, &clock, 26);
        assert!(!c.is_seal_phase());
        let events = run_seconds(&mut c, &clock, 1);
        assert!(c.is_seal_phase());
        assert!(events
            .iter()
            .any(|e| matches!(e, RitualEvent::SealWindowOpened { remaining_seconds: 3, .. })));

        assert!(!c.start_seal().is_empty());
        assert_eq!(c.state(), RitualState::Sealing);

        hold_seal(&mut c, &clock, 1_499);
        assert!(!c.is_sealed());
        let events = hold_seal(&mut c, &clock, 1);

        assert_eq!(c.seal_progress(), 1.0);
        assert!(c.is_sealed());
        assert!(events.iter().any(|e| matches!(e, RitualEvent::Sealed { .. })));
        assert_eq!(observer.count("complete"), 1);
        assert_eq!(observer.count("seal_complete"), 1);
        assert_eq!(haptics.count("notify:Success"), 1);
        assert!(c.seal_ticket().is_none(), "sampler is released after completion");
    }

    #[test]
    fn cancel_then_restart_requires_full_hold() {
        let (mut c, clock, observer, _) = controller(RitualConfig::quick_charge());
        c.start();
        run_seconds(&mut c, &clock, 30);
        assert_eq!(c.state(), RitualState::AwaitingSeal);

        c.start_seal();
        hold_seal(&mut c, &clock, 1_000);
        assert!(c.seal_progress() > 0.6);

        let stale = c.seal_ticket().unwrap();
        assert!(!c.cancel_seal().is_empty());
        assert_eq!(c.seal_progress(), 0.0);
        assert_eq!(c.state(), RitualState::AwaitingSeal);
        assert!(c.is_seal_phase(), "cancel returns to the seal window");

        c.start_seal();
        clock.advance(1_000);
        assert!(c.sample_seal(stale).is_empty(), "stale ticket is ignored");
        hold_seal(&mut c, &clock, 0);
        let ticket = c.seal_ticket().unwrap();
        c.sample_seal(ticket);
        assert!(!c.is_sealed());
        assert!(c.seal_progress() < 1.0);

        hold_seal(&mut c, &clock, 500);
        assert!(c.is_sealed());
        assert_eq!(observer.count("complete"), 1);
    }

    #[test]
    fn seal_outside_window_is_ignored() {
        let (mut c, clock, _, _) = controller(RitualConfig::quick_charge());
        assert!(c.start_seal().is_empty(), "idle");
        c.start();
        run_seconds(&mut c, &clock, 10);
        assert!(c.start_seal().is_empty());
        assert!(!c.is_sealing());
        assert!(c.complete_seal().is_empty());
        assert!(!c.is_sealed());
    }

    #[test]
    fn seal_request_racing_the_final_tick() {
        let (mut c, clock, _, _) = controller(RitualConfig::quick_charge());
        c.start();
        run_seconds(&mut c, &clock, 29);
        // The 30th second elapses but the gesture lands before the tick.
        clock.advance(RITUAL_TICK_MS);
        let events = c.start_seal();
        assert!(events.iter().any(|e| matches!(e, RitualEvent::TimerElapsed { .. })));
        assert!(events.iter().any(|e| matches!(e, RitualEvent::SealStarted { .. })));
        assert!(c.tick().is_empty());
        assert_eq!(c.state(), RitualState::Sealing);
    }

    #[test]
    fn double_completion_fires_once() {
        let (mut c, clock, observer, _) = controller(RitualConfig::quick_charge());
        c.start();
        run_seconds(&mut c, &clock, 30);
        assert!(!c.complete_seal().is_empty());
        assert!(c.complete_seal().is_empty());
        assert!(c.start_seal().is_empty());
        assert_eq!(observer.count("complete"), 1);
        assert_eq!(observer.count("seal_complete"), 1);
    }

    #[test]
    fn reset_invalidates_seal_in_progress() {
        let (mut c, clock, observer, _) = controller(RitualConfig::quick_charge());
        c.start();
        run_seconds(&mut c, &clock, 28);
        c.start_seal();
        let ticket = c.seal_ticket().unwrap();

        c.reset();
        assert_eq!(c.state(), RitualState::Idle);
        assert_eq!(c.elapsed_seconds(), 0);
        clock.advance(5_000);
        assert!(c.sample_seal(ticket).is_empty());
        assert_eq!(observer.count("complete"), 0);

        // Idempotent.
        c.reset();
        assert_eq!(c.snapshot().state, RitualState::Idle);
        assert_eq!(c.phase_index(), None);
    }

    #[test]
    fn pause_abandons_hold_and_stops_cadence() {
        let config = RitualConfig {
            name: "cadence".into(),
            total_duration_seconds: 20,
            phases: vec![RitualPhase::new("Only", 20)
                .with_haptics(HapticStyle::Heavy, 2_000)
                .with_seal_duration(20)],
        };
        let (mut c, clock, _, haptics) = controller(config);
        c.start();
        run_seconds(&mut c, &clock, 4);
        assert_eq!(haptics.count("impact:Heavy"), 3, "phase entry plus two cadence pulses");

        c.start_seal();
        let events = c.pause();
        assert!(events.iter().any(|e| matches!(e, RitualEvent::SealCancelled { .. })));
        assert!(!c.is_sealing());

        let before = haptics.count("impact:Heavy");
        clock.advance(30_000);
        c.tick();
        assert_eq!(haptics.count("impact:Heavy"), before);
        assert!(!c.is_seal_phase(), "no seal while paused");
    }

    #[test]
    fn instructions_rotate_and_reset_on_phase_change() {
        let config = RitualConfig {
            name: "rotate".into(),
            total_duration_seconds: 20,
            phases: vec![
                RitualPhase::new("First", 10)
                    .with_instructions(["a", "b", "c"])
                    .with_instruction_interval(2_000),
                RitualPhase::new("Second", 10).with_instructions(["x", "y"]),
            ],
        };
        let (mut c, clock, _, _) = controller(config);
        c.start();
        assert_eq!(c.instruction(), Some("a"));
        run_seconds(&mut c, &clock, 2);
        assert_eq!(c.instruction(), Some("b"));
        run_seconds(&mut c, &clock, 4);
        assert_eq!(c.instruction(), Some("a"), "wraps around");
        run_seconds(&mut c, &clock, 4);
        assert_eq!(c.phase_index(), Some(1));
        assert_eq!(c.instruction(), Some("x"));
    }

    #[test]
    fn failing_haptics_do_not_block() {
        let clock = ManualClock::new();
        let mut c = RitualController::new(RitualConfig::quick_charge())
            .with_clock(clock.clone())
            .with_haptics(Arc::new(FailingHaptics));
        c.start();
        run_seconds(&mut c, &clock, 30);
        c.start_seal();
        hold_seal(&mut c, &clock, SEAL_HOLD_MS);
        assert!(c.is_sealed());
    }

    #[test]
    fn disposed_controller_ignores_commands() {
        let (mut c, clock, observer, _) = controller(RitualConfig::quick_charge());
        c.start();
        run_seconds(&mut c, &clock, 28);
        c.start_seal();
        let ticket = c.seal_ticket().unwrap();
        c.dispose();

        clock.advance(2_000);
        assert!(c.sample_seal(ticket).is_empty());
        assert!(c.start().is_empty());
        assert!(c.reset().is_empty());
        assert_eq!(observer.count("complete"), 0);
    }

    #[test]
    fn restart_after_seal_begins_fresh() {
        let (mut c, clock, observer, _) = controller(RitualConfig::quick_charge());
        c.start();
        run_seconds(&mut c, &clock, 30);
        c.complete_seal();
        assert!(c.is_sealed());

        c.start();
        assert_eq!(c.state(), RitualState::Running);
        assert_eq!(c.seal_progress(), 0.0);
        assert_eq!(c.elapsed_seconds(), 0);
        assert_eq!(observer.count("phase:0"), 2);
    }
}
