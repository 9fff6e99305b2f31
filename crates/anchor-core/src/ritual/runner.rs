//! Async host for a [`RitualController`].
//!
//! One tokio task owns the controller and multiplexes user commands, the
//! 1 s ritual tick and the ~16 ms seal sampler with `select!`. Nothing else
//! touches the controller, so every mutation between two awaits is atomic
//! from the caller's point of view. Dropping the runner closes the command
//! channel, which disposes the controller and ends the task.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::controller::{RitualController, RitualSnapshot, RITUAL_TICK_MS, SEAL_SAMPLE_INTERVAL_MS};
use crate::events::RitualEvent;

/// Events buffered for a caller that is not reading them. Further events
/// are dropped until the caller drains the queue; snapshots keep flowing.
pub const EVENT_BUFFER: usize = 64;

/// User-facing commands accepted by a running ritual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RitualCommand {
    Start,
    Pause,
    Resume,
    Reset,
    StartSeal,
    CancelSeal,
}

pub struct RitualRunner {
    commands: mpsc::UnboundedSender<RitualCommand>,
    events: mpsc::Receiver<RitualEvent>,
    snapshots: watch::Receiver<RitualSnapshot>,
    task: JoinHandle<()>,
}

impl RitualRunner {
    /// Move the controller onto its own task. Must be called inside a
    /// tokio runtime.
    pub fn spawn(controller: RitualController) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let task = tokio::spawn(drive(controller, command_rx, event_tx, snapshot_tx));
        Self {
            commands: command_tx,
            events: event_rx,
            snapshots: snapshot_rx,
            task,
        }
    }

    /// Queue a command. Returns false if the ritual task has ended.
    pub fn send(&self, command: RitualCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> RitualSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch handle for rendering loops.
    pub fn subscribe(&self) -> watch::Receiver<RitualSnapshot> {
        self.snapshots.clone()
    }

    /// Next event, or `None` once the task has ended.
    ///
    /// Only the first [`EVENT_BUFFER`] undrained events are kept. Callers
    /// that render from [`subscribe`](Self::subscribe) alone may ignore them.
    pub async fn next_event(&mut self) -> Option<RitualEvent> {
        self.events.recv().await
    }

    /// Wait until the ritual is sealed. Returns `None` if the task ends first.
    pub async fn sealed(&mut self) -> Option<RitualSnapshot> {
        let mut rx = self.snapshots.clone();
        let sealed = rx.wait_for(|s| s.is_sealed).await.map(|s| s.clone()).ok();
        sealed
    }

    /// Dispose the controller and wait for the task to finish.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::debug!("ritual task ended abnormally: {e}");
        }
    }
}

async fn drive(
    mut controller: RitualController,
    mut commands: mpsc::UnboundedReceiver<RitualCommand>,
    events: mpsc::Sender<RitualEvent>,
    snapshots: watch::Sender<RitualSnapshot>,
) {
    let mut ritual_tick = interval(Duration::from_millis(RITUAL_TICK_MS));
    ritual_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seal_tick = interval(Duration::from_millis(SEAL_SAMPLE_INTERVAL_MS));
    seal_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let ticking = controller.is_timer_running();
        let ticket = controller.seal_ticket();

        let produced = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    let produced = apply(&mut controller, command);
                    if matches!(command, RitualCommand::Start | RitualCommand::Resume) {
                        ritual_tick.reset();
                    }
                    if command == RitualCommand::StartSeal {
                        seal_tick.reset();
                    }
                    produced
                }
                None => {
                    controller.dispose();
                    break;
                }
            },
            _ = ritual_tick.tick(), if ticking => controller.tick(),
            _ = seal_tick.tick(), if ticket.is_some() => match ticket {
                Some(ticket) => controller.sample_seal(ticket),
                None => Vec::new(),
            },
        };

        for event in produced {
            if let Err(e) = events.try_send(event) {
                tracing::debug!("ritual event dropped: {e}");
            }
        }
        snapshots.send_replace(controller.snapshot());
    }
    snapshots.send_replace(controller.snapshot());
}

fn apply(controller: &mut RitualController, command: RitualCommand) -> Vec<RitualEvent> {
    match command {
        RitualCommand::Start => controller.start(),
        RitualCommand::Pause => controller.pause(),
        RitualCommand::Resume => controller.resume(),
        RitualCommand::Reset => controller.reset(),
        RitualCommand::StartSeal => controller.start_seal(),
        RitualCommand::CancelSeal => controller.cancel_seal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ritual::clock::TokioClock;
    use crate::ritual::config::{RitualConfig, RitualPhase};
    use crate::ritual::controller::{RitualObserver, RitualState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Completions(Arc<AtomicUsize>);

    impl RitualObserver for Completions {
        fn on_complete(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn short_ritual() -> RitualConfig {
        RitualConfig {
            name: "short".into(),
            total_duration_seconds: 3,
            phases: vec![RitualPhase::new("Only", 3).with_seal_duration(1)],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_seal_window_and_seals() {
        let completions = Completions::default();
        let controller = RitualController::new(short_ritual())
            .with_clock(TokioClock::new())
            .with_observer(completions.clone());
        let mut runner = RitualRunner::spawn(controller);
        assert!(runner.send(RitualCommand::Start));

        let mut rx = runner.subscribe();
        let snap = rx.wait_for(|s| s.is_seal_phase).await.unwrap().clone();
        assert!(snap.elapsed_seconds >= 2);
        assert_eq!(snap.phase_index, Some(0));

        runner.send(RitualCommand::StartSeal);
        let sealed = tokio::time::timeout(Duration::from_secs(10), runner.sealed())
            .await
            .expect("seal should complete")
            .expect("task alive");
        assert_eq!(sealed.state, RitualState::Sealed);
        assert_eq!(sealed.seal_progress, 1.0);
        assert_eq!(completions.0.load(Ordering::SeqCst), 1);

        runner.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_elapsed_time() {
        let controller = RitualController::new(RitualConfig::quick_charge()).with_clock(TokioClock::new());
        let runner = RitualRunner::spawn(controller);
        runner.send(RitualCommand::Start);
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        runner.send(RitualCommand::Pause);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let paused = runner.snapshot();
        assert_eq!(paused.state, RitualState::Paused);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runner.snapshot().elapsed_seconds, paused.elapsed_seconds);
        runner.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reset_mid_seal_never_completes() {
        let completions = Completions::default();
        let controller = RitualController::new(short_ritual())
            .with_clock(TokioClock::new())
            .with_observer(completions.clone());
        let mut runner = RitualRunner::spawn(controller);
        runner.send(RitualCommand::Start);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        runner.send(RitualCommand::StartSeal);
        tokio::time::sleep(Duration::from_millis(500)).await;
        runner.send(RitualCommand::Reset);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(runner.snapshot().state, RitualState::Idle);
        assert_eq!(completions.0.load(Ordering::SeqCst), 0);
        let mut saw_reset = false;
        while let Ok(event) = runner.events.try_recv() {
            saw_reset |= matches!(event, RitualEvent::RitualReset { .. });
            assert!(!matches!(event, RitualEvent::Sealed { .. }));
        }
        assert!(saw_reset);
        runner.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unread_events_are_capped() {
        let controller = RitualController::new(RitualConfig::quick_charge()).with_clock(TokioClock::new());
        let mut runner = RitualRunner::spawn(controller);
        runner.send(RitualCommand::Start);
        for _ in 0..EVENT_BUFFER {
            runner.send(RitualCommand::Pause);
            runner.send(RitualCommand::Resume);
        }
        runner.send(RitualCommand::Reset);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runner.snapshot().state, RitualState::Idle);

        let mut queued = 0;
        while runner.events.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, EVENT_BUFFER);
        runner.shutdown().await;
    }
}
