use std::io::Write;
use std::sync::Arc;

use clap::Subcommand;

use anchor_core::platform::PlatformResult;
use anchor_core::ritual::{HapticStyle, NotificationKind, RitualCommand, TokioClock};
use anchor_core::storage::Database;
use anchor_core::{
    Config, Haptics, RitualConfig, RitualController, RitualEvent, RitualRunner, SessionType,
    TracingTelemetry, ValidationError,
};

use super::streak::{print_streak, record_session};

#[derive(Subcommand)]
pub enum RitualAction {
    /// Run a charging ritual for an anchor and seal it
    Run {
        /// Anchor ID to charge
        anchor_id: String,
        /// Preset name (quick_charge, deep_charge, custom); defaults to config
        #[arg(long)]
        preset: Option<String>,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// List built-in presets
    Presets,
}

/// Terminal bell standing in for a vibration motor.
struct TerminalBell;

impl Haptics for TerminalBell {
    fn impact(&self, _style: HapticStyle) -> PlatformResult {
        let mut err = std::io::stderr();
        err.write_all(b"\x07")?;
        err.flush()?;
        Ok(())
    }

    fn notification(&self, _kind: NotificationKind) -> PlatformResult {
        let mut err = std::io::stderr();
        err.write_all(b"\x07\x07")?;
        err.flush()?;
        Ok(())
    }
}

pub async fn run(action: RitualAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RitualAction::Run {
            anchor_id,
            preset,
            json,
        } => run_ritual(&anchor_id, preset.as_deref(), json).await,
        RitualAction::Presets => {
            for config in [RitualConfig::quick_charge(), RitualConfig::deep_charge()] {
                let titles: Vec<&str> = config.phases.iter().map(|p| p.title.as_str()).collect();
                println!(
                    "{:<12} {:>4}s  {}",
                    config.name,
                    config.total_duration_seconds,
                    titles.join(" > ")
                );
            }
            Ok(())
        }
    }
}

async fn run_ritual(
    anchor_id: &str,
    preset: Option<&str>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let ritual = config.ritual.resolve(preset)?;

    let mut db = Database::open()?;
    let mut store = db.load_anchors()?;
    let anchor = store
        .get(anchor_id)
        .ok_or_else(|| ValidationError::AnchorNotFound(anchor_id.to_string()))?;
    if anchor.is_released {
        return Err(ValidationError::AnchorReleased(anchor_id.to_string()).into());
    }
    if !json {
        println!("Charging: {}", anchor.intention_text);
    }

    let mut controller = RitualController::new(ritual)
        .with_clock(TokioClock::new())
        .with_telemetry(Arc::new(TracingTelemetry));
    if config.ritual.haptics_enabled {
        controller = controller.with_haptics(Arc::new(TerminalBell));
    }

    let mut runner = RitualRunner::spawn(controller);
    let mut snapshots = runner.subscribe();
    let mut last_instruction: Option<String> = None;
    runner.send(RitualCommand::Start);

    loop {
        tokio::select! {
            event = runner.next_event() => {
                let Some(event) = event else {
                    return Err("ritual ended before it was sealed".into());
                };
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    render_event(&event);
                }
                match event {
                    // The terminal has no press-and-hold; hold as soon as allowed.
                    RitualEvent::SealWindowOpened { .. } | RitualEvent::TimerElapsed { .. } => {
                        runner.send(RitualCommand::StartSeal);
                    }
                    RitualEvent::Sealed { .. } => break,
                    _ => {}
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Err("ritual ended before it was sealed".into());
                }
                let instruction = snapshots.borrow_and_update().instruction.clone();
                if instruction != last_instruction {
                    if let (false, Some(text)) = (json, instruction.as_deref()) {
                        println!("   {text}");
                    }
                    last_instruction = instruction;
                }
            }
        }
    }
    runner.shutdown().await;

    store.record_activation(anchor_id, chrono::Utc::now())?;
    db.save_anchors(&store)?;
    let streak = record_session(&db, anchor_id, SessionType::Activate).await?;
    print_streak(&streak, json)?;
    Ok(())
}

fn render_event(event: &RitualEvent) {
    match event {
        RitualEvent::RitualStarted {
            ritual,
            total_seconds,
            ..
        } => println!("Started {ritual} ({total_seconds}s)"),
        RitualEvent::PhaseChanged { title, .. } => println!("== {title}"),
        RitualEvent::SealWindowOpened { .. } => println!("Hold to seal..."),
        RitualEvent::SealCancelled { .. } => println!("Seal released early"),
        RitualEvent::Sealed { elapsed_seconds, .. } => {
            println!("Sealed after {elapsed_seconds}s")
        }
        _ => {}
    }
}
