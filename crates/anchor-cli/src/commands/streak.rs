use chrono::Local;
use clap::Subcommand;

use anchor_core::storage::Database;
use anchor_core::{refresh_streak, SessionLogEntry, SessionType, StreakSnapshot};

#[derive(Subcommand)]
pub enum StreakAction {
    /// Show the current practice streak
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a completed session without running a ritual
    Record {
        /// Anchor ID the session belongs to
        anchor_id: String,
        /// Session type (activate, stabilize, reinforce)
        #[arg(long = "type", default_value = "activate")]
        session_type: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the session log
    Log {
        /// Only sessions for this anchor
        #[arg(long)]
        anchor: Option<String>,
    },
}

pub async fn run(action: StreakAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        StreakAction::Show { json } => {
            let log = db.load_session_log()?;
            let streak = refresh_streak(&log, &db, &Local::now()).await;
            print_streak(&streak, json)?;
        }
        StreakAction::Record {
            anchor_id,
            session_type,
            json,
        } => {
            let session_type = SessionType::parse(&session_type)
                .ok_or_else(|| format!("unknown session type: {session_type}"))?;
            let streak = record_session(&db, &anchor_id, session_type).await?;
            print_streak(&streak, json)?;
        }
        StreakAction::Log { anchor } => {
            let log = db.load_session_log()?;
            for entry in log
                .entries()
                .iter()
                .filter(|e| anchor.as_deref().map_or(true, |id| e.anchor_id == id))
            {
                println!("{}", serde_json::to_string(entry)?);
            }
        }
    }
    Ok(())
}

/// Append a session stamped with the local offset, then refresh the streak.
pub async fn record_session(
    db: &Database,
    anchor_id: &str,
    session_type: SessionType,
) -> Result<StreakSnapshot, Box<dyn std::error::Error>> {
    let now = Local::now();
    db.append_session(&SessionLogEntry::new(anchor_id, session_type, now.fixed_offset()))?;
    let log = db.load_session_log()?;
    Ok(refresh_streak(&log, db, &now).await)
}

pub fn print_streak(streak: &StreakSnapshot, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(streak)?);
        return Ok(());
    }
    println!(
        "Streak: {} day(s) (longest {})",
        streak.current_streak, streak.longest_streak
    );
    if let Some(day) = streak.grace_day_used {
        println!("Grace day used: {day}");
    }
    Ok(())
}
