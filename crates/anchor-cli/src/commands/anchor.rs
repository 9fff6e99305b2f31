use chrono::Utc;
use clap::Subcommand;

use anchor_core::storage::Database;
use anchor_core::{Anchor, AnchorCategory};

#[derive(Subcommand)]
pub enum AnchorAction {
    /// Create a new anchor
    Create {
        /// Intention text
        intention: String,
        /// Category (career, health, wealth, relationships, personal_growth, custom)
        #[arg(long, default_value = "custom")]
        category: String,
    },
    /// List anchors
    List {
        /// Include released and archived anchors
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one anchor as JSON
    Show { id: String },
    /// Release an anchor (terminal)
    Release { id: String },
    /// Archive an anchor
    Archive { id: String },
}

pub fn run(action: AnchorAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    let mut store = db.load_anchors()?;

    match action {
        AnchorAction::Create {
            intention,
            category,
        } => {
            let anchor = Anchor::new(intention, AnchorCategory::from_label(&category), Utc::now());
            let id = anchor.id.clone();
            store.upsert(anchor);
            db.save_anchors(&store)?;
            println!("{id}");
        }
        AnchorAction::List { all, json } => {
            let anchors: Vec<&Anchor> = store
                .anchors()
                .iter()
                .filter(|a| all || a.is_active())
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&anchors)?);
            } else if anchors.is_empty() {
                println!("no anchors");
            } else {
                for a in anchors {
                    let charge = if a.is_charged { "charged" } else { "-" };
                    println!(
                        "{}  [{}] {:>3}x {:<8} {}",
                        a.id,
                        a.category.label(),
                        a.activation_count,
                        charge,
                        a.intention_text
                    );
                }
            }
        }
        AnchorAction::Show { id } => {
            let anchor = store
                .get(&id)
                .ok_or_else(|| format!("anchor not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(anchor)?);
        }
        AnchorAction::Release { id } => {
            store.release(&id, Utc::now())?;
            db.save_anchors(&store)?;
            println!("released {id}");
        }
        AnchorAction::Archive { id } => {
            store.archive(&id, Utc::now())?;
            db.save_anchors(&store)?;
            println!("archived {id}");
        }
    }
    Ok(())
}
