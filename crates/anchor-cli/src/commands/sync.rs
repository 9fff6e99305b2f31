use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Deserialize;
use serde_json::Value;

use anchor_core::storage::Database;
use anchor_core::{AnchorApi, Config, FixtureAnchorApi, HttpAnchorApi, SyncOutcome, SyncReconciler};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Pull remote anchors and merge them into the local collection
    Anchors {
        /// Serve responses from a JSON fixture file instead of the API
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
    /// Refresh the user profile
    Profile {
        /// Serve responses from a JSON fixture file instead of the API
        #[arg(long)]
        fixture: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show when anchors were last synced
    Status,
}

/// Fixture file layout: `{"anchors": [...], "user": {...}, "stats": {...}}`.
#[derive(Deserialize, Default)]
struct FixtureFile {
    #[serde(default)]
    anchors: Vec<Value>,
    #[serde(default)]
    user: Value,
    #[serde(default)]
    stats: Value,
}

fn load_fixture(path: &Path) -> Result<FixtureAnchorApi, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let file: FixtureFile = serde_json::from_str(&content)?;
    Ok(FixtureAnchorApi::new()
        .with_anchors(file.anchors)
        .with_user(file.user)
        .with_stats(file.stats))
}

pub async fn run(action: SyncAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    match action {
        SyncAction::Anchors { fixture } => match fixture {
            Some(path) => sync_anchors(load_fixture(&path)?, &config).await,
            None => sync_anchors(HttpAnchorApi::from_config(&config.sync)?, &config).await,
        },
        SyncAction::Profile { fixture, json } => match fixture {
            Some(path) => sync_profile(load_fixture(&path)?, &config, json).await,
            None => sync_profile(HttpAnchorApi::from_config(&config.sync)?, &config, json).await,
        },
        SyncAction::Status => {
            let db = Database::open()?;
            let store = db.load_anchors()?;
            match store.last_synced_at() {
                Some(at) => println!("last synced: {}", at.to_rfc3339()),
                None => println!("never synced"),
            }
            println!("anchors: {}", store.anchors().len());
            Ok(())
        }
    }
}

async fn sync_anchors<A: AnchorApi>(
    api: A,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    let store = db.load_anchors()?.shared();
    let reconciler = SyncReconciler::new(api, store.clone()).with_config(&config.sync);

    match reconciler.sync_anchors().await? {
        SyncOutcome::Synced {
            total,
            remote,
            skipped,
            ..
        } => {
            let snapshot = store
                .lock()
                .map_err(|_| "anchor store poisoned")?
                .clone();
            db.save_anchors(&snapshot)?;
            println!("synced: {remote} remote, {skipped} skipped, {total} total");
        }
        SyncOutcome::Superseded => println!("superseded by a newer sync"),
    }
    Ok(())
}

async fn sync_profile<A: AnchorApi>(
    api: A,
    config: &Config,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = anchor_core::AnchorStore::new().shared();
    let reconciler = SyncReconciler::new(api, store).with_config(&config.sync);
    let profile = reconciler.sync_user_profile().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }
    let name = if profile.user.display_name.is_empty() {
        profile.user.id.as_str()
    } else {
        profile.user.display_name.as_str()
    };
    println!("{name}");
    println!(
        "anchors: {}  charged: {}  activations: {}",
        profile.stats.total_anchors, profile.stats.charged_anchors, profile.stats.total_activations
    );
    println!("stabilize streak: {}", profile.stats.stabilize_streak);
    for preview in &profile.active_anchors {
        println!(
            "  {} [{}] {}x",
            preview.id,
            preview.category.label(),
            preview.activation_count
        );
    }
    Ok(())
}
