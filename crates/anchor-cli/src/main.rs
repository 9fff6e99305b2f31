use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use anchor_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "anchor-cli", version, about = "Anchor practice CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anchor management
    Anchor {
        #[command(subcommand)]
        action: commands::anchor::AnchorAction,
    },
    /// Charging rituals
    Ritual {
        #[command(subcommand)]
        action: commands::ritual::RitualAction,
    },
    /// Practice streaks and the session log
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Sync with the remote anchor API
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr so command output stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("ANCHOR_LOG").unwrap_or_else(|_| {
        let level = Config::load().map(|c| c.log_level).unwrap_or_else(|_| "info".into());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Anchor { action } => commands::anchor::run(action),
        Commands::Ritual { action } => commands::ritual::run(action).await,
        Commands::Streak { action } => commands::streak::run(action).await,
        Commands::Sync { action } => commands::sync::run(action).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
