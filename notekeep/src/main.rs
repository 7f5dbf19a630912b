// notekeep - reminder and attachment daemon for a local notes store
// Entry point and command dispatch

use anyhow::Context;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use notekeep::app::AppState;
use notekeep::services::ChannelNotifier;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "notekeep")]
#[command(about = "Reminder scheduling and attachment housekeeping for notekeep")]
struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reschedule reminders and serve alarms until interrupted
    Run,
    /// Delete media files no item references
    Sweep {
        /// Only files at least this old are deleted
        #[arg(long)]
        min_age_hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notekeep=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => ProjectDirs::from("", "", "notekeep")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .context("No data directory available; pass --data-dir")?,
    };

    tracing::info!("Starting notekeep");

    let (notifier, mut notifications) = ChannelNotifier::new();
    let state = AppState::initialize(&data_dir, Arc::new(notifier)).await?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let report = state.boot.run().await?;
            tracing::info!(
                "Ready: {} trigger(s) pending, {} orphaned grant(s) released",
                report.triggers_registered,
                report.grants_released
            );

            loop {
                tokio::select! {
                    Some(payload) = notifications.recv() => {
                        println!(
                            "[reminder] {} - {} (open item {})",
                            payload.title,
                            payload.body,
                            payload.navigation_target()
                        );
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted, shutting down");
                        break;
                    }
                }
            }
        }
        Commands::Sweep { min_age_hours } => {
            let hours = min_age_hours
                .or(state.settings.attachments.sweep_min_age_hours)
                .context("Sweep needs --min-age-hours or attachments.sweep_min_age_hours")?;

            let records = state.items.list_all().await?;
            let swept = state
                .items
                .attachments()
                .sweep_unreferenced(&records, Duration::from_secs(hours.saturating_mul(3600)))
                .await?;
            println!("Swept {} unreferenced media file(s)", swept);
        }
    }

    state.shutdown().await?;
    Ok(())
}
