use clap::{Parser, Subcommand};
use time::{macros::offset, Date, OffsetDateTime};
use tokio::sync::watch;

mod app;
mod batch;
mod config;
mod errors;
mod feed;
mod meals;
mod normalize;
mod state;

use crate::batch::{run_batch, BatchOptions};
use crate::meals::repo_types::MealSlot;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "schoolmeal", about = "School meal feed ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the on-demand HTTP API.
    Serve,
    /// Ingest one day for every school in the roster.
    Batch {
        /// YYYY-MM-DD; defaults to today in KST.
        #[arg(long, value_parser = meals::parse_date)]
        date: Option<Date>,
        #[arg(long, default_value = "lunch")]
        slot: MealSlot,
        /// Re-query the feed even when a row is already stored.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "schoolmeal=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let (app_state, db) = AppState::init().await?;

    // Run migrations if present
    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
    }

    match cli.command {
        Command::Serve => app::serve(app::build_app(app_state)).await,
        Command::Batch { date, slot, force } => {
            let opts = BatchOptions {
                date: date.unwrap_or_else(|| OffsetDateTime::now_utc().to_offset(offset!(+9)).date()),
                slot,
                force_refresh: force,
                pause: app_state.config.ingest.batch_pause(),
            };

            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received; stopping after current school");
                    let _ = tx.send(true);
                }
            });

            let summary = run_batch(&app_state.coordinator, &opts, rx).await?;
            if summary.failed > 0 {
                anyhow::bail!("{} of {} schools failed to persist", summary.failed, summary.total);
            }
            Ok(())
        }
    }
}
