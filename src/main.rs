//! AutoTrack Worker - maintenance scheduling and reminder backend
//!
//! This worker connects to NATS and handles messages from the app and the
//! periodic reminder job.

mod cli;
mod config;
mod defaults;
mod db;
mod handlers;
mod services;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::{Config, DataSource};
use crate::db::{MaintenanceRepository, MemoryRepository, PgRepository};
use crate::handlers::reminders::TriggerContext;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "worker.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,autotrack_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => migrate(&config).await,
        Command::Trigger { timeout_ms } => trigger(&config, timeout_ms).await,
    }
}

async fn connect_nats(config: &Config) -> Result<async_nats::Client> {
    // Supports optional NATS_USER/NATS_PASSWORD auth
    let client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);
    Ok(client)
}

async fn open_repository(config: &Config) -> Result<Arc<dyn MaintenanceRepository>> {
    match &config.data_source {
        DataSource::Postgres { database_url } => {
            let pool = db::create_pool(database_url).await?;
            info!("Connected to PostgreSQL");

            db::run_migrations(&pool).await?;

            Ok(Arc::new(PgRepository::new(pool)))
        }
        DataSource::Memory => {
            info!("Using seeded in-memory storage");
            Ok(Arc::new(MemoryRepository::seeded()))
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting AutoTrack Worker...");

    let repo = open_repository(&config).await?;
    let nats_client = connect_nats(&config).await?;

    let shutdown = CancellationToken::new();
    let trigger = Arc::new(TriggerContext::from_config(&config, repo.clone(), shutdown.clone()));

    // Start message handlers
    let handler_result = tokio::select! {
        result = handlers::start_handlers(nats_client, repo, trigger) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested, letting in-flight reminders finish");
            shutdown.cancel();
            Ok(())
        }
    };

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

async fn migrate(config: &Config) -> Result<()> {
    match &config.data_source {
        DataSource::Postgres { database_url } => {
            let pool = db::create_pool(database_url).await?;
            db::run_migrations(&pool).await
        }
        DataSource::Memory => {
            info!("DATA_SOURCE=memory, nothing to migrate");
            Ok(())
        }
    }
}

async fn trigger(config: &Config, timeout_ms: Option<u64>) -> Result<()> {
    let Some(secret) = config.reminder_cron_secret.as_deref() else {
        anyhow::bail!("REMINDER_CRON_SECRET must be set to trigger reminders");
    };
    let timeout = Duration::from_millis(timeout_ms.unwrap_or(config.trigger_timeout_ms));

    let client = connect_nats(config).await?;
    let report = handlers::reminders::request_run(&client, secret, timeout).await?;

    info!(
        processed = report.processed_vehicles,
        sent = report.sent_count,
        skipped = report.skipped_count,
        errors = report.error_count,
        mileage_sent = report.mileage_sent_count,
        mileage_skipped = report.mileage_skipped_count,
        mileage_errors = report.mileage_error_count,
        cancelled = report.cancelled,
        "Reminder run complete"
    );
    for sent in &report.sent {
        info!(schedule_id = %sent.schedule_id, to = %sent.email, delivery_id = %sent.message_id, "Sent");
    }
    for sent in &report.mileage_sent {
        info!(vehicle_id = %sent.vehicle_id, to = %sent.email, delivery_id = %sent.message_id, "Sent mileage nudge");
    }
    for failed in &report.errors {
        error!(schedule_id = %failed.schedule_id, to = %failed.email, "Failed: {}", failed.error);
    }
    for failed in &report.mileage_errors {
        error!(vehicle_id = %failed.vehicle_id, to = %failed.email, "Mileage nudge failed: {}", failed.error);
    }

    Ok(())
}
