//! narwatch - headless front end for the live case feed
//!
//! Subcommands:
//! - `watch`: follow the live stream and log the most recent cases
//! - `submit`: submit one narrative and print the initial record
//! - `case`: fetch and print one case
//! - `share`: request a signed sharing package for a case

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use narwatch_common::config::{ConfigOverrides, DashboardConfig};
use narwatch_common::intake::SharingRequest;
use narwatch_common::risk::format_score;
use narwatch_common::{IntakeMetadata, IntakePayload, RiskLevel};
use narwatch_live::notice::Tone;
use narwatch_live::{ApiClient, CaseBackend, Dashboard};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "narwatch", version, about = "Live narrative detection case feed")]
struct Cli {
    /// TOML config file (default: ~/.config/narwatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base address, e.g. http://localhost:8000
    #[arg(long, global = true)]
    api_base_url: Option<String>,

    /// Delay before reconnecting a dropped stream, in milliseconds
    #[arg(long, global = true)]
    reconnect_delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the live feed until Ctrl-C
    Watch {
        /// Number of recent cases to show on each change
        #[arg(long, default_value_t = 6)]
        limit: usize,
    },
    /// Submit a narrative
    Submit {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(long, default_value = "")]
        source: String,
        /// Comma-separated analyst tags
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long, default_value = "")]
        platform: String,
        #[arg(long)]
        region: String,
        #[arg(long, default_value = "")]
        actor_id: String,
    },
    /// Fetch one case
    Case { intake_id: String },
    /// Request a sharing package for a case
    Share {
        intake_id: String,
        #[arg(long)]
        destination: String,
        #[arg(long = "policy-tag")]
        policy_tags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        config_path: cli.config.clone(),
        api_base_url: cli.api_base_url.clone(),
        reconnect_delay_ms: cli.reconnect_delay_ms,
    };
    let config = DashboardConfig::resolve(&overrides).context("Failed to resolve configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "Starting narwatch v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match cli.command {
        Command::Watch { limit } => watch(&config, limit).await,
        Command::Submit {
            text,
            language,
            source,
            tags,
            platform,
            region,
            actor_id,
        } => {
            let payload = IntakePayload::new(text)
                .with_language(&language)
                .with_source(&source)
                .with_tags(IntakePayload::parse_tags(&tags))
                .with_metadata(
                    IntakeMetadata::for_region(&region)
                        .with_platform(&platform)
                        .with_actor_id(&actor_id),
                );
            payload.validate()?;

            let api = ApiClient::from_config(&config)?;
            let record = api.submit_intake(&payload).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Case { intake_id } => {
            let api = ApiClient::from_config(&config)?;
            let record = api.fetch_case(&intake_id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Share {
            intake_id,
            destination,
            policy_tags,
        } => {
            let api = ApiClient::from_config(&config)?;
            let request = SharingRequest {
                intake_id,
                destination,
                payload: Default::default(),
                policy_tags,
            };
            let package = api.request_sharing_package(&request).await?;
            println!("{}", serde_json::to_string_pretty(&package)?);
            Ok(())
        }
    }
}

async fn watch(config: &DashboardConfig, limit: usize) -> Result<()> {
    let dashboard = Dashboard::connect(config)?;
    let mut revisions = dashboard.subscribe();
    let mut notices = dashboard.notices().subscribe();
    dashboard.start();
    info!("Watching live feed (Ctrl-C to stop)");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                log_cases(&dashboard, limit).await;
            }
            notice = notices.recv() => match notice {
                Ok(notice) if notice.tone == Tone::Error => warn!("{}", notice.message),
                Ok(notice) => info!("{}", notice.message),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} notices", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    dashboard.shutdown().await;
    Ok(())
}

async fn log_cases(dashboard: &Dashboard, limit: usize) {
    let metrics = dashboard.metrics().await;
    info!(
        total = metrics.total,
        high_risk = metrics.high_risk,
        average = %format!("{}%", metrics.average_percent),
        state = ?dashboard.connection_state(),
        "Cases updated"
    );

    for case in dashboard.recent(limit).await {
        info!(
            intake_id = %case.case_id,
            classification = %case.classification.as_deref().unwrap_or("Processing"),
            score = %format_score(case.composite_score),
            risk = %RiskLevel::of(&case),
            "  case"
        );
    }
}
