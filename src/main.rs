//! Starlog Engine - Branching-narrative engine for starship adventure episodes
//!
//! The binary boots the engine stack and runs the content check:
//! - Opens the save database and the content library
//! - Scans the library, reporting every rejected file with its reasons
//! - Lints the loaded content for cross-reference problems (dangling
//!   scenes, unknown modules, ambiguous campaign branches)
//!
//! Front-ends embed the library crate directly; this check is what keeps
//! broken episodes from shipping to them.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use starlog_engine::infrastructure::config::AppConfig;
use starlog_engine::infrastructure::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "starlog_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Starlog Engine");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Content: {}", config.content_dir.display());
    tracing::info!("  Database: {}", config.database_url);

    // Initialize application state
    let state = AppState::new(config).await?;
    tracing::info!("Application state initialized");

    // Per-file scan: files the source refused to load at all.
    let scan = state.content_source.scan().await?;
    for rejected in &scan.rejected {
        tracing::warn!(path = %rejected.path.display(), "rejected content file");
        for reason in &rejected.reasons {
            tracing::warn!("  - {reason}");
        }
    }

    // Cross-reference lint over everything that loaded.
    let report = state.content.lint_all().await?;
    tracing::info!(
        "Library: {} episode(s), {} campaign(s)",
        report.episodes,
        report.campaigns
    );
    for finding in &report.findings {
        tracing::warn!(subject = %finding.subject, "content lint finding");
        for reason in &finding.reasons {
            tracing::warn!("  - {reason}");
        }
    }

    if scan.rejected.is_empty() && report.is_clean() {
        tracing::info!("Content library is clean");
    } else {
        tracing::warn!("Content issues found; fix them before shipping");
    }

    Ok(())
}
