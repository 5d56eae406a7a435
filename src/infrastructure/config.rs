//! Application configuration

use std::env;
use std::path::PathBuf;

use anyhow::Result;

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding `episodes/` and `campaigns/` JSON content
    pub content_dir: PathBuf,
    /// SQLite connection string for save-game storage
    pub database_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            content_dir: env::var("CONTENT_DIR")
                .unwrap_or_else(|_| "./content".to_string())
                .into(),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://starlog.db?mode=rwc".to_string()),
        })
    }
}
