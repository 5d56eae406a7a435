//! Shared application state

use std::sync::Arc;

use anyhow::Result;

use crate::application::ports::outbound::PersistencePort;
use crate::application::services::{CampaignService, ContentService};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::content::FsContentSource;
use crate::infrastructure::persistence::SqliteSaveStore;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    /// Content source, also exposed directly for the per-file scan report
    pub content_source: Arc<FsContentSource>,
    pub persistence: Arc<dyn PersistencePort>,
    // Application services
    pub content: ContentService,
    pub campaigns: CampaignService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        // Open the save database
        let store = Arc::new(SqliteSaveStore::connect(&config.database_url).await?);

        // Wire the content library
        let content_source = Arc::new(FsContentSource::new(&config.content_dir));

        // Initialize application services
        let content = ContentService::new(content_source.clone());
        let campaigns = CampaignService::new(content_source.clone(), store.clone());

        Ok(Self {
            config,
            content_source,
            persistence: store,
            content,
            campaigns,
        })
    }
}
