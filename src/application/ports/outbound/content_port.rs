//! Content source port - where episodes and campaigns come from
//!
//! Implementations must hand the engine only validated content: episodes
//! with non-empty metadata and scenes, campaigns with a well-formed episode
//! list. Invalid files are rejected at the source with per-file reasons.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::entities::{Campaign, Episode};

#[async_trait]
pub trait ContentSourcePort: Send + Sync {
    async fn list_episodes(&self) -> Result<Vec<Episode>>;

    async fn list_campaigns(&self) -> Result<Vec<Campaign>>;
}
