//! Persistence port - durable save-game storage consumed by the engine
//!
//! Implemented by a keyed store in infrastructure. The engine treats writes
//! as fire-and-forget: a failed save is logged and the in-memory state stays
//! authoritative for the session.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::CampaignProgress;
use crate::domain::value_objects::{CampaignId, EpisodeId, GameState, SceneId};

/// A persisted `(scene, game state)` snapshot for one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedState {
    pub episode_id: EpisodeId,
    pub scene_id: SceneId,
    pub game_state: GameState,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Upsert the save slot for an episode, keyed by episode id.
    async fn save_game_state(
        &self,
        episode_id: &EpisodeId,
        scene_id: &SceneId,
        game_state: &GameState,
    ) -> Result<()>;

    async fn get_saved_state(&self, episode_id: &EpisodeId) -> Result<Option<SavedState>>;

    /// Upsert campaign progress, keyed by campaign id.
    async fn save_campaign_progress(&self, progress: &CampaignProgress) -> Result<()>;

    async fn get_campaign_progress(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignProgress>>;

    /// Explicit progress reset; the only way campaign progress is destroyed.
    async fn delete_campaign_progress(&self, campaign_id: &CampaignId) -> Result<()>;
}
