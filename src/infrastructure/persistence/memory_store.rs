//! In-memory save store
//!
//! Volatile [`PersistencePort`] backend for tests and throwaway sessions;
//! the durable counterpart is the SQLite store.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::application::ports::outbound::{PersistencePort, SavedState};
use crate::domain::entities::CampaignProgress;
use crate::domain::value_objects::{CampaignId, EpisodeId, GameState, SceneId};

#[derive(Default)]
pub struct InMemorySaveStore {
    saved_states: RwLock<HashMap<EpisodeId, SavedState>>,
    campaign_progress: RwLock<HashMap<CampaignId, CampaignProgress>>,
}

impl InMemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistencePort for InMemorySaveStore {
    async fn save_game_state(
        &self,
        episode_id: &EpisodeId,
        scene_id: &SceneId,
        game_state: &GameState,
    ) -> Result<()> {
        self.saved_states.write().await.insert(
            episode_id.clone(),
            SavedState {
                episode_id: episode_id.clone(),
                scene_id: scene_id.clone(),
                game_state: game_state.clone(),
                timestamp: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_saved_state(&self, episode_id: &EpisodeId) -> Result<Option<SavedState>> {
        Ok(self.saved_states.read().await.get(episode_id).cloned())
    }

    async fn save_campaign_progress(&self, progress: &CampaignProgress) -> Result<()> {
        self.campaign_progress
            .write()
            .await
            .insert(progress.campaign_id.clone(), progress.clone());
        Ok(())
    }

    async fn get_campaign_progress(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignProgress>> {
        Ok(self
            .campaign_progress
            .read()
            .await
            .get(campaign_id)
            .cloned())
    }

    async fn delete_campaign_progress(&self, campaign_id: &CampaignId) -> Result<()> {
        self.campaign_progress.write().await.remove(campaign_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saved_state_round_trips_and_upserts() {
        let store = InMemorySaveStore::new();
        let episode_id = EpisodeId::from("first-contact");

        store
            .save_game_state(&episode_id, &SceneId::start(), &GameState::default())
            .await
            .unwrap();
        let mut state = GameState::default();
        state.flags.insert("done".to_string(), true);
        store
            .save_game_state(&episode_id, &SceneId::from("end"), &state)
            .await
            .unwrap();

        let saved = store.get_saved_state(&episode_id).await.unwrap().unwrap();
        assert_eq!(saved.scene_id.as_str(), "end");
        assert_eq!(saved.game_state.flags.get("done"), Some(&true));
    }

    #[tokio::test]
    async fn campaign_progress_delete_is_the_only_destructor() {
        let store = InMemorySaveStore::new();
        let campaign_id = CampaignId::from("crisis");
        let progress = CampaignProgress::new(campaign_id.clone(), GameState::default());

        store.save_campaign_progress(&progress).await.unwrap();
        assert!(store
            .get_campaign_progress(&campaign_id)
            .await
            .unwrap()
            .is_some());

        store.delete_campaign_progress(&campaign_id).await.unwrap();
        assert!(store
            .get_campaign_progress(&campaign_id)
            .await
            .unwrap()
            .is_none());
    }
}
