//! SQLite save store
//!
//! Durable [`PersistencePort`] backend. Two tables, one row per save slot:
//! `saved_states` keyed by episode id and `campaign_progress` keyed by
//! campaign id. State blobs are stored as JSON text in the interchange
//! shape, so rows survive engine upgrades that keep the format stable.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::application::ports::outbound::{PersistencePort, SavedState};
use crate::domain::entities::CampaignProgress;
use crate::domain::value_objects::{CampaignId, EpisodeId, GameState, SceneId};

pub struct SqliteSaveStore {
    pool: SqlitePool,
}

impl SqliteSaveStore {
    /// Open (or create) the save database and run migrations.
    ///
    /// A single connection keeps `sqlite::memory:` databases coherent and is
    /// plenty for the engine's one-writer access pattern.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .with_context(|| format!("failed to open save database at {database_url}"))?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS saved_states (
                episode_id TEXT PRIMARY KEY,
                scene_id TEXT NOT NULL,
                game_state TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS campaign_progress (
                campaign_id TEXT PRIMARY KEY,
                current_episode_id TEXT,
                completed_episodes TEXT NOT NULL,
                game_state TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid timestamp in save database: {raw}"))?
        .with_timezone(&Utc))
}

#[async_trait]
impl PersistencePort for SqliteSaveStore {
    async fn save_game_state(
        &self,
        episode_id: &EpisodeId,
        scene_id: &SceneId,
        game_state: &GameState,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO saved_states (episode_id, scene_id, game_state, timestamp)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(episode_id) DO UPDATE SET
                scene_id = excluded.scene_id,
                game_state = excluded.game_state,
                timestamp = excluded.timestamp",
        )
        .bind(episode_id.as_str())
        .bind(scene_id.as_str())
        .bind(serde_json::to_string(game_state)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("failed to save game state")?;
        Ok(())
    }

    async fn get_saved_state(&self, episode_id: &EpisodeId) -> Result<Option<SavedState>> {
        let row = sqlx::query(
            "SELECT scene_id, game_state, timestamp FROM saved_states WHERE episode_id = ?1",
        )
        .bind(episode_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to load saved state")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let scene_id: String = row.get("scene_id");
        let game_state: String = row.get("game_state");
        let timestamp: String = row.get("timestamp");

        Ok(Some(SavedState {
            episode_id: episode_id.clone(),
            scene_id: SceneId::from(scene_id),
            game_state: serde_json::from_str(&game_state)
                .context("corrupt game state in save database")?,
            timestamp: parse_timestamp(&timestamp)?,
        }))
    }

    async fn save_campaign_progress(&self, progress: &CampaignProgress) -> Result<()> {
        sqlx::query(
            "INSERT INTO campaign_progress
                (campaign_id, current_episode_id, completed_episodes, game_state, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(campaign_id) DO UPDATE SET
                current_episode_id = excluded.current_episode_id,
                completed_episodes = excluded.completed_episodes,
                game_state = excluded.game_state,
                timestamp = excluded.timestamp",
        )
        .bind(progress.campaign_id.as_str())
        .bind(
            progress
                .current_episode_id
                .as_ref()
                .map(|id| id.as_str().to_string()),
        )
        .bind(serde_json::to_string(&progress.completed_episodes)?)
        .bind(serde_json::to_string(&progress.game_state)?)
        .bind(progress.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("failed to save campaign progress")?;
        Ok(())
    }

    async fn get_campaign_progress(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignProgress>> {
        let row = sqlx::query(
            "SELECT current_episode_id, completed_episodes, game_state, timestamp
             FROM campaign_progress WHERE campaign_id = ?1",
        )
        .bind(campaign_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to load campaign progress")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let current_episode_id: Option<String> = row.get("current_episode_id");
        let completed_episodes: String = row.get("completed_episodes");
        let game_state: String = row.get("game_state");
        let timestamp: String = row.get("timestamp");

        Ok(Some(CampaignProgress {
            campaign_id: campaign_id.clone(),
            current_episode_id: current_episode_id.map(EpisodeId::from),
            completed_episodes: serde_json::from_str(&completed_episodes)
                .context("corrupt episode list in save database")?,
            game_state: serde_json::from_str(&game_state)
                .context("corrupt game state in save database")?,
            timestamp: parse_timestamp(&timestamp)?,
        }))
    }

    async fn delete_campaign_progress(&self, campaign_id: &CampaignId) -> Result<()> {
        sqlx::query("DELETE FROM campaign_progress WHERE campaign_id = ?1")
            .bind(campaign_id.as_str())
            .execute(&self.pool)
            .await
            .context("failed to delete campaign progress")?;
        Ok(())
    }
}
