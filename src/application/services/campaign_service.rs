//! Campaign service - episode sequencing and progress bookkeeping
//!
//! Sequencing is pure: which campaign episode follows the one just finished
//! is a function of the campaign definition and the carried game state. The
//! service wraps those functions with content lookup and progress
//! persistence for the start / advance / reset flows.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::application::ports::outbound::{ContentSourcePort, PersistencePort};
use crate::application::services::condition_service;
use crate::domain::entities::{Campaign, CampaignEpisode, CampaignProgress, Episode};
use crate::domain::value_objects::{CampaignId, EpisodeId, GameState};

#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("campaign `{0}` was not found in the content library")]
    CampaignNotFound(CampaignId),
    #[error("episode `{0}` was not found; ensure all campaign content is installed")]
    EpisodeNotInstalled(EpisodeId),
    #[error("campaign `{0}` has no entry episode with order 1")]
    NoEntryEpisode(CampaignId),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result of advancing a campaign after an episode completed.
#[derive(Debug)]
pub enum CampaignAdvance {
    /// Another episode is eligible; enter it with the prepared state.
    NextEpisode {
        episode: Episode,
        initial_state: GameState,
    },
    /// No candidate matched: the campaign path is exhausted.
    Complete,
}

/// The next eligible campaign episode, or `None` when the path is exhausted.
///
/// With no current episode this is the entry point (`order == 1`). Otherwise
/// candidates are the entries gated on the episode just finished whose flag
/// and variable conditions match the carried state, lowest `order` first;
/// among equal orders the earliest definition wins, so ambiguous content
/// silently picks one (the content linter flags such pairs).
pub fn next_episode<'a>(
    campaign: &'a Campaign,
    current_episode_id: Option<&EpisodeId>,
    game_state: &GameState,
) -> Option<&'a CampaignEpisode> {
    let Some(current) = current_episode_id else {
        return campaign.episodes.iter().find(|entry| entry.order == 1);
    };

    let candidates = campaign.episodes.iter().filter(|entry| {
        let Some(condition) = &entry.condition else {
            return false;
        };
        &condition.previous_episode_id == current
            && condition_service::flags_match(&condition.flags, &game_state.flags)
            && condition_service::variables_match(&condition.variables, &game_state.variables)
    });

    // Lowest order wins; among equal orders the earliest definition does
    // (equivalent to a stable sort followed by taking the head).
    let mut best: Option<&CampaignEpisode> = None;
    for entry in candidates {
        if best.map(|current| entry.order < current.order).unwrap_or(true) {
            best = Some(entry);
        }
    }
    best
}

/// Overlay a campaign episode's `initialState` over the carried game state.
/// Flags and variables merge shallowly (overlay wins); module states merge
/// per module key so a campaign can tweak a few fields inside one module
/// without clobbering the rest of it.
pub fn prepare_initial_state(
    campaign: &Campaign,
    episode_id: &EpisodeId,
    base: &GameState,
) -> GameState {
    let Some(overlay) = campaign
        .entry(episode_id)
        .and_then(|entry| entry.initial_state.as_ref())
    else {
        return base.clone();
    };

    let mut prepared = base.clone();
    prepared.flags.extend(overlay.flags.clone());
    prepared.variables.extend(overlay.variables.clone());

    for (module_id, module_overlay) in &overlay.module_states {
        match (
            prepared.module_states.get_mut(module_id),
            module_overlay.as_object(),
        ) {
            (Some(Value::Object(base_object)), Some(overlay_object)) => {
                for (key, value) in overlay_object {
                    base_object.insert(key.clone(), value.clone());
                }
            }
            _ => {
                prepared
                    .module_states
                    .insert(module_id.clone(), module_overlay.clone());
            }
        }
    }

    prepared
}

pub struct CampaignService {
    content: Arc<dyn ContentSourcePort>,
    persistence: Arc<dyn PersistencePort>,
}

impl CampaignService {
    pub fn new(content: Arc<dyn ContentSourcePort>, persistence: Arc<dyn PersistencePort>) -> Self {
        Self {
            content,
            persistence,
        }
    }

    /// Start a campaign from scratch, or pick up existing progress. Returns
    /// the episode to enter and its prepared initial state.
    pub async fn start(&self, campaign_id: &CampaignId) -> Result<CampaignAdvance, CampaignError> {
        let campaign = self.campaign_by_id(campaign_id).await?;

        if let Some(progress) = self.persistence.get_campaign_progress(campaign_id).await? {
            if let Some(current) = &progress.current_episode_id {
                let episode = self.episode_by_id(current).await?;
                return Ok(CampaignAdvance::NextEpisode {
                    episode,
                    initial_state: progress.game_state,
                });
            }
        }

        let entry = next_episode(&campaign, None, &GameState::default())
            .ok_or_else(|| CampaignError::NoEntryEpisode(campaign_id.clone()))?;
        let episode = self.episode_by_id(&entry.episode_id).await?;
        let initial_state =
            prepare_initial_state(&campaign, &entry.episode_id, &GameState::default());

        let mut progress = CampaignProgress::new(campaign_id.clone(), initial_state.clone());
        progress.current_episode_id = Some(entry.episode_id.clone());
        self.persist_progress(&progress).await;

        Ok(CampaignAdvance::NextEpisode {
            episode,
            initial_state,
        })
    }

    /// An episode finished (the walker reached an authored ending) while this
    /// campaign was active: record completion, pick the next episode, and
    /// prepare its state.
    pub async fn advance(
        &self,
        campaign_id: &CampaignId,
        completed_episode: &EpisodeId,
        game_state: &GameState,
    ) -> Result<CampaignAdvance, CampaignError> {
        let campaign = self.campaign_by_id(campaign_id).await?;

        let mut progress = self
            .persistence
            .get_campaign_progress(campaign_id)
            .await?
            .unwrap_or_else(|| CampaignProgress::new(campaign_id.clone(), game_state.clone()));

        if !progress.completed_episodes.contains(completed_episode) {
            progress.completed_episodes.push(completed_episode.clone());
        }
        progress.current_episode_id = None;
        progress.game_state = game_state.clone();
        progress.timestamp = Utc::now();
        self.persist_progress(&progress).await;

        let Some(entry) = next_episode(&campaign, Some(completed_episode), game_state) else {
            return Ok(CampaignAdvance::Complete);
        };

        let episode = self.episode_by_id(&entry.episode_id).await?;
        let initial_state = prepare_initial_state(&campaign, &entry.episode_id, game_state);

        progress.current_episode_id = Some(entry.episode_id.clone());
        progress.game_state = initial_state.clone();
        progress.timestamp = Utc::now();
        self.persist_progress(&progress).await;

        Ok(CampaignAdvance::NextEpisode {
            episode,
            initial_state,
        })
    }

    /// Explicit progress reset; the only way progress is destroyed.
    pub async fn reset_progress(&self, campaign_id: &CampaignId) -> Result<(), CampaignError> {
        self.persistence
            .delete_campaign_progress(campaign_id)
            .await?;
        Ok(())
    }

    pub async fn progress(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignProgress>, CampaignError> {
        Ok(self.persistence.get_campaign_progress(campaign_id).await?)
    }

    async fn campaign_by_id(&self, campaign_id: &CampaignId) -> Result<Campaign, CampaignError> {
        self.content
            .list_campaigns()
            .await?
            .into_iter()
            .find(|campaign| &campaign.id == campaign_id)
            .ok_or_else(|| CampaignError::CampaignNotFound(campaign_id.clone()))
    }

    async fn episode_by_id(&self, episode_id: &EpisodeId) -> Result<Episode, CampaignError> {
        self.content
            .list_episodes()
            .await?
            .into_iter()
            .find(|episode| &episode.id == episode_id)
            .ok_or_else(|| CampaignError::EpisodeNotInstalled(episode_id.clone()))
    }

    /// Progress writes are bookkeeping; a failed write must not interrupt
    /// the campaign flow.
    async fn persist_progress(&self, progress: &CampaignProgress) {
        if let Err(error) = self.persistence.save_campaign_progress(progress).await {
            tracing::warn!(%error, campaign = %progress.campaign_id,
                "failed to persist campaign progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::outbound::SavedState;
    use crate::domain::entities::{CampaignCondition, Scene};
    use crate::domain::value_objects::{ModuleId, Scalar, SceneId};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn campaign_episode(
        episode_id: &str,
        order: u32,
        condition: Option<CampaignCondition>,
        initial_state: Option<GameState>,
    ) -> CampaignEpisode {
        CampaignEpisode {
            episode_id: EpisodeId::from(episode_id),
            title: episode_id.to_string(),
            description: String::new(),
            order,
            condition,
            initial_state,
        }
    }

    fn gate(previous: &str, flag: &str, value: bool) -> CampaignCondition {
        CampaignCondition {
            previous_episode_id: EpisodeId::from(previous),
            flags: HashMap::from([(flag.to_string(), value)]),
            variables: HashMap::new(),
        }
    }

    fn crisis_campaign() -> Campaign {
        Campaign {
            id: CampaignId::from("federation-crisis"),
            title: "Federation Crisis".to_string(),
            author: "Starfleet Command".to_string(),
            description: "A growing crisis.".to_string(),
            version: Some("1.0".to_string()),
            episodes: vec![
                campaign_episode("first-contact", 1, None, None),
                // Listed out of order on purpose: order 3 before order 2.
                campaign_episode(
                    "last-stand",
                    3,
                    Some(gate("first-contact", "peacefulResolution", true)),
                    None,
                ),
                campaign_episode(
                    "diplomatic-mission",
                    2,
                    Some(gate("first-contact", "peacefulResolution", true)),
                    Some(GameState {
                        flags: HashMap::from([("romulansCooperative".to_string(), true)]),
                        ..GameState::default()
                    }),
                ),
                campaign_episode(
                    "romulan-encounter",
                    2,
                    Some(gate("first-contact", "peacefulResolution", false)),
                    None,
                ),
            ],
        }
    }

    fn flags(entries: &[(&str, bool)]) -> GameState {
        GameState {
            flags: entries
                .iter()
                .map(|(flag, value)| (flag.to_string(), *value))
                .collect(),
            ..GameState::default()
        }
    }

    #[test]
    fn entry_point_is_the_order_one_episode() {
        let campaign = crisis_campaign();
        let entry = next_episode(&campaign, None, &GameState::default()).unwrap();
        assert_eq!(entry.episode_id.as_str(), "first-contact");
    }

    #[test]
    fn lowest_matching_order_wins_regardless_of_list_position() {
        let campaign = crisis_campaign();
        let current = EpisodeId::from("first-contact");

        let peaceful = flags(&[("peacefulResolution", true)]);
        let entry = next_episode(&campaign, Some(&current), &peaceful).unwrap();
        assert_eq!(entry.episode_id.as_str(), "diplomatic-mission");

        let hostile = flags(&[("peacefulResolution", false)]);
        let entry = next_episode(&campaign, Some(&current), &hostile).unwrap();
        assert_eq!(entry.episode_id.as_str(), "romulan-encounter");
    }

    #[test]
    fn unset_gate_flag_matches_no_branch() {
        let campaign = crisis_campaign();
        let current = EpisodeId::from("first-contact");
        assert!(next_episode(&campaign, Some(&current), &GameState::default()).is_none());
    }

    #[test]
    fn exhausted_path_returns_none() {
        let campaign = crisis_campaign();
        let current = EpisodeId::from("romulan-encounter");
        let state = flags(&[("peacefulResolution", false)]);
        assert!(next_episode(&campaign, Some(&current), &state).is_none());
    }

    #[test]
    fn initial_state_overlay_merges_flags_and_module_states_per_key() {
        let mut campaign = crisis_campaign();
        campaign.episodes[2].initial_state = Some(GameState {
            flags: HashMap::from([("romulansCooperative".to_string(), true)]),
            variables: HashMap::from([("standing".to_string(), Scalar::Number(5.0))]),
            module_states: HashMap::from([(
                ModuleId::from("ship"),
                json!({"name": "USS Defiant"}),
            )]),
        });

        let base = GameState {
            flags: HashMap::from([("peacefulResolution".to_string(), true)]),
            variables: HashMap::new(),
            module_states: HashMap::from([(
                ModuleId::from("ship"),
                json!({"name": "USS Endeavour", "class": "Nebula"}),
            )]),
        };

        let prepared =
            prepare_initial_state(&campaign, &EpisodeId::from("diplomatic-mission"), &base);

        assert_eq!(prepared.flags.get("peacefulResolution"), Some(&true));
        assert_eq!(prepared.flags.get("romulansCooperative"), Some(&true));
        assert_eq!(
            prepared.variables.get("standing"),
            Some(&Scalar::Number(5.0))
        );
        // Per-module-key merge: the overlay changed the name but the class
        // survived.
        let ship = prepared.module_states.get(&ModuleId::from("ship")).unwrap();
        assert_eq!(ship["name"], "USS Defiant");
        assert_eq!(ship["class"], "Nebula");
    }

    #[test]
    fn missing_overlay_returns_base_unchanged() {
        let campaign = crisis_campaign();
        let base = flags(&[("peacefulResolution", false)]);
        let prepared =
            prepare_initial_state(&campaign, &EpisodeId::from("romulan-encounter"), &base);
        assert_eq!(prepared, base);
    }

    // -- service-level flow ------------------------------------------------

    struct FixtureContent {
        episodes: Vec<Episode>,
        campaigns: Vec<Campaign>,
    }

    #[async_trait]
    impl ContentSourcePort for FixtureContent {
        async fn list_episodes(&self) -> Result<Vec<Episode>> {
            Ok(self.episodes.clone())
        }

        async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
            Ok(self.campaigns.clone())
        }
    }

    #[derive(Default)]
    struct MemoryProgressStore {
        progress: Mutex<HashMap<CampaignId, CampaignProgress>>,
    }

    #[async_trait]
    impl PersistencePort for MemoryProgressStore {
        async fn save_game_state(
            &self,
            _episode_id: &EpisodeId,
            _scene_id: &SceneId,
            _game_state: &GameState,
        ) -> Result<()> {
            Ok(())
        }

        async fn get_saved_state(&self, _episode_id: &EpisodeId) -> Result<Option<SavedState>> {
            Ok(None)
        }

        async fn save_campaign_progress(&self, progress: &CampaignProgress) -> Result<()> {
            self.progress
                .lock()
                .unwrap()
                .insert(progress.campaign_id.clone(), progress.clone());
            Ok(())
        }

        async fn get_campaign_progress(
            &self,
            campaign_id: &CampaignId,
        ) -> Result<Option<CampaignProgress>> {
            Ok(self.progress.lock().unwrap().get(campaign_id).cloned())
        }

        async fn delete_campaign_progress(&self, campaign_id: &CampaignId) -> Result<()> {
            self.progress.lock().unwrap().remove(campaign_id);
            Ok(())
        }
    }

    fn stub_episode(id: &str) -> Episode {
        Episode {
            id: EpisodeId::from(id),
            title: id.to_string(),
            author: "Starfleet Command".to_string(),
            description: "Fixture".to_string(),
            stardate: "48214.5".to_string(),
            ship_name: "USS Endeavour".to_string(),
            scenes: HashMap::from([(
                SceneId::start(),
                Scene {
                    id: SceneId::start(),
                    title: "Start".to_string(),
                    text: Vec::new(),
                    choices: Vec::new(),
                },
            )]),
            required_modules: Vec::new(),
            module_config: HashMap::new(),
        }
    }

    fn service_with_all_episodes() -> (CampaignService, Arc<MemoryProgressStore>) {
        let content = Arc::new(FixtureContent {
            episodes: vec![
                stub_episode("first-contact"),
                stub_episode("diplomatic-mission"),
                stub_episode("romulan-encounter"),
                stub_episode("last-stand"),
            ],
            campaigns: vec![crisis_campaign()],
        });
        let store = Arc::new(MemoryProgressStore::default());
        (CampaignService::new(content, store.clone()), store)
    }

    #[tokio::test]
    async fn start_enters_the_entry_episode_and_persists_progress() {
        let (service, store) = service_with_all_episodes();
        let campaign_id = CampaignId::from("federation-crisis");

        let advance = service.start(&campaign_id).await.unwrap();
        let CampaignAdvance::NextEpisode { episode, .. } = advance else {
            panic!("expected an episode");
        };
        assert_eq!(episode.id.as_str(), "first-contact");

        let progress = store.progress.lock().unwrap();
        let saved = progress.get(&campaign_id).unwrap();
        assert_eq!(
            saved.current_episode_id.as_ref().map(|id| id.as_str()),
            Some("first-contact")
        );
    }

    #[tokio::test]
    async fn advance_applies_the_overlay_and_records_completion() {
        let (service, store) = service_with_all_episodes();
        let campaign_id = CampaignId::from("federation-crisis");
        service.start(&campaign_id).await.unwrap();

        let carried = flags(&[("peacefulResolution", true)]);
        let advance = service
            .advance(&campaign_id, &EpisodeId::from("first-contact"), &carried)
            .await
            .unwrap();

        let CampaignAdvance::NextEpisode {
            episode,
            initial_state,
        } = advance
        else {
            panic!("expected an episode");
        };
        assert_eq!(episode.id.as_str(), "diplomatic-mission");
        assert_eq!(initial_state.flags.get("romulansCooperative"), Some(&true));
        assert_eq!(initial_state.flags.get("peacefulResolution"), Some(&true));

        let progress = store.progress.lock().unwrap();
        let saved = progress.get(&campaign_id).unwrap();
        assert_eq!(saved.completed_episodes.len(), 1);
        assert_eq!(
            saved.current_episode_id.as_ref().map(|id| id.as_str()),
            Some("diplomatic-mission")
        );
    }

    #[tokio::test]
    async fn advance_past_the_last_episode_completes_the_campaign() {
        let (service, _store) = service_with_all_episodes();
        let campaign_id = CampaignId::from("federation-crisis");
        let carried = flags(&[("peacefulResolution", false)]);

        service.start(&campaign_id).await.unwrap();
        service
            .advance(&campaign_id, &EpisodeId::from("first-contact"), &carried)
            .await
            .unwrap();
        let advance = service
            .advance(&campaign_id, &EpisodeId::from("romulan-encounter"), &carried)
            .await
            .unwrap();
        assert!(matches!(advance, CampaignAdvance::Complete));
    }

    #[tokio::test]
    async fn missing_episode_content_is_a_recoverable_error() {
        let content = Arc::new(FixtureContent {
            episodes: vec![stub_episode("first-contact")],
            campaigns: vec![crisis_campaign()],
        });
        let store = Arc::new(MemoryProgressStore::default());
        let service = CampaignService::new(content, store);
        let campaign_id = CampaignId::from("federation-crisis");

        service.start(&campaign_id).await.unwrap();
        let carried = flags(&[("peacefulResolution", true)]);
        let error = service
            .advance(&campaign_id, &EpisodeId::from("first-contact"), &carried)
            .await
            .unwrap_err();
        assert!(matches!(error, CampaignError::EpisodeNotInstalled(_)));
        assert!(error.to_string().contains("campaign content is installed"));
    }

    #[tokio::test]
    async fn reset_progress_deletes_the_record() {
        let (service, store) = service_with_all_episodes();
        let campaign_id = CampaignId::from("federation-crisis");
        service.start(&campaign_id).await.unwrap();
        assert!(service.progress(&campaign_id).await.unwrap().is_some());

        service.reset_progress(&campaign_id).await.unwrap();
        assert!(store.progress.lock().unwrap().is_empty());
    }
}
