//! Session service - the scene/choice graph walker for one episode
//!
//! A session owns the canonical `GameState` for the episode it runs. Choice
//! selection applies flag and variable writes, dispatches module actions,
//! feeds the resulting cross-module effects through the propagator, then
//! transitions to the target scene and hands the new snapshot to the
//! persistence port. Persistence is optimistic: a failed write is logged and
//! play continues on the in-memory state.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::application::ports::outbound::{PersistencePort, SavedState};
use crate::application::services::condition_service;
use crate::application::services::effect_service::{
    EffectPropagator, ModuleInteraction, PropagationOutcome,
};
use crate::domain::entities::{Choice, Episode, Scene};
use crate::domain::modules::ModuleRegistry;
use crate::domain::value_objects::{Alert, GameState, ModuleId, SceneId};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("scene `{scene}` is not defined in episode `{episode}`")]
    UnknownScene { episode: String, scene: String },
    #[error("choice index {index} is out of range for scene `{scene}`")]
    UnknownChoice { scene: String, index: usize },
    #[error(transparent)]
    Module(#[from] anyhow::Error),
}

/// What one choice selection produced, for the presentation layer.
#[derive(Debug)]
pub struct ChoiceOutcome {
    pub scene_id: SceneId,
    pub alerts: Vec<Alert>,
    pub interactions: Vec<ModuleInteraction>,
    pub ending: bool,
}

pub struct GameSession {
    episode: Episode,
    modules: ModuleRegistry,
    active_modules: BTreeSet<ModuleId>,
    propagator: EffectPropagator,
    persistence: Arc<dyn PersistencePort>,
    current_scene_id: SceneId,
    game_state: GameState,
}

impl GameSession {
    /// Start the episode fresh: initialize its required modules and enter the
    /// start scene.
    pub fn start(
        episode: Episode,
        mut modules: ModuleRegistry,
        persistence: Arc<dyn PersistencePort>,
    ) -> Result<Self, SessionError> {
        let module_states =
            modules.initialize_modules(&episode.required_modules, &episode.module_config)?;
        let game_state = GameState {
            module_states,
            ..GameState::default()
        };
        Ok(Self::assemble(
            episode,
            modules,
            persistence,
            SceneId::start(),
            game_state,
        ))
    }

    /// Start the episode with a campaign-prepared game state. Required
    /// modules are initialized with the episode config first; any module
    /// state carried in `initial` then replaces the fresh one wholesale.
    pub fn start_with_state(
        episode: Episode,
        mut modules: ModuleRegistry,
        persistence: Arc<dyn PersistencePort>,
        initial: GameState,
    ) -> Result<Self, SessionError> {
        let mut module_states =
            modules.initialize_modules(&episode.required_modules, &episode.module_config)?;
        for (module_id, state) in &initial.module_states {
            if let Some(module) = modules.get_mut(module_id) {
                module.set_state(state.clone())?;
                module_states.insert(module_id.clone(), state.clone());
            }
        }
        let game_state = GameState {
            flags: initial.flags,
            variables: initial.variables,
            module_states,
        };
        Ok(Self::assemble(
            episode,
            modules,
            persistence,
            SceneId::start(),
            game_state,
        ))
    }

    /// Resume from a persisted snapshot: module live state comes back from
    /// `gameState.moduleStates`, the authoritative copy.
    pub fn resume(
        episode: Episode,
        mut modules: ModuleRegistry,
        persistence: Arc<dyn PersistencePort>,
        saved: SavedState,
    ) -> Result<Self, SessionError> {
        for module_id in &episode.required_modules {
            let Some(module) = modules.get_mut(module_id) else {
                continue;
            };
            match saved.game_state.module_states.get(module_id) {
                Some(state) => module.set_state(state.clone())?,
                None => {
                    module.initialize(episode.module_config.get(module_id))?;
                }
            }
        }
        Ok(Self::assemble(
            episode,
            modules,
            persistence,
            saved.scene_id,
            saved.game_state,
        ))
    }

    fn assemble(
        episode: Episode,
        modules: ModuleRegistry,
        persistence: Arc<dyn PersistencePort>,
        current_scene_id: SceneId,
        game_state: GameState,
    ) -> Self {
        let active_modules = episode.required_modules.iter().cloned().collect();
        Self {
            episode,
            modules,
            active_modules,
            propagator: EffectPropagator::default(),
            persistence,
            current_scene_id,
            game_state,
        }
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn current_scene_id(&self) -> &SceneId {
        &self.current_scene_id
    }

    pub fn current_scene(&self) -> Result<&Scene, SessionError> {
        self.episode
            .scene(&self.current_scene_id)
            .ok_or_else(|| SessionError::UnknownScene {
                episode: self.episode.id.to_string(),
                scene: self.current_scene_id.to_string(),
            })
    }

    /// The choices a player may take right now. Recomputed on every call:
    /// flags, variables, and module state can all change between visits to
    /// the same scene.
    pub fn available_choices(&self) -> Result<Vec<&Choice>, SessionError> {
        let scene = self.current_scene()?;
        Ok(scene
            .choices
            .iter()
            .filter(|choice| {
                condition_service::is_choice_available(
                    choice,
                    &self.game_state,
                    &self.modules,
                    &self.active_modules,
                )
            })
            .collect())
    }

    /// Whether the current scene is an authored ending. Judged on the
    /// authored choice count, never the filtered one: a heavily gated scene
    /// is not an ending.
    pub fn at_ending(&self) -> Result<bool, SessionError> {
        Ok(self.current_scene()?.is_ending())
    }

    /// Apply one of the currently available choices, by index into
    /// [`Self::available_choices`].
    pub async fn select_choice(&mut self, index: usize) -> Result<ChoiceOutcome, SessionError> {
        let choice = self
            .available_choices()?
            .get(index)
            .cloned()
            .cloned()
            .ok_or_else(|| SessionError::UnknownChoice {
                scene: self.current_scene_id.to_string(),
                index,
            })?;

        // A dangling target is a content bug; fail the transition visibly
        // before touching any state.
        if self.episode.scene(&choice.next_scene).is_none() {
            return Err(SessionError::UnknownScene {
                episode: self.episode.id.to_string(),
                scene: choice.next_scene.to_string(),
            });
        }

        self.game_state.flags.extend(choice.set_flags.clone());
        self.game_state
            .variables
            .extend(choice.set_variables.clone());

        let mut alerts = Vec::new();
        let mut interactions = Vec::new();
        if !choice.module_actions.is_empty() {
            let mut pending_effects = Vec::new();

            for action in &choice.module_actions {
                if !self.active_modules.contains(&action.module) {
                    tracing::debug!(module = %action.module, action = %action.action,
                        "choice action targets a module not active for this episode");
                    continue;
                }
                let Some(module) = self.modules.get_mut(&action.module) else {
                    continue;
                };
                match module.handle_action(&action.action, action.payload.as_ref()) {
                    None => interactions.push(ModuleInteraction {
                        module: action.module.clone(),
                        action: action.action.clone(),
                        handled: false,
                        alert: None,
                    }),
                    Some(result) => {
                        if let Some(state) = result.state {
                            self.game_state
                                .module_states
                                .insert(action.module.clone(), state);
                        }
                        if let Some(alert) = &result.alert {
                            alerts.push(alert.clone());
                        }
                        interactions.push(ModuleInteraction {
                            module: action.module.clone(),
                            action: action.action.clone(),
                            handled: true,
                            alert: result.alert,
                        });
                        pending_effects.extend(result.cross_module_effects);
                    }
                }
            }

            if !pending_effects.is_empty() {
                let PropagationOutcome {
                    alerts: effect_alerts,
                    interactions: effect_interactions,
                } = self.propagator.propagate(
                    &pending_effects,
                    &mut self.modules,
                    &self.active_modules,
                    &mut self.game_state.module_states,
                );
                alerts.extend(effect_alerts);
                interactions.extend(effect_interactions);
            }
        }

        self.current_scene_id = choice.next_scene.clone();

        // Optimistic apply-then-persist; the transition never waits on a
        // failed write.
        if let Err(error) = self
            .persistence
            .save_game_state(&self.episode.id, &self.current_scene_id, &self.game_state)
            .await
        {
            tracing::warn!(%error, episode = %self.episode.id,
                "failed to persist game state; continuing with in-memory state");
        }

        let ending = self.at_ending()?;
        Ok(ChoiceOutcome {
            scene_id: self.current_scene_id.clone(),
            alerts,
            interactions,
            ending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Scene;
    use crate::domain::value_objects::{Condition, ModuleAction, Scalar};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::application::ports::outbound::PersistencePort;
    use crate::domain::entities::CampaignProgress;
    use crate::domain::modules::GameModule;
    use crate::domain::value_objects::{CampaignId, EpisodeId};

    /// In-memory persistence double; can be told to fail every write.
    #[derive(Default)]
    struct RecordingStore {
        saves: Mutex<Vec<(EpisodeId, SceneId)>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl PersistencePort for RecordingStore {
        async fn save_game_state(
            &self,
            episode_id: &EpisodeId,
            scene_id: &SceneId,
            _game_state: &GameState,
        ) -> Result<()> {
            if self.fail_writes {
                anyhow::bail!("store offline");
            }
            self.saves
                .lock()
                .unwrap()
                .push((episode_id.clone(), scene_id.clone()));
            Ok(())
        }

        async fn get_saved_state(&self, _episode_id: &EpisodeId) -> Result<Option<SavedState>> {
            Ok(None)
        }

        async fn save_campaign_progress(&self, _progress: &CampaignProgress) -> Result<()> {
            Ok(())
        }

        async fn get_campaign_progress(
            &self,
            _campaign_id: &CampaignId,
        ) -> Result<Option<CampaignProgress>> {
            Ok(None)
        }

        async fn delete_campaign_progress(&self, _campaign_id: &CampaignId) -> Result<()> {
            Ok(())
        }
    }

    fn scene(id: &str, choices: Vec<Choice>) -> Scene {
        Scene {
            id: SceneId::from(id),
            title: id.to_string(),
            text: vec![format!("You are at {id}.")],
            choices,
        }
    }

    fn choice(text: &str, next: &str) -> Choice {
        Choice {
            text: text.to_string(),
            next_scene: SceneId::from(next),
            set_flags: HashMap::new(),
            set_variables: HashMap::new(),
            module_actions: Vec::new(),
            condition: None,
        }
    }

    fn episode(scenes: Vec<Scene>, required: &[&str]) -> Episode {
        Episode {
            id: EpisodeId::from("test-episode"),
            title: "Test Episode".to_string(),
            author: "Starfleet Command".to_string(),
            description: "Fixture".to_string(),
            stardate: "48214.5".to_string(),
            ship_name: "USS Endeavour".to_string(),
            scenes: scenes
                .into_iter()
                .map(|scene| (scene.id.clone(), scene))
                .collect(),
            required_modules: required.iter().map(|id| ModuleId::from(*id)).collect(),
            module_config: HashMap::new(),
        }
    }

    fn store() -> Arc<RecordingStore> {
        Arc::new(RecordingStore::default())
    }

    #[tokio::test]
    async fn select_choice_sets_flags_and_transitions() {
        let mut go = choice("Go", "end");
        go.set_flags.insert("done".to_string(), true);
        let episode = episode(vec![scene("start", vec![go]), scene("end", vec![])], &[]);

        let mut session =
            GameSession::start(episode, ModuleRegistry::standard(), store()).unwrap();
        let outcome = session.select_choice(0).await.unwrap();

        assert_eq!(session.current_scene_id().as_str(), "end");
        assert_eq!(session.game_state().flags.get("done"), Some(&true));
        assert!(outcome.ending);
    }

    #[tokio::test]
    async fn choice_writes_overwrite_existing_flags_in_merge_order() {
        let mut go = choice("Go", "start");
        go.set_flags.insert("a".to_string(), false);
        go.set_flags.insert("b".to_string(), true);
        let episode = episode(vec![scene("start", vec![go])], &[]);

        let mut session =
            GameSession::start(episode, ModuleRegistry::standard(), store()).unwrap();
        session.game_state.flags.insert("a".to_string(), true);

        session.select_choice(0).await.unwrap();
        let flags = &session.game_state().flags;
        assert_eq!(flags.get("a"), Some(&false));
        assert_eq!(flags.get("b"), Some(&true));
        assert_eq!(flags.len(), 2);
    }

    #[tokio::test]
    async fn gated_choices_are_filtered_but_do_not_make_an_ending() {
        let mut gated = choice("Secret path", "start");
        gated.condition = Some(Condition {
            flags: HashMap::from([("clearance".to_string(), true)]),
            ..Default::default()
        });
        let mut gated_too = choice("Other secret", "start");
        gated_too.condition = gated.condition.clone();

        let episode = episode(vec![scene("start", vec![gated, gated_too])], &[]);
        let mut session =
            GameSession::start(episode, ModuleRegistry::standard(), store()).unwrap();

        assert!(session.available_choices().unwrap().is_empty());
        // Authored count is 2, so this is not an ending.
        assert!(!session.at_ending().unwrap());

        // Selecting from the (empty) available list fails loudly.
        let error = session.select_choice(0).await.unwrap_err();
        assert!(matches!(error, SessionError::UnknownChoice { .. }));

        // Availability is recomputed once the flag appears.
        session.game_state.flags.insert("clearance".to_string(), true);
        assert_eq!(session.available_choices().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn module_actions_cascade_through_the_propagator() {
        let mut fire = choice("Divert power", "start");
        fire.module_actions.push(ModuleAction {
            module: ModuleId::from("ship"),
            action: "TAKE_DAMAGE".to_string(),
            payload: Some(serde_json::json!({"system": "lifeSupportSystems", "amount": 90})),
        });
        let episode = episode(
            vec![scene("start", vec![fire])],
            &["ship", "crew", "mission"],
        );

        let mut session =
            GameSession::start(episode, ModuleRegistry::standard(), store()).unwrap();
        let outcome = session.select_choice(0).await.unwrap();

        // Ship dispatch plus the nested crew morale hit.
        assert!(outcome
            .interactions
            .iter()
            .any(|interaction| interaction.module.as_str() == "crew"));
        let crew_state = session
            .game_state()
            .module_states
            .get(&ModuleId::from("crew"))
            .expect("crew state folded into game state");
        assert!(crew_state["officers"][0]["morale"].as_i64().unwrap() < 90);
        assert!(!outcome.alerts.is_empty());
    }

    #[tokio::test]
    async fn dangling_next_scene_fails_the_transition_without_mutating() {
        let mut go = choice("Go", "missing");
        go.set_flags.insert("done".to_string(), true);
        let episode = episode(vec![scene("start", vec![go])], &[]);

        let mut session =
            GameSession::start(episode, ModuleRegistry::standard(), store()).unwrap();
        let error = session.select_choice(0).await.unwrap_err();
        assert!(matches!(error, SessionError::UnknownScene { .. }));
        assert_eq!(session.current_scene_id().as_str(), "start");
        assert!(session.game_state().flags.is_empty());
    }

    #[tokio::test]
    async fn persistence_runs_at_every_transition_and_failures_do_not_block() {
        let episode = episode(
            vec![
                scene("start", vec![choice("Onward", "middle")]),
                scene("middle", vec![choice("Onward", "end")]),
                scene("end", vec![]),
            ],
            &[],
        );

        let recording = store();
        let mut session = GameSession::start(
            episode.clone(),
            ModuleRegistry::standard(),
            recording.clone(),
        )
        .unwrap();
        session.select_choice(0).await.unwrap();
        session.select_choice(0).await.unwrap();
        assert_eq!(recording.saves.lock().unwrap().len(), 2);

        // Same walk against a store that rejects every write.
        let failing = Arc::new(RecordingStore {
            fail_writes: true,
            ..Default::default()
        });
        let mut session =
            GameSession::start(episode, ModuleRegistry::standard(), failing).unwrap();
        session.select_choice(0).await.unwrap();
        assert_eq!(session.current_scene_id().as_str(), "middle");
    }

    #[tokio::test]
    async fn resume_restores_scene_and_module_state() {
        let episode = episode(
            vec![scene("start", vec![]), scene("standoff", vec![])],
            &["ship"],
        );

        // Build a saved snapshot with shields lowered.
        let mut modules = ModuleRegistry::standard();
        let ship_id = ModuleId::from("ship");
        let mut states = modules
            .initialize_modules(std::slice::from_ref(&ship_id), &HashMap::new())
            .unwrap();
        let result = modules
            .get_mut(&ship_id)
            .unwrap()
            .handle_action("LOWER_SHIELDS", None)
            .unwrap();
        states.insert(ship_id.clone(), result.state.unwrap());

        let saved = SavedState {
            episode_id: episode.id.clone(),
            scene_id: SceneId::from("standoff"),
            game_state: GameState {
                flags: HashMap::from([("alerted".to_string(), true)]),
                variables: HashMap::from([("hails".to_string(), Scalar::Number(2.0))]),
                module_states: states,
            },
            timestamp: chrono::Utc::now(),
        };

        let session =
            GameSession::resume(episode, ModuleRegistry::standard(), store(), saved).unwrap();
        assert_eq!(session.current_scene_id().as_str(), "standoff");
        assert_eq!(session.game_state().flags.get("alerted"), Some(&true));
        let ship_state = session
            .game_state()
            .module_states
            .get(&ship_id)
            .unwrap();
        assert_eq!(ship_state["systems"]["shields"]["status"], "offline");
    }

    #[tokio::test]
    async fn campaign_injected_module_state_overrides_fresh_initialization() {
        let episode = episode(vec![scene("start", vec![])], &["ship"]);
        let ship_id = ModuleId::from("ship");

        let injected_ship = {
            let mut module = crate::domain::modules::ShipModule::new();
            let mut state = module.initialize(None).unwrap();
            state["name"] = serde_json::json!("USS Defiant");
            state
        };

        let initial = GameState {
            flags: HashMap::from([("romulansHostile".to_string(), true)]),
            variables: HashMap::new(),
            module_states: HashMap::from([(ship_id.clone(), injected_ship)]),
        };

        let session = GameSession::start_with_state(
            episode,
            ModuleRegistry::standard(),
            store(),
            initial,
        )
        .unwrap();
        let ship_state = session.game_state().module_states.get(&ship_id).unwrap();
        assert_eq!(ship_state["name"], "USS Defiant");
        assert_eq!(session.game_state().flags.get("romulansHostile"), Some(&true));
    }
}
