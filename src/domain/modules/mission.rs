//! Mission module - objectives, progress tracking, and the mission log

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::modules::{decode_state, merge_config, parse_payload, snapshot, GameModule};
use crate::domain::value_objects::{ModuleActionResult, ModuleId};

const MODULE_ID: &str = "mission";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionObjective {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub optional: bool,
    /// Hidden objectives exist from the start but are revealed later.
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: MissionStatus,
    #[serde(default)]
    pub objectives: Vec<MissionObjective>,
    #[serde(default)]
    pub progress: i64,
}

impl Mission {
    /// Progress over required (non-optional) objectives; a mission with only
    /// optional objectives counts as fully progressed.
    fn recompute_progress(&mut self) {
        let required = self.objectives.iter().filter(|o| !o.optional).count();
        if required == 0 {
            self.progress = 100;
            return;
        }
        let completed = self
            .objectives
            .iter()
            .filter(|o| !o.optional && o.completed)
            .count();
        self.progress = (completed * 100 / required) as i64;
    }

    fn all_required_completed(&self) -> bool {
        self.objectives.iter().all(|o| o.optional || o.completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionLogEntry {
    /// Milliseconds since the epoch, matching the interchange format.
    pub timestamp: i64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MissionState {
    pub current_mission: Option<Mission>,
    pub secondary_missions: Vec<Mission>,
    pub mission_log: Vec<MissionLogEntry>,
}

impl MissionState {
    fn log(&mut self, text: impl Into<String>) {
        self.mission_log.push(MissionLogEntry {
            timestamp: Utc::now().timestamp_millis(),
            text: text.into(),
        });
    }
}

#[derive(Debug, Deserialize)]
struct MissionPayload {
    mission: Mission,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectivePayload {
    objective_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MissionIdPayload {
    mission_id: String,
}

#[derive(Debug, Deserialize)]
struct LogPayload {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MissionParam {
    #[serde(default)]
    mission_id: Option<String>,
    #[serde(default)]
    objective_id: Option<String>,
    #[serde(default)]
    threshold: Option<i64>,
}

/// Manages mission objectives, progress, and logs.
pub struct MissionModule {
    state: Option<MissionState>,
}

impl MissionModule {
    pub fn new() -> Self {
        Self { state: None }
    }

    fn start_mission(state: &mut MissionState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<MissionPayload>(payload) else {
            return;
        };
        let mut mission = payload.mission;
        mission.status = MissionStatus::Active;
        mission.progress = 0;
        let title = mission.title.clone();
        state.current_mission = Some(mission);
        state.log(format!("Mission started: {title}"));
    }

    fn start_secondary_mission(state: &mut MissionState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<MissionPayload>(payload) else {
            return;
        };
        let mut mission = payload.mission;
        mission.status = MissionStatus::Active;
        mission.progress = 0;
        let title = mission.title.clone();
        state.secondary_missions.push(mission);
        state.log(format!("Secondary mission started: {title}"));
    }

    fn complete_objective(state: &mut MissionState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<ObjectivePayload>(payload) else {
            return;
        };

        let mut log_lines = Vec::new();

        if let Some(mission) = state.current_mission.as_mut() {
            if complete_in(mission, &payload.objective_id, false, &mut log_lines) {
                for line in log_lines {
                    state.log(line);
                }
                return;
            }
        }

        for mission in state.secondary_missions.iter_mut() {
            if complete_in(mission, &payload.objective_id, true, &mut log_lines) {
                break;
            }
        }
        for line in log_lines {
            state.log(line);
        }
    }

    fn fail_mission(state: &mut MissionState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<MissionIdPayload>(payload) else {
            return;
        };

        if let Some(mission) = state
            .current_mission
            .as_mut()
            .filter(|mission| mission.id == payload.mission_id)
        {
            mission.status = MissionStatus::Failed;
            let title = mission.title.clone();
            state.log(format!("Mission failed: {title}"));
            return;
        }

        if let Some(mission) = state
            .secondary_missions
            .iter_mut()
            .find(|mission| mission.id == payload.mission_id)
        {
            mission.status = MissionStatus::Failed;
            let title = mission.title.clone();
            state.log(format!("Secondary mission failed: {title}"));
        }
    }

    fn reveal_objective(state: &mut MissionState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<ObjectivePayload>(payload) else {
            return;
        };

        if let Some(mission) = state.current_mission.as_mut() {
            if let Some(objective) = mission
                .objectives
                .iter_mut()
                .find(|objective| objective.id == payload.objective_id)
            {
                objective.hidden = false;
                let description = objective.description.clone();
                state.log(format!("New objective: {description}"));
                return;
            }
        }

        let mut revealed = None;
        for mission in state.secondary_missions.iter_mut() {
            if let Some(objective) = mission
                .objectives
                .iter_mut()
                .find(|objective| objective.id == payload.objective_id)
            {
                objective.hidden = false;
                revealed = Some(objective.description.clone());
                break;
            }
        }
        if let Some(description) = revealed {
            state.log(format!("New secondary objective: {description}"));
        }
    }

    fn add_log_entry(state: &mut MissionState, payload: Option<&Value>) {
        if let Some(payload) = parse_payload::<LogPayload>(payload) {
            state.log(payload.text);
        }
    }
}

/// Complete one objective inside a mission, collecting the log lines the
/// change produces. Returns whether the objective belonged to this mission.
fn complete_in(
    mission: &mut Mission,
    objective_id: &str,
    secondary: bool,
    log_lines: &mut Vec<String>,
) -> bool {
    let Some(objective) = mission
        .objectives
        .iter_mut()
        .find(|objective| objective.id == objective_id)
    else {
        return false;
    };

    objective.completed = true;
    let description = objective.description.clone();
    mission.recompute_progress();

    if mission.all_required_completed() {
        mission.status = MissionStatus::Completed;
        log_lines.push(if secondary {
            format!("Secondary mission completed: {}", mission.title)
        } else {
            format!("Mission completed: {}", mission.title)
        });
    }
    log_lines.push(format!("Objective completed: {description}"));
    true
}

impl GameModule for MissionModule {
    fn id(&self) -> ModuleId {
        ModuleId::from(MODULE_ID)
    }

    fn name(&self) -> &'static str {
        "Mission System"
    }

    fn description(&self) -> &'static str {
        "Manages mission objectives, progress, and logs"
    }

    fn initialize(&mut self, config: Option<&Value>) -> Result<Value> {
        let defaults = serde_json::to_value(MissionState::default())?;
        let state: MissionState = decode_state(MODULE_ID, merge_config(defaults, config))?;
        let snapshot = serde_json::to_value(&state)?;
        self.state = Some(state);
        Ok(snapshot)
    }

    fn state(&self) -> Option<Value> {
        self.state.as_ref().and_then(|state| snapshot(MODULE_ID, state))
    }

    fn set_state(&mut self, state: Value) -> Result<()> {
        self.state = Some(decode_state(MODULE_ID, state)?);
        Ok(())
    }

    fn handle_action(
        &mut self,
        action: &str,
        payload: Option<&Value>,
    ) -> Option<ModuleActionResult> {
        let state = self.state.as_mut()?;

        match action {
            "START_MISSION" => Self::start_mission(state, payload),
            "START_SECONDARY_MISSION" => Self::start_secondary_mission(state, payload),
            "COMPLETE_OBJECTIVE" => Self::complete_objective(state, payload),
            "FAIL_MISSION" => Self::fail_mission(state, payload),
            "REVEAL_OBJECTIVE" => Self::reveal_objective(state, payload),
            "ADD_LOG_ENTRY" => Self::add_log_entry(state, payload),
            _ => return None,
        }

        Some(ModuleActionResult {
            state: snapshot(MODULE_ID, state),
            alert: None,
            cross_module_effects: Vec::new(),
        })
    }

    fn check_condition(&self, condition: &str, params: Option<&Value>) -> bool {
        let Some(state) = self.state.as_ref() else {
            return false;
        };
        let Some(params) = parse_payload::<MissionParam>(params) else {
            return false;
        };

        match condition {
            "MISSION_ACTIVE" => params
                .mission_id
                .map(|mission_id| mission_has_status(state, &mission_id, MissionStatus::Active))
                .unwrap_or(false),
            "MISSION_COMPLETED" => params
                .mission_id
                .map(|mission_id| mission_has_status(state, &mission_id, MissionStatus::Completed))
                .unwrap_or(false),
            "OBJECTIVE_COMPLETED" => params
                .objective_id
                .and_then(|objective_id| {
                    missions(state)
                        .flat_map(|mission| mission.objectives.iter())
                        .find(|objective| objective.id == objective_id)
                        .map(|objective| objective.completed)
                })
                .unwrap_or(false),
            "MISSION_PROGRESS_ABOVE" => match (params.mission_id, params.threshold) {
                (Some(mission_id), Some(threshold)) => missions(state)
                    .find(|mission| mission.id == mission_id)
                    .map(|mission| mission.progress >= threshold)
                    .unwrap_or(false),
                _ => false,
            },
            _ => false,
        }
    }
}

fn missions(state: &MissionState) -> impl Iterator<Item = &Mission> + '_ {
    state
        .current_mission
        .iter()
        .chain(state.secondary_missions.iter())
}

fn mission_has_status(state: &MissionState, mission_id: &str, status: MissionStatus) -> bool {
    missions(state)
        .find(|mission| mission.id == mission_id)
        .map(|mission| mission.status == status)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn neutral_zone_mission() -> Value {
        json!({
            "mission": {
                "id": "neutral-zone-investigation",
                "title": "Neutral Zone Investigation",
                "description": "Investigate a distress signal without provoking an incident.",
                "status": "active",
                "objectives": [
                    {"id": "locate-signal", "description": "Locate the source of the distress signal", "completed": false, "optional": false, "hidden": false},
                    {"id": "scan-debris", "description": "Scan the debris field for survivors", "completed": false, "optional": false, "hidden": true},
                    {"id": "extra-credit", "description": "Catalog the nebula", "completed": false, "optional": true, "hidden": false}
                ],
                "progress": 0
            }
        })
    }

    fn initialized() -> MissionModule {
        let mut module = MissionModule::new();
        module.initialize(None).unwrap();
        module
    }

    #[test]
    fn starting_a_mission_logs_it() {
        let mut module = initialized();
        let result = module
            .handle_action("START_MISSION", Some(&neutral_zone_mission()))
            .unwrap();
        let state = result.state.unwrap();
        assert_eq!(state["currentMission"]["status"], "active");
        assert_eq!(
            state["missionLog"][0]["text"],
            "Mission started: Neutral Zone Investigation"
        );
        assert!(module.check_condition(
            "MISSION_ACTIVE",
            Some(&json!({"missionId": "neutral-zone-investigation"}))
        ));
    }

    #[test]
    fn progress_counts_required_objectives_only() {
        let mut module = initialized();
        module
            .handle_action("START_MISSION", Some(&neutral_zone_mission()))
            .unwrap();
        module
            .handle_action("COMPLETE_OBJECTIVE", Some(&json!({"objectiveId": "locate-signal"})))
            .unwrap();

        let state = module.state().unwrap();
        assert_eq!(state["currentMission"]["progress"], 50);
        assert!(module.check_condition(
            "MISSION_PROGRESS_ABOVE",
            Some(&json!({"missionId": "neutral-zone-investigation", "threshold": 50}))
        ));
        assert!(!module.check_condition(
            "MISSION_COMPLETED",
            Some(&json!({"missionId": "neutral-zone-investigation"}))
        ));

        module
            .handle_action("COMPLETE_OBJECTIVE", Some(&json!({"objectiveId": "scan-debris"})))
            .unwrap();
        assert!(module.check_condition(
            "MISSION_COMPLETED",
            Some(&json!({"missionId": "neutral-zone-investigation"}))
        ));
    }

    #[test]
    fn reveal_makes_a_hidden_objective_visible_and_logs_it() {
        let mut module = initialized();
        module
            .handle_action("START_MISSION", Some(&neutral_zone_mission()))
            .unwrap();
        let result = module
            .handle_action("REVEAL_OBJECTIVE", Some(&json!({"objectiveId": "scan-debris"})))
            .unwrap();
        let state = result.state.unwrap();
        assert_eq!(state["currentMission"]["objectives"][1]["hidden"], false);
        let log = state["missionLog"].as_array().unwrap();
        assert!(log
            .iter()
            .any(|entry| entry["text"].as_str().unwrap().starts_with("New objective")));
    }

    #[test]
    fn fail_mission_marks_primary_or_secondary() {
        let mut module = initialized();
        module
            .handle_action("START_MISSION", Some(&neutral_zone_mission()))
            .unwrap();
        module
            .handle_action(
                "FAIL_MISSION",
                Some(&json!({"missionId": "neutral-zone-investigation"})),
            )
            .unwrap();
        let state = module.state().unwrap();
        assert_eq!(state["currentMission"]["status"], "failed");
    }

    #[test]
    fn log_entries_accumulate() {
        let mut module = initialized();
        module
            .handle_action("ADD_LOG_ENTRY", Some(&json!({"text": "Entering the Neutral Zone"})))
            .unwrap();
        module
            .handle_action("ADD_LOG_ENTRY", Some(&json!({"text": "Shields raised"})))
            .unwrap();
        let state = module.state().unwrap();
        assert_eq!(state["missionLog"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn unknown_action_returns_none() {
        let mut module = initialized();
        assert!(module.handle_action("ABANDON_SHIP", None).is_none());
    }
}
