//! Crew module - roster, morale, away teams, and shipboard emergencies

use std::collections::BTreeMap;

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::modules::{
    clamp_percent, decode_state, merge_config, parse_payload, snapshot, GameModule,
};
use crate::domain::value_objects::{Alert, CrossModuleEffect, ModuleActionResult, ModuleId};

const MODULE_ID: &str = "crew";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Command,
    Engineering,
    Science,
    Medical,
    Security,
    Operations,
}

impl Department {
    fn as_str(&self) -> &'static str {
        match self {
            Department::Command => "command",
            Department::Engineering => "engineering",
            Department::Science => "science",
            Department::Medical => "medical",
            Department::Security => "security",
            Department::Operations => "operations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrewStatus {
    Active,
    Injured,
    Critical,
    Deceased,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Alpha,
    Beta,
    Gamma,
}

impl Shift {
    fn as_str(&self) -> &'static str {
        match self {
            Shift::Alpha => "alpha",
            Shift::Beta => "beta",
            Shift::Gamma => "gamma",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencySeverity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrewMember {
    pub id: String,
    pub name: String,
    pub rank: String,
    pub department: Department,
    pub species: String,
    /// 0-100 skill ratings.
    pub skills: BTreeMap<String, i64>,
    pub status: CrewStatus,
    pub morale: i64,
    pub fatigue: i64,
    pub location: String,
    pub tasks: Vec<CrewTask>,
}

impl Default for CrewMember {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            rank: String::new(),
            department: Department::Operations,
            species: "Human".to_string(),
            skills: BTreeMap::new(),
            status: CrewStatus::Active,
            morale: 80,
            fatigue: 0,
            location: "bridge".to_string(),
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrewTask {
    pub id: String,
    pub name: String,
    pub priority: TaskPriority,
    pub progress: i64,
    /// Minutes.
    pub time_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DepartmentStatus {
    pub efficiency: i64,
    pub staffing: i64,
    pub morale: i64,
}

impl Default for DepartmentStatus {
    fn default() -> Self {
        Self {
            efficiency: 90,
            staffing: 90,
            morale: 85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emergency {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub severity: EmergencySeverity,
    pub resolved: bool,
    pub assigned_crew: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShiftRoster {
    pub current: Shift,
    pub schedule: BTreeMap<String, Shift>,
}

impl Default for ShiftRoster {
    fn default() -> Self {
        Self {
            current: Shift::Alpha,
            schedule: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrewState {
    /// Id of the commanding officer.
    pub captain: String,
    pub officers: Vec<CrewMember>,
    pub crew: Vec<CrewMember>,
    pub away_team: Vec<String>,
    pub shifts: ShiftRoster,
    pub department_status: BTreeMap<Department, DepartmentStatus>,
    pub emergencies: Vec<Emergency>,
}

impl Default for CrewState {
    fn default() -> Self {
        let officers = vec![
            officer(
                "picard",
                "Jean-Luc Picard",
                "Captain",
                Department::Command,
                "Human",
                &[
                    ("leadership", 95),
                    ("diplomacy", 90),
                    ("tactics", 85),
                    ("archaeology", 80),
                    ("administration", 88),
                ],
                90,
                10,
                "bridge",
            ),
            officer(
                "riker",
                "William Riker",
                "Commander",
                Department::Command,
                "Human",
                &[
                    ("leadership", 85),
                    ("tactics", 80),
                    ("piloting", 75),
                    ("diplomacy", 70),
                    ("poker", 95),
                ],
                85,
                15,
                "bridge",
            ),
            officer(
                "data",
                "Data",
                "Lieutenant Commander",
                Department::Operations,
                "Android",
                &[
                    ("computing", 100),
                    ("science", 95),
                    ("engineering", 90),
                    ("tactics", 85),
                    ("strength", 100),
                ],
                100,
                0,
                "bridge",
            ),
            officer(
                "laforge",
                "Geordi La Forge",
                "Lieutenant Commander",
                Department::Engineering,
                "Human",
                &[
                    ("engineering", 95),
                    ("warpTheory", 90),
                    ("problemSolving", 85),
                    ("sensors", 90),
                    ("computerSystems", 88),
                ],
                85,
                20,
                "engineering",
            ),
            officer(
                "worf",
                "Worf",
                "Lieutenant",
                Department::Security,
                "Klingon",
                &[
                    ("combat", 95),
                    ("tactics", 90),
                    ("security", 95),
                    ("klingonCulture", 100),
                    ("martialArts", 95),
                ],
                80,
                10,
                "bridge",
            ),
            officer(
                "crusher",
                "Beverly Crusher",
                "Commander",
                Department::Medical,
                "Human",
                &[
                    ("medicine", 95),
                    ("biology", 90),
                    ("research", 85),
                    ("leadership", 80),
                    ("emergency", 92),
                ],
                85,
                25,
                "sickbay",
            ),
            officer(
                "troi",
                "Deanna Troi",
                "Commander",
                Department::Medical,
                "Betazoid/Human",
                &[
                    ("counseling", 95),
                    ("empathy", 95),
                    ("diplomacy", 85),
                    ("psychology", 90),
                ],
                90,
                15,
                "bridge",
            ),
        ];

        let schedule = officers
            .iter()
            .map(|member| (member.id.clone(), Shift::Alpha))
            .collect();

        let department_status = [
            (Department::Command, 90, 100, 85),
            (Department::Engineering, 95, 90, 80),
            (Department::Science, 95, 85, 90),
            (Department::Medical, 90, 85, 85),
            (Department::Security, 95, 90, 80),
            (Department::Operations, 100, 95, 90),
        ]
        .into_iter()
        .map(|(department, efficiency, staffing, morale)| {
            (
                department,
                DepartmentStatus {
                    efficiency,
                    staffing,
                    morale,
                },
            )
        })
        .collect();

        Self {
            captain: "picard".to_string(),
            officers,
            crew: Vec::new(),
            away_team: Vec::new(),
            shifts: ShiftRoster {
                current: Shift::Alpha,
                schedule,
            },
            department_status,
            emergencies: Vec::new(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn officer(
    id: &str,
    name: &str,
    rank: &str,
    department: Department,
    species: &str,
    skills: &[(&str, i64)],
    morale: i64,
    fatigue: i64,
    location: &str,
) -> CrewMember {
    CrewMember {
        id: id.to_string(),
        name: name.to_string(),
        rank: rank.to_string(),
        department,
        species: species.to_string(),
        skills: skills
            .iter()
            .map(|(skill, rating)| (skill.to_string(), *rating))
            .collect(),
        status: CrewStatus::Active,
        morale,
        fatigue,
        location: location.to_string(),
        tasks: Vec::new(),
    }
}

fn members_mut(state: &mut CrewState) -> impl Iterator<Item = &mut CrewMember> + '_ {
    state.officers.iter_mut().chain(state.crew.iter_mut())
}

fn members(state: &CrewState) -> impl Iterator<Item = &CrewMember> + '_ {
    state.officers.iter().chain(state.crew.iter())
}

fn member_names(state: &CrewState, ids: &[String]) -> String {
    members(state)
        .filter(|member| ids.contains(&member.id))
        .map(|member| member.name.clone())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AwayTeamPayload {
    crew_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReturnPayload {
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InjuryPayload {
    #[serde(default)]
    crew_id: Option<String>,
    #[serde(default)]
    department: Option<Department>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    percentage: Option<f64>,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetPayload {
    #[serde(default)]
    crew_id: Option<String>,
    #[serde(default)]
    department: Option<Department>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoralePayload {
    #[serde(default)]
    crew_id: Option<String>,
    #[serde(default)]
    department: Option<Department>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelocatePayload {
    crew_id: String,
    location: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskPayload {
    task: String,
    #[serde(default)]
    crew_id: Option<String>,
    #[serde(default)]
    department: Option<Department>,
    #[serde(default)]
    priority: Option<TaskPriority>,
    #[serde(default)]
    time_remaining: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteTaskPayload {
    task_id: String,
    crew_id: String,
}

#[derive(Debug, Deserialize)]
struct ShiftPayload {
    shift: Shift,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmergencyPayload {
    emergency: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    severity: Option<EmergencySeverity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveEmergencyPayload {
    emergency_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrewParam {
    crew_id: String,
    #[serde(default)]
    skill: Option<String>,
    #[serde(default)]
    level: Option<i64>,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepartmentParam {
    department: Department,
    #[serde(default)]
    level: Option<i64>,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmergencyParam {
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Manages crew members, skills, status, and away teams.
pub struct CrewModule {
    state: Option<CrewState>,
}

impl CrewModule {
    pub fn new() -> Self {
        Self { state: None }
    }

    fn form_away_team(
        state: &mut CrewState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<AwayTeamPayload>(payload) else {
            return;
        };
        state.away_team = payload.crew_ids.clone();

        for member in members_mut(state) {
            if payload.crew_ids.contains(&member.id) {
                member.status = CrewStatus::Away;
                member.location = "away mission".to_string();
            }
        }

        let names = member_names(state, &payload.crew_ids);
        *alert = Some(Alert::info(format!("Away team formed: {names}")));
        effects.push(CrossModuleEffect::new(
            "mission",
            "ADD_LOG_ENTRY",
            json!({"text": format!("Away team deployed: {names}")}),
        ));
    }

    fn return_away_team(
        state: &mut CrewState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let return_location = parse_payload::<ReturnPayload>(payload)
            .and_then(|p| p.location)
            .unwrap_or_else(|| "bridge".to_string());

        let away_team = state.away_team.clone();
        for member in members_mut(state) {
            if away_team.contains(&member.id) {
                if member.status == CrewStatus::Away {
                    member.status = CrewStatus::Active;
                }
                member.location = return_location.clone();
                // Away missions are tiring.
                member.fatigue = clamp_percent(member.fatigue + 15);
            }
        }

        let injured: Vec<String> = members(state)
            .filter(|member| {
                away_team.contains(&member.id)
                    && matches!(member.status, CrewStatus::Injured | CrewStatus::Critical)
            })
            .map(|member| member.id.clone())
            .collect();

        if injured.is_empty() {
            *alert = Some(Alert::success("Away team returned safely"));
            effects.push(CrossModuleEffect::new(
                "mission",
                "ADD_LOG_ENTRY",
                json!({"text": "Away team returned safely"}),
            ));
        } else {
            let names = member_names(state, &injured);
            *alert = Some(Alert::warning(format!(
                "Away team returned with injuries: {names}"
            )));
            effects.push(CrossModuleEffect::new(
                "mission",
                "ADD_LOG_ENTRY",
                json!({"text": format!("Away team returned with injuries: {names}")}),
            ));
        }

        state.away_team.clear();
    }

    fn injure_crew(
        state: &mut CrewState,
        payload: Option<&Value>,
        alert: &mut Option<Alert>,
        effects: &mut Vec<CrossModuleEffect>,
    ) {
        let Some(payload) = parse_payload::<InjuryPayload>(payload) else {
            return;
        };
        let critical = payload.severity.as_deref() == Some("critical");
        let new_status = if critical {
            CrewStatus::Critical
        } else {
            CrewStatus::Injured
        };
        let mut injured_count = 0usize;

        if let Some(crew_id) = &payload.crew_id {
            for member in members_mut(state) {
                if &member.id == crew_id {
                    member.status = new_status;
                    member.morale = clamp_percent(member.morale - 20);
                    injured_count += 1;
                }
            }
        } else if let Some(department) = payload.department {
            let mut rng = rand::thread_rng();
            for member in members_mut(state) {
                if member.department == department && member.status == CrewStatus::Active {
                    let should_injure = match payload.count {
                        Some(count) => injured_count < count,
                        None => rng.gen_bool(payload.percentage.unwrap_or(0.3).clamp(0.0, 1.0)),
                    };
                    if should_injure {
                        member.status = new_status;
                        member.morale = clamp_percent(member.morale - 20);
                        injured_count += 1;
                    }
                }
            }
        }

        if let Some(department) = payload.department {
            if let Some(status) = state.department_status.get_mut(&department) {
                status.efficiency = (status.efficiency - 15).max(50);
            }
        }

        if critical && injured_count > 0 {
            state.emergencies.push(Emergency {
                id: format!("medical-{}", Uuid::new_v4()),
                kind: "medical".to_string(),
                location: payload.location.unwrap_or_else(|| "unknown".to_string()),
                severity: EmergencySeverity::Critical,
                resolved: false,
                assigned_crew: Vec::new(),
            });
            let message = format!("Medical emergency: {injured_count} crew with critical injuries");
            effects.push(CrossModuleEffect::new(
                "mission",
                "ADD_LOG_ENTRY",
                json!({"text": message}),
            ));
            *alert = Some(Alert::danger(message));
        } else if injured_count > 0 {
            *alert = Some(Alert::warning(format!(
                "{injured_count} crew member(s) injured"
            )));
        }
    }

    fn heal_crew(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<TargetPayload>(payload) else {
            return;
        };

        if let Some(crew_id) = &payload.crew_id {
            for member in members_mut(state) {
                if &member.id == crew_id {
                    member.status = CrewStatus::Active;
                    member.morale = clamp_percent(member.morale + 10);
                }
            }
            if let Some(name) = members(state)
                .find(|member| &member.id == crew_id)
                .map(|member| member.name.clone())
            {
                *alert = Some(Alert::success(format!(
                    "{name} has been treated and returned to active duty"
                )));
            }
        } else if let Some(department) = payload.department {
            let mut healed = 0usize;
            for member in members_mut(state) {
                if member.department == department
                    && matches!(member.status, CrewStatus::Injured | CrewStatus::Critical)
                {
                    member.status = CrewStatus::Active;
                    member.morale = clamp_percent(member.morale + 10);
                    healed += 1;
                }
            }
            if healed > 0 {
                *alert = Some(Alert::success(format!(
                    "{healed} crew members from {} department have been treated",
                    department.as_str()
                )));
                if let Some(status) = state.department_status.get_mut(&department) {
                    status.efficiency = clamp_percent(status.efficiency + 10);
                }
            }
        }
    }

    fn boost_morale(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<MoralePayload>(payload) else {
            return;
        };
        let amount = payload.amount.unwrap_or(10);
        let mut affected = 0usize;

        if let Some(crew_id) = &payload.crew_id {
            for member in members_mut(state) {
                if &member.id == crew_id {
                    member.morale = clamp_percent(member.morale + amount);
                    affected += 1;
                }
            }
        } else if let Some(department) = payload.department {
            for member in members_mut(state) {
                if member.department == department {
                    member.morale = clamp_percent(member.morale + amount);
                    affected += 1;
                }
            }
            if let Some(status) = state.department_status.get_mut(&department) {
                status.morale = clamp_percent(status.morale + amount / 2);
            }
        } else {
            for member in members_mut(state) {
                member.morale = clamp_percent(member.morale + amount);
                affected += 1;
            }
            for status in state.department_status.values_mut() {
                status.morale = clamp_percent(status.morale + amount / 2);
            }
        }

        if affected > 0 {
            let direction = if amount >= 0 { "increased" } else { "decreased" };
            let reason = payload
                .reason
                .map(|reason| format!(" ({reason})"))
                .unwrap_or_default();
            let message = format!("Crew morale {direction} for {affected} crew members{reason}");
            *alert = Some(if amount >= 0 {
                Alert::success(message)
            } else {
                Alert::warning(message)
            });
        }
    }

    fn relocate_crew(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<RelocatePayload>(payload) else {
            return;
        };
        for member in members_mut(state) {
            if member.id == payload.crew_id {
                member.location = payload.location.clone();
            }
        }
        if let Some(name) = members(state)
            .find(|member| member.id == payload.crew_id)
            .map(|member| member.name.clone())
        {
            *alert = Some(Alert::info(format!(
                "{name} relocated to {}",
                payload.location
            )));
        }
    }

    fn assign_task(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<TaskPayload>(payload) else {
            return;
        };
        let task = CrewTask {
            id: format!("task-{}", Uuid::new_v4()),
            name: payload.task.clone(),
            priority: payload.priority.unwrap_or(TaskPriority::Medium),
            progress: 0,
            time_remaining: payload.time_remaining.unwrap_or(60),
        };

        if let Some(crew_id) = &payload.crew_id {
            let mut assigned_name = None;
            for member in members_mut(state) {
                if &member.id == crew_id {
                    member.tasks.push(task.clone());
                    assigned_name = Some(member.name.clone());
                }
            }
            if let Some(name) = assigned_name {
                *alert = Some(Alert::info(format!(
                    "Task \"{}\" assigned to {name}",
                    payload.task
                )));
            }
        } else if let Some(department) = payload.department {
            // Least-loaded active member of the department gets the work.
            let selected = members(state)
                .filter(|member| {
                    member.department == department && member.status == CrewStatus::Active
                })
                .min_by_key(|member| member.tasks.len())
                .map(|member| (member.id.clone(), member.name.clone()));

            match selected {
                Some((id, name)) => {
                    for member in members_mut(state) {
                        if member.id == id {
                            member.tasks.push(task.clone());
                        }
                    }
                    *alert = Some(Alert::info(format!(
                        "Task \"{}\" assigned to {name} in {}",
                        payload.task,
                        department.as_str()
                    )));
                }
                None => {
                    *alert = Some(Alert::warning(format!(
                        "No available crew in {} to assign task",
                        department.as_str()
                    )));
                }
            }
        }
    }

    fn complete_task(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<CompleteTaskPayload>(payload) else {
            return;
        };
        let mut completed: Option<(String, String)> = None;
        for member in members_mut(state) {
            if member.id == payload.crew_id {
                if let Some(position) = member
                    .tasks
                    .iter()
                    .position(|task| task.id == payload.task_id)
                {
                    let task = member.tasks.remove(position);
                    member.fatigue = clamp_percent(member.fatigue - 5);
                    member.morale = clamp_percent(member.morale + 5);
                    completed = Some((member.name.clone(), task.name));
                }
            }
        }
        if let Some((name, task)) = completed {
            *alert = Some(Alert::success(format!("{name} completed \"{task}\"")));
        }
    }

    fn change_shift(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<ShiftPayload>(payload) else {
            return;
        };
        let previous = state.shifts.current;
        state.shifts.current = payload.shift;

        let schedule = state.shifts.schedule.clone();
        for member in members_mut(state) {
            match schedule.get(&member.id) {
                Some(shift) if *shift == payload.shift => {
                    // Starting a shift refreshed.
                    member.fatigue = clamp_percent(member.fatigue - 10);
                }
                Some(shift) if *shift == previous => {
                    // Coming off shift tired.
                    member.fatigue = clamp_percent(member.fatigue + 15);
                }
                _ => {}
            }
        }

        *alert = Some(Alert::info(format!(
            "Shift changed from {} to {}",
            previous.as_str(),
            payload.shift.as_str()
        )));
    }

    fn battle_stations(state: &mut CrewState, alert: &mut Option<Alert>) {
        for member in members_mut(state) {
            member.location = match member.department {
                Department::Command => "bridge".to_string(),
                Department::Engineering => "engineering".to_string(),
                Department::Security => {
                    if member.location == "bridge" {
                        "bridge".to_string()
                    } else {
                        "security".to_string()
                    }
                }
                Department::Medical => "sickbay".to_string(),
                _ => member.location.clone(),
            };
            member.fatigue = clamp_percent(member.fatigue + 10);
        }

        if let Some(status) = state.department_status.get_mut(&Department::Security) {
            status.efficiency = clamp_percent(status.efficiency + 10);
        }

        *alert = Some(Alert::danger("All hands to battle stations!"));
    }

    fn emergency_stations(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<EmergencyPayload>(payload) else {
            return;
        };
        let location = payload
            .location
            .unwrap_or_else(|| "unknown".to_string());

        state.emergencies.push(Emergency {
            id: format!("emergency-{}", Uuid::new_v4()),
            kind: payload.emergency.clone(),
            location: location.clone(),
            severity: payload.severity.unwrap_or(EmergencySeverity::Major),
            resolved: false,
            assigned_crew: Vec::new(),
        });

        let department_needed = match payload.emergency.as_str() {
            "hull breach" | "structural" => Department::Engineering,
            "medical" => Department::Medical,
            "security" | "intruder" => Department::Security,
            _ => Department::Operations,
        };

        let assigned: Vec<String> = members(state)
            .filter(|member| {
                member.department == department_needed
                    && member.status == CrewStatus::Active
                    && member.location != "away mission"
            })
            .take(3)
            .map(|member| member.id.clone())
            .collect();

        if assigned.is_empty() {
            *alert = Some(Alert::danger(format!(
                "Emergency: {} in {location}. No available crew to respond!",
                payload.emergency
            )));
            return;
        }

        if let Some(emergency) = state.emergencies.last_mut() {
            emergency.assigned_crew = assigned.clone();
        }
        for member in members_mut(state) {
            if assigned.contains(&member.id) {
                member.location = location.clone();
                member.fatigue = clamp_percent(member.fatigue + 15);
            }
        }

        let names = member_names(state, &assigned);
        *alert = Some(Alert::danger(format!(
            "Emergency: {} in {location}. {names} responding.",
            payload.emergency
        )));
    }

    fn resolve_emergency(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<ResolveEmergencyPayload>(payload) else {
            return;
        };
        let Some(emergency) = state
            .emergencies
            .iter_mut()
            .find(|emergency| emergency.id == payload.emergency_id)
        else {
            return;
        };

        emergency.resolved = true;
        let assigned = emergency.assigned_crew.clone();
        let kind = emergency.kind.clone();

        for member in members_mut(state) {
            if assigned.contains(&member.id) {
                member.location = match member.department {
                    Department::Command => "bridge".to_string(),
                    Department::Engineering => "engineering".to_string(),
                    Department::Medical => "sickbay".to_string(),
                    Department::Security => "security".to_string(),
                    _ => "main deck".to_string(),
                };
                member.morale = clamp_percent(member.morale + 5);
            }
        }

        *alert = Some(Alert::success(format!("Emergency resolved: {kind}")));
    }

    fn rest_crew(state: &mut CrewState, payload: Option<&Value>, alert: &mut Option<Alert>) {
        let Some(payload) = parse_payload::<TargetPayload>(payload) else {
            return;
        };

        if let Some(crew_id) = &payload.crew_id {
            for member in members_mut(state) {
                if &member.id == crew_id {
                    member.fatigue = clamp_percent(member.fatigue - 30);
                    member.morale = clamp_percent(member.morale + 5);
                }
            }
            if let Some(name) = members(state)
                .find(|member| &member.id == crew_id)
                .map(|member| member.name.clone())
            {
                *alert = Some(Alert::info(format!("{name} has rested and recovered.")));
            }
        } else if let Some(department) = payload.department {
            for member in members_mut(state) {
                if member.department == department {
                    member.fatigue = clamp_percent(member.fatigue - 20);
                    member.morale = clamp_percent(member.morale + 3);
                }
            }
            if let Some(status) = state.department_status.get_mut(&department) {
                status.efficiency = clamp_percent(status.efficiency + 5);
            }
            *alert = Some(Alert::success(format!(
                "{} department crew have been given rest rotation.",
                department.as_str()
            )));
        }
    }
}

impl GameModule for CrewModule {
    fn id(&self) -> ModuleId {
        ModuleId::from(MODULE_ID)
    }

    fn name(&self) -> &'static str {
        "Crew Management"
    }

    fn description(&self) -> &'static str {
        "Manages crew members, skills, status, and away teams"
    }

    fn initialize(&mut self, config: Option<&Value>) -> Result<Value> {
        let defaults = serde_json::to_value(CrewState::default())?;
        let state: CrewState = decode_state(MODULE_ID, merge_config(defaults, config))?;
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
        let mut alert = None;
        let mut effects = Vec::new();

        match action {
            "FORM_AWAY_TEAM" => Self::form_away_team(state, payload, &mut alert, &mut effects),
            "RETURN_AWAY_TEAM" => Self::return_away_team(state, payload, &mut alert, &mut effects),
            "INJURE_CREW" => Self::injure_crew(state, payload, &mut alert, &mut effects),
            "HEAL_CREW" => Self::heal_crew(state, payload, &mut alert),
            "BOOST_MORALE" => Self::boost_morale(state, payload, &mut alert),
            "RELOCATE_CREW" => Self::relocate_crew(state, payload, &mut alert),
            "ASSIGN_TASK" => Self::assign_task(state, payload, &mut alert),
            "COMPLETE_TASK" => Self::complete_task(state, payload, &mut alert),
            "CHANGE_SHIFT" => Self::change_shift(state, payload, &mut alert),
            "BATTLE_STATIONS" => Self::battle_stations(state, &mut alert),
            "EMERGENCY_STATIONS" => Self::emergency_stations(state, payload, &mut alert),
            "RESOLVE_EMERGENCY" => Self::resolve_emergency(state, payload, &mut alert),
            "REST_CREW" => Self::rest_crew(state, payload, &mut alert),
            _ => return None,
        }

        Some(ModuleActionResult {
            state: snapshot(MODULE_ID, state),
            alert,
            cross_module_effects: effects,
        })
    }

    fn check_condition(&self, condition: &str, params: Option<&Value>) -> bool {
        let Some(state) = self.state.as_ref() else {
            return false;
        };
        let find = |id: &str| members(state).find(|member| member.id == id);

        match condition {
            "CREW_AVAILABLE" => parse_payload::<CrewParam>(params)
                .and_then(|p| find(&p.crew_id).map(|m| m.status == CrewStatus::Active))
                .unwrap_or(false),
            "CREW_INJURED" => parse_payload::<CrewParam>(params)
                .and_then(|p| {
                    find(&p.crew_id).map(|m| {
                        matches!(m.status, CrewStatus::Injured | CrewStatus::Critical)
                    })
                })
                .unwrap_or(false),
            "ON_AWAY_MISSION" => parse_payload::<CrewParam>(params)
                .map(|p| state.away_team.contains(&p.crew_id))
                .unwrap_or(false),
            "HAS_SKILL" => parse_payload::<CrewParam>(params)
                .and_then(|p| {
                    let member = find(&p.crew_id)?;
                    let skill = p.skill?;
                    let rating = member.skills.get(&skill)?;
                    Some(*rating >= p.level.unwrap_or(0))
                })
                .unwrap_or(false),
            "MORALE_ABOVE" => parse_payload::<CrewParam>(params)
                .and_then(|p| {
                    let member = find(&p.crew_id)?;
                    Some(member.morale >= p.level?)
                })
                .unwrap_or(false),
            "DEPARTMENT_EFFICIENCY_ABOVE" => parse_payload::<DepartmentParam>(params)
                .and_then(|p| {
                    let status = state.department_status.get(&p.department)?;
                    Some(status.efficiency >= p.level?)
                })
                .unwrap_or(false),
            "IN_LOCATION" => parse_payload::<CrewParam>(params)
                .and_then(|p| {
                    let member = find(&p.crew_id)?;
                    Some(member.location == p.location?)
                })
                .unwrap_or(false),
            "DEPARTMENT_AVAILABLE" => parse_payload::<DepartmentParam>(params)
                .map(|p| {
                    let active = members(state)
                        .filter(|member| {
                            member.department == p.department
                                && member.status == CrewStatus::Active
                        })
                        .count();
                    active >= p.count.unwrap_or(1)
                })
                .unwrap_or(false),
            "HAS_EMERGENCY" => {
                let kind = parse_payload::<EmergencyParam>(params).and_then(|p| p.kind);
                state.emergencies.iter().any(|emergency| {
                    !emergency.resolved
                        && kind
                            .as_ref()
                            .map(|kind| &emergency.kind == kind)
                            .unwrap_or(true)
                })
            }
            "FATIGUE_BELOW" => parse_payload::<CrewParam>(params)
                .and_then(|p| {
                    let member = find(&p.crew_id)?;
                    Some(member.fatigue < p.level?)
                })
                .unwrap_or(false),
            _ => false,
        }
    }
}
