//! Registry module - the in-universe Federation database

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::modules::{decode_state, merge_config, parse_payload, snapshot, GameModule};
use crate::domain::value_objects::{ModuleActionResult, ModuleId};

const MODULE_ID: &str = "registry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryCategory {
    Species,
    Starship,
    Planet,
    Technology,
    Artifact,
    Person,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    pub category: EntryCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Whether the player has uncovered this entry yet.
    #[serde(default)]
    pub discovered: bool,
    #[serde(default)]
    pub classified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryState {
    pub entries: Vec<RegistryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<String>,
}

impl Default for RegistryState {
    fn default() -> Self {
        let entries = vec![
            entry(
                "human",
                "Human",
                EntryCategory::Species,
                "Native to Earth, humans are founding members of the United Federation of Planets.",
                &[
                    ("homeworld", "Earth"),
                    ("quadrant", "Alpha"),
                    ("lifespan", "120 years"),
                    ("government", "United Earth Government"),
                ],
            ),
            entry(
                "vulcan",
                "Vulcan",
                EntryCategory::Species,
                "Founding members of the Federation known for their logical thinking and suppression of emotions.",
                &[
                    ("homeworld", "Vulcan"),
                    ("quadrant", "Alpha"),
                    ("lifespan", "200+ years"),
                    ("government", "Vulcan High Command"),
                ],
            ),
            entry(
                "klingon",
                "Klingon",
                EntryCategory::Species,
                "Warrior species with a strong sense of honor and tradition.",
                &[
                    ("homeworld", "Qo'noS"),
                    ("quadrant", "Beta"),
                    ("lifespan", "150 years"),
                    ("government", "Klingon High Council"),
                ],
            ),
            entry(
                "romulan",
                "Romulan",
                EntryCategory::Species,
                "Secretive and cunning species that split from Vulcan society thousands of years ago.",
                &[
                    ("homeworld", "Romulus"),
                    ("quadrant", "Beta"),
                    ("lifespan", "200+ years"),
                    ("government", "Romulan Star Empire"),
                ],
            ),
            entry(
                "enterprise-d",
                "USS Enterprise NCC-1701-D",
                EntryCategory::Starship,
                "Galaxy-class starship and flagship of the Federation.",
                &[
                    ("class", "Galaxy"),
                    ("registry", "NCC-1701-D"),
                    ("crew", "1,014"),
                    ("launched", "2363"),
                    ("captain", "Jean-Luc Picard"),
                ],
            ),
            entry(
                "warp-drive",
                "Warp Drive",
                EntryCategory::Technology,
                "Propulsion system that allows faster-than-light travel.",
                &[
                    ("inventor", "Zefram Cochrane"),
                    ("year", "2063"),
                    ("maxSpeed", "Warp 9.975 (Federation standard)"),
                ],
            ),
        ];

        Self {
            entries,
            last_accessed: None,
        }
    }
}

fn entry(
    id: &str,
    name: &str,
    category: EntryCategory,
    description: &str,
    details: &[(&str, &str)],
) -> RegistryEntry {
    RegistryEntry {
        id: id.to_string(),
        name: name.to_string(),
        category,
        description: description.to_string(),
        details: details
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect(),
        image_url: None,
        discovered: true,
        classified: false,
    }
}

#[derive(Debug, Deserialize)]
struct AddEntryPayload {
    entry: RegistryEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryIdPayload {
    entry_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateEntryPayload {
    entry_id: String,
    updates: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryParam {
    #[serde(default)]
    entry_id: Option<String>,
    #[serde(default)]
    category: Option<EntryCategory>,
}

/// Access to the Federation database of species, technology, and more.
pub struct RegistryModule {
    state: Option<RegistryState>,
}

impl RegistryModule {
    pub fn new() -> Self {
        Self { state: None }
    }

    fn add_entry(state: &mut RegistryState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<AddEntryPayload>(payload) else {
            return;
        };
        match state
            .entries
            .iter_mut()
            .find(|entry| entry.id == payload.entry.id)
        {
            Some(existing) => *existing = payload.entry,
            None => state.entries.push(payload.entry),
        }
    }

    fn discover_entry(state: &mut RegistryState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<EntryIdPayload>(payload) else {
            return;
        };
        if let Some(entry) = state
            .entries
            .iter_mut()
            .find(|entry| entry.id == payload.entry_id)
        {
            entry.discovered = true;
        }
    }

    fn access_entry(state: &mut RegistryState, payload: Option<&Value>) {
        if let Some(payload) = parse_payload::<EntryIdPayload>(payload) {
            state.last_accessed = Some(payload.entry_id);
        }
    }

    fn update_entry(state: &mut RegistryState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<UpdateEntryPayload>(payload) else {
            return;
        };
        let Some(position) = state
            .entries
            .iter()
            .position(|entry| entry.id == payload.entry_id)
        else {
            return;
        };

        // Field-level patch: merge the updates object over the serialized
        // entry, then decode it back. Unknown fields are dropped.
        let Ok(current) = serde_json::to_value(&state.entries[position]) else {
            return;
        };
        let patched = merge_config(current, Some(&payload.updates));
        if let Ok(updated) = serde_json::from_value::<RegistryEntry>(patched) {
            state.entries[position] = updated;
        }
    }

    fn declassify_entry(state: &mut RegistryState, payload: Option<&Value>) {
        let Some(payload) = parse_payload::<EntryIdPayload>(payload) else {
            return;
        };
        if let Some(entry) = state
            .entries
            .iter_mut()
            .find(|entry| entry.id == payload.entry_id && entry.classified)
        {
            entry.classified = false;
        }
    }
}

impl GameModule for RegistryModule {
    fn id(&self) -> ModuleId {
        ModuleId::from(MODULE_ID)
    }

    fn name(&self) -> &'static str {
        "Federation Database"
    }

    fn description(&self) -> &'static str {
        "Access to the Federation database of species, technology, and more"
    }

    fn initialize(&mut self, config: Option<&Value>) -> Result<Value> {
        let defaults = serde_json::to_value(RegistryState::default())?;
        let state: RegistryState = decode_state(MODULE_ID, merge_config(defaults, config))?;
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
            "ADD_ENTRY" => Self::add_entry(state, payload),
            "DISCOVER_ENTRY" => Self::discover_entry(state, payload),
            "ACCESS_ENTRY" => Self::access_entry(state, payload),
            "UPDATE_ENTRY" => Self::update_entry(state, payload),
            "DECLASSIFY_ENTRY" => Self::declassify_entry(state, payload),
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
        let Some(params) = parse_payload::<EntryParam>(params) else {
            return false;
        };
        let find = |entry_id: &str| state.entries.iter().find(|entry| entry.id == entry_id);

        match condition {
            "ENTRY_DISCOVERED" => params
                .entry_id
                .and_then(|entry_id| find(&entry_id).map(|entry| entry.discovered))
                .unwrap_or(false),
            "ENTRY_EXISTS" => params
                .entry_id
                .map(|entry_id| find(&entry_id).is_some())
                .unwrap_or(false),
            "ENTRY_CLASSIFIED" => params
                .entry_id
                .and_then(|entry_id| find(&entry_id).map(|entry| entry.classified))
                .unwrap_or(false),
            "HAS_ENTRIES_IN_CATEGORY" => params
                .category
                .map(|category| {
                    state
                        .entries
                        .iter()
                        .any(|entry| entry.category == category && entry.discovered)
                })
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> RegistryModule {
        let mut module = RegistryModule::new();
        module.initialize(None).unwrap();
        module
    }

    #[test]
    fn undiscovered_entries_stay_hidden_until_discovered() {
        let mut module = initialized();
        module
            .handle_action(
                "ADD_ENTRY",
                Some(&json!({
                    "entry": {
                        "id": "warbird-wreck",
                        "name": "Derelict Warbird",
                        "category": "starship",
                        "description": "Wreck drifting near the Neutral Zone.",
                        "discovered": false,
                        "classified": true,
                    }
                })),
            )
            .unwrap();

        assert!(module.check_condition("ENTRY_EXISTS", Some(&json!({"entryId": "warbird-wreck"}))));
        assert!(!module
            .check_condition("ENTRY_DISCOVERED", Some(&json!({"entryId": "warbird-wreck"}))));

        module
            .handle_action("DISCOVER_ENTRY", Some(&json!({"entryId": "warbird-wreck"})))
            .unwrap();
        assert!(module
            .check_condition("ENTRY_DISCOVERED", Some(&json!({"entryId": "warbird-wreck"}))));
    }

    #[test]
    fn declassify_clears_the_flag() {
        let mut module = initialized();
        module
            .handle_action(
                "ADD_ENTRY",
                Some(&json!({
                    "entry": {
                        "id": "tal-shiar",
                        "name": "Tal Shiar",
                        "category": "event",
                        "discovered": true,
                        "classified": true,
                    }
                })),
            )
            .unwrap();
        assert!(module.check_condition("ENTRY_CLASSIFIED", Some(&json!({"entryId": "tal-shiar"}))));

        module
            .handle_action("DECLASSIFY_ENTRY", Some(&json!({"entryId": "tal-shiar"})))
            .unwrap();
        assert!(!module.check_condition("ENTRY_CLASSIFIED", Some(&json!({"entryId": "tal-shiar"}))));
    }

    #[test]
    fn update_patches_fields_in_place() {
        let mut module = initialized();
        module
            .handle_action(
                "UPDATE_ENTRY",
                Some(&json!({
                    "entryId": "warp-drive",
                    "updates": {"description": "FTL propulsion via subspace distortion."}
                })),
            )
            .unwrap();
        let state = module.state().unwrap();
        let entry = state["entries"]
            .as_array()
            .unwrap()
            .iter()
            .find(|entry| entry["id"] == "warp-drive")
            .unwrap();
        assert_eq!(entry["description"], "FTL propulsion via subspace distortion.");
        assert_eq!(entry["name"], "Warp Drive");
    }

    #[test]
    fn category_condition_requires_a_discovered_entry() {
        let module = initialized();
        assert!(module
            .check_condition("HAS_ENTRIES_IN_CATEGORY", Some(&json!({"category": "species"}))));
        assert!(!module
            .check_condition("HAS_ENTRIES_IN_CATEGORY", Some(&json!({"category": "planet"}))));
    }

    #[test]
    fn access_tracks_last_entry() {
        let mut module = initialized();
        let result = module
            .handle_action("ACCESS_ENTRY", Some(&json!({"entryId": "klingon"})))
            .unwrap();
        assert_eq!(result.state.unwrap()["lastAccessed"], "klingon");
    }
}
