//! Game modules - pluggable simulation subsystems
//!
//! Five structurally unrelated domain blobs (ship systems, crew roster,
//! inventory, mission tracker, federation database) unified by one
//! four-method contract. The scene layer never sees module internals; it
//! dispatches named actions and asks named questions, and each module decodes
//! its own opaque state blob on its side of the boundary.

mod crew;
mod inventory;
mod mission;
mod registry;
mod ship;

pub use crew::{CrewMember, CrewModule, CrewState, CrewStatus};
pub use inventory::{InventoryItem, InventoryModule, InventoryState};
pub use mission::{Mission, MissionModule, MissionState, MissionStatus};
pub use registry::{RegistryEntry, RegistryModule, RegistryState};
pub use ship::{ShipModule, ShipState, SystemStatus};

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::domain::value_objects::{ModuleActionResult, ModuleId};

/// Ids of the built-in modules, in registry order.
pub const STANDARD_MODULE_IDS: [&str; 5] = ["ship", "crew", "inventory", "mission", "registry"];

/// Uniform contract every module implements.
pub trait GameModule: Send + Sync {
    fn id(&self) -> ModuleId;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Build the module's default state, shallow-merge `config` over it
    /// (config wins on key collision), store it as the live state, and
    /// return a snapshot. Calling this again resets the module; nothing
    /// accumulates across initializations.
    fn initialize(&mut self, config: Option<&Value>) -> Result<Value>;

    /// Snapshot of the live state, `None` before initialization.
    fn state(&self) -> Option<Value>;

    /// Replace the live state wholesale; used when restoring a session from
    /// persistence.
    fn set_state(&mut self, state: Value) -> Result<()>;

    /// Execute one named action. `None` means the action name is not
    /// recognized by this module — the caller must treat that as a no-op,
    /// not a failure. Recognized actions always return a result whose
    /// `state`, when present, is a freshly built snapshot.
    fn handle_action(&mut self, action: &str, payload: Option<&Value>)
        -> Option<ModuleActionResult>;

    /// Pure predicate over the current state. Unknown condition names
    /// return `false` (fail-closed); must not mutate.
    fn check_condition(&self, condition: &str, params: Option<&Value>) -> bool;
}

/// The set of module instances available to a session.
///
/// Constructed once at process start and handed to each session; sessions
/// initialize only the subset their episode requires.
pub struct ModuleRegistry {
    modules: BTreeMap<ModuleId, Box<dyn GameModule>>,
}

impl ModuleRegistry {
    /// Registry with the five built-in modules.
    pub fn standard() -> Self {
        let mut modules: BTreeMap<ModuleId, Box<dyn GameModule>> = BTreeMap::new();
        let all: [Box<dyn GameModule>; 5] = [
            Box::new(ShipModule::new()),
            Box::new(CrewModule::new()),
            Box::new(InventoryModule::new()),
            Box::new(MissionModule::new()),
            Box::new(RegistryModule::new()),
        ];
        for module in all {
            modules.insert(module.id(), module);
        }
        Self { modules }
    }

    /// Plug an additional module in, replacing any module with the same id.
    pub fn register(&mut self, module: Box<dyn GameModule>) {
        self.modules.insert(module.id(), module);
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> + '_ {
        self.modules.keys()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&dyn GameModule> {
        self.modules.get(id).map(|module| module.as_ref())
    }

    pub fn get_mut(&mut self, id: &ModuleId) -> Option<&mut (dyn GameModule + 'static)> {
        self.modules.get_mut(id).map(|module| module.as_mut())
    }

    /// Initialize exactly the modules an episode requires, seeding each with
    /// its entry from `config` when present. Modules not listed stay
    /// untouched and absent from the returned state map.
    pub fn initialize_modules(
        &mut self,
        required: &[ModuleId],
        config: &HashMap<ModuleId, Value>,
    ) -> Result<HashMap<ModuleId, Value>> {
        let mut states = HashMap::new();
        for id in required {
            let Some(module) = self.modules.get_mut(id) else {
                tracing::warn!(module = %id, "episode requires a module that is not registered");
                continue;
            };
            let state = module.initialize(config.get(id))?;
            states.insert(id.clone(), state);
        }
        Ok(states)
    }
}

/// Shallow-merge a config object over a defaults object; config wins on key
/// collision. Non-object configs leave the defaults untouched.
pub(crate) fn merge_config(defaults: Value, config: Option<&Value>) -> Value {
    match (defaults, config) {
        (Value::Object(mut base), Some(Value::Object(overrides))) => {
            for (key, value) in overrides {
                base.insert(key.clone(), value.clone());
            }
            Value::Object(base)
        }
        (base, _) => base,
    }
}

pub(crate) fn decode_state<T: DeserializeOwned>(module: &str, state: Value) -> Result<T> {
    serde_json::from_value(state).with_context(|| format!("invalid state for module `{module}`"))
}

pub(crate) fn snapshot<T: Serialize>(module: &str, state: &T) -> Option<Value> {
    match serde_json::to_value(state) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::error!(module, %error, "failed to snapshot module state");
            None
        }
    }
}

pub(crate) fn parse_payload<T: DeserializeOwned>(payload: Option<&Value>) -> Option<T> {
    payload.and_then(|value| serde_json::from_value(value.clone()).ok())
}

/// Percentage-like fields stay inside `[0, 100]` on every write.
pub(crate) fn clamp_percent(value: i64) -> i64 {
    value.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_holds_the_five_modules() {
        let registry = ModuleRegistry::standard();
        for id in STANDARD_MODULE_IDS {
            assert!(registry.contains(&ModuleId::from(id)), "missing {id}");
        }
        assert_eq!(registry.ids().count(), 5);
    }

    #[test]
    fn initialize_modules_covers_only_the_required_subset() {
        let mut registry = ModuleRegistry::standard();
        let states = registry
            .initialize_modules(&[ModuleId::from("crew")], &HashMap::new())
            .unwrap();
        assert_eq!(states.len(), 1);
        assert!(states.contains_key(&ModuleId::from("crew")));

        let states = registry
            .initialize_modules(
                &[ModuleId::from("crew"), ModuleId::from("ship")],
                &HashMap::new(),
            )
            .unwrap();
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn initialize_modules_skips_unknown_ids() {
        let mut registry = ModuleRegistry::standard();
        let states = registry
            .initialize_modules(&[ModuleId::from("holodeck")], &HashMap::new())
            .unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn reinitializing_resets_rather_than_accumulates() {
        let mut registry = ModuleRegistry::standard();
        let crew_id = ModuleId::from("crew");
        let first = registry
            .initialize_modules(std::slice::from_ref(&crew_id), &HashMap::new())
            .unwrap();

        // Knock morale down, then re-initialize and expect the default state back.
        let module = registry.get_mut(&crew_id).unwrap();
        let result = module
            .handle_action(
                "BOOST_MORALE",
                Some(&serde_json::json!({"amount": -40})),
            )
            .unwrap();
        assert!(result.state.is_some());

        let second = registry
            .initialize_modules(std::slice::from_ref(&crew_id), &HashMap::new())
            .unwrap();
        assert_eq!(first.get(&crew_id), second.get(&crew_id));
    }

    #[test]
    fn merge_config_is_shallow_and_config_wins() {
        let defaults = serde_json::json!({"name": "USS Enterprise", "class": "Galaxy"});
        let merged = merge_config(
            defaults,
            Some(&serde_json::json!({"name": "USS Endeavour"})),
        );
        assert_eq!(merged["name"], "USS Endeavour");
        assert_eq!(merged["class"], "Galaxy");
    }
}
