//! Episode entity - a single branching story unit with its own scene graph

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::entities::Scene;
use crate::domain::value_objects::{EpisodeId, ModuleId, SceneId};

/// A self-contained episode. Loaded once at selection time; the module set
/// and per-module config are resolved before the first scene renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: EpisodeId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stardate: String,
    #[serde(default)]
    pub ship_name: String,
    pub scenes: HashMap<SceneId, Scene>,
    /// Subsystems this episode opts into. Modules not listed stay
    /// uninitialized for the whole episode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_modules: Vec<ModuleId>,
    /// Per-module overrides shallow-merged over each module's defaults.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub module_config: HashMap<ModuleId, Value>,
}

impl Episode {
    pub fn scene(&self, id: &SceneId) -> Option<&Scene> {
        self.scenes.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_parses_with_optional_module_sections_absent() {
        let episode: Episode = serde_json::from_value(serde_json::json!({
            "id": "first-contact",
            "title": "First Contact",
            "author": "Starfleet Command",
            "description": "A signal from deep space.",
            "stardate": "48214.5",
            "shipName": "USS Endeavour",
            "scenes": {
                "start": {"id": "start", "title": "Bridge", "text": [], "choices": []}
            }
        }))
        .unwrap();
        assert!(episode.required_modules.is_empty());
        assert!(episode.module_config.is_empty());
        assert!(episode.scene(&SceneId::start()).is_some());
    }
}
