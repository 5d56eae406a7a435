//! Scene entity - one narrative beat with display text and outgoing choices

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Condition, ModuleAction, Scalar, SceneId};

/// A scene in an episode's branching graph. Immutable content once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub title: String,
    /// Narrative paragraphs, displayed in order.
    #[serde(default)]
    pub text: Vec<String>,
    /// Outgoing edges. A scene authored with zero choices is an ending;
    /// that judgement is always made on this list, never on the currently
    /// available subset.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl Scene {
    pub fn is_ending(&self) -> bool {
        self.choices.is_empty()
    }
}

/// A player-selectable edge: where it leads and what it does on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub text: String,
    pub next_scene: SceneId,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub set_flags: HashMap<String, bool>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub set_variables: HashMap<String, Scalar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub module_actions: Vec<ModuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ending_is_judged_on_authored_choices() {
        let scene: Scene = serde_json::from_value(serde_json::json!({
            "id": "finale",
            "title": "Epilogue",
            "text": ["The ship holds orbit."],
            "choices": []
        }))
        .unwrap();
        assert!(scene.is_ending());
    }

    #[test]
    fn choice_parses_interchange_shape() {
        let choice: Choice = serde_json::from_value(serde_json::json!({
            "text": "Raise shields",
            "nextScene": "standoff",
            "setFlags": {"shieldsRaised": true},
            "moduleActions": [{"module": "ship", "action": "RAISE_SHIELDS"}]
        }))
        .unwrap();
        assert_eq!(choice.next_scene.as_str(), "standoff");
        assert_eq!(choice.set_flags.get("shieldsRaised"), Some(&true));
        assert_eq!(choice.module_actions.len(), 1);
        assert!(choice.condition.is_none());
    }
}
