//! Game state - the full mutable player-progress snapshot for one episode

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::value_objects::ModuleId;

/// A scalar value stored in `GameState.variables`.
///
/// Content authors write plain JSON scalars; comparisons are strict, with no
/// coercion between text and numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// Snapshot of everything a running episode mutates: story flags, scalar
/// variables, and the per-module state blobs.
///
/// The episode session owns the canonical copy. Module live state is a
/// working cache; the copy held here is what gets persisted and what crosses
/// episode boundaries. Each module decodes its own blob, nobody else looks
/// inside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(default)]
    pub flags: HashMap<String, bool>,
    #[serde(default)]
    pub variables: HashMap<String, Scalar>,
    #[serde(default)]
    pub module_states: HashMap<ModuleId, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trips_plain_json() {
        let parsed: Scalar = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, Scalar::Number(42.0));

        let parsed: Scalar = serde_json::from_str("true").unwrap();
        assert_eq!(parsed, Scalar::Bool(true));

        let parsed: Scalar = serde_json::from_str("\"alpha\"").unwrap();
        assert_eq!(parsed, Scalar::Text("alpha".to_string()));
    }

    #[test]
    fn game_state_accepts_missing_sections() {
        let state: GameState = serde_json::from_str("{}").unwrap();
        assert!(state.flags.is_empty());
        assert!(state.variables.is_empty());
        assert!(state.module_states.is_empty());
    }

    #[test]
    fn game_state_uses_interchange_field_names() {
        let mut state = GameState::default();
        state
            .module_states
            .insert(ModuleId::from("ship"), serde_json::json!({}));
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("moduleStates").is_some());
    }
}
