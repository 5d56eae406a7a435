//! Module dispatch vocabulary: actions, effects, results, alerts

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::value_objects::ModuleId;

/// Severity of an alert surfaced to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Info,
    Warning,
    Danger,
    Success,
}

/// One-line status message produced by a module dispatch. The UI shows the
/// most recent one; all of them land in the interaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Warning,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Danger,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Success,
            message: message.into(),
        }
    }
}

/// An instruction from content: dispatch `action` to `module`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAction {
    pub module: ModuleId,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Same shape as [`ModuleAction`] but produced by a dispatch rather than
/// authored in content; the distinction is what makes propagation depth
/// trackable. Field name `moduleId` is fixed by the interchange format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossModuleEffect {
    pub module_id: ModuleId,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl CrossModuleEffect {
    pub fn new(module_id: impl Into<ModuleId>, action: impl Into<String>, payload: Value) -> Self {
        Self {
            module_id: module_id.into(),
            action: action.into(),
            payload: Some(payload),
        }
    }
}

/// Outcome of one recognized module action.
///
/// `state: None` means "unchanged" — callers keep the previous blob. A
/// present state is always a freshly built value, never an alias of the
/// module's live state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleActionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_module_effects: Vec<CrossModuleEffect>,
}
