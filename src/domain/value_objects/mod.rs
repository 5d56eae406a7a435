//! Value objects - Immutable objects defined by their attributes

mod condition;
mod game_state;
mod ids;
mod module_action;

pub use condition::{Condition, ModuleCondition, NumericRange, VariableConstraint};
pub use game_state::{GameState, Scalar};
pub use ids::{CampaignId, EpisodeId, ModuleId, SceneId};
pub use module_action::{Alert, AlertKind, CrossModuleEffect, ModuleAction, ModuleActionResult};
