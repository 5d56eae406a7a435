//! Application services - Use case implementations
//!
//! Each service covers one engine concern: condition evaluation, effect
//! propagation, episode sessions, campaign sequencing, and content access.
//! Services depend on ports and domain types only.

pub mod campaign_service;
pub mod condition_service;
pub mod content_service;
pub mod effect_service;
pub mod session_service;

pub use campaign_service::{CampaignAdvance, CampaignError, CampaignService};
pub use content_service::{ContentService, LintFinding, LintReport};
pub use effect_service::{EffectPropagator, ModuleInteraction, PropagationOutcome};
pub use session_service::{ChoiceOutcome, GameSession, SessionError};
