//! Strongly-typed identifiers for content entities
//!
//! Episode, scene, campaign, and module ids are author-chosen strings that
//! travel verbatim through the JSON interchange format, so these wrap
//! `String` rather than a generated UUID.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(EpisodeId);
define_id!(SceneId);
define_id!(CampaignId);
define_id!(ModuleId);

impl SceneId {
    /// Scene every episode enters through unless a saved state says otherwise.
    pub fn start() -> Self {
        Self::from("start")
    }
}
