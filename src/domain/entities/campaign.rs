//! Campaign entities - ordered, conditionally-branching episode sequences

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{CampaignId, EpisodeId, GameState, VariableConstraint};

/// A campaign chains episodes under one continuous game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub episodes: Vec<CampaignEpisode>,
}

impl Campaign {
    pub fn entry(&self, episode_id: &EpisodeId) -> Option<&CampaignEpisode> {
        self.episodes.iter().find(|entry| &entry.episode_id == episode_id)
    }
}

/// One slot in a campaign. `order` is a grouping key, not a unique index:
/// mutually exclusive branches share an order value and differ only in their
/// conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignEpisode {
    pub episode_id: EpisodeId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<CampaignCondition>,
    /// Overlay applied to the carried game state when entering this episode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<GameState>,
}

/// Gate deciding whether a campaign episode follows the one just finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCondition {
    pub previous_episode_id: EpisodeId,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub flags: HashMap<String, bool>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, VariableConstraint>,
}

/// Where a player is in a campaign. Created on first start, updated on every
/// episode transition, deleted only by an explicit progress reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignProgress {
    pub campaign_id: CampaignId,
    pub current_episode_id: Option<EpisodeId>,
    #[serde(default)]
    pub completed_episodes: Vec<EpisodeId>,
    pub game_state: GameState,
    pub timestamp: DateTime<Utc>,
}

impl CampaignProgress {
    pub fn new(campaign_id: CampaignId, game_state: GameState) -> Self {
        Self {
            campaign_id,
            current_episode_id: None,
            completed_episodes: Vec::new(),
            game_state,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_parses_branching_entries() {
        let campaign: Campaign = serde_json::from_value(serde_json::json!({
            "id": "federation-crisis",
            "title": "Federation Crisis",
            "author": "Starfleet Command",
            "description": "A growing crisis.",
            "episodes": [
                {"episodeId": "first-contact", "title": "First Contact", "order": 1},
                {
                    "episodeId": "diplomatic-mission",
                    "title": "Diplomatic Mission",
                    "order": 2,
                    "condition": {
                        "previousEpisodeId": "first-contact",
                        "flags": {"peacefulResolution": true}
                    },
                    "initialState": {"flags": {"romulansCooperative": true}}
                }
            ]
        }))
        .unwrap();

        assert_eq!(campaign.episodes.len(), 2);
        let branch = campaign.entry(&EpisodeId::from("diplomatic-mission")).unwrap();
        let condition = branch.condition.as_ref().unwrap();
        assert_eq!(condition.previous_episode_id.as_str(), "first-contact");
        assert_eq!(condition.flags.get("peacefulResolution"), Some(&true));
        assert!(branch.initial_state.is_some());
    }
}
