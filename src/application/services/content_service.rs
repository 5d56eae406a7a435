//! Content service - library access and the content lint pass
//!
//! Validation is the last line of defense before content reaches the engine:
//! a dangling scene reference or a missing required module is a content bug
//! that must be caught here, not discovered as undefined behavior mid-play.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;

use crate::application::ports::outbound::ContentSourcePort;
use crate::domain::entities::{Campaign, Episode};
use crate::domain::modules::STANDARD_MODULE_IDS;
use crate::domain::value_objects::{CampaignId, EpisodeId};

/// Why a piece of content was rejected or flagged.
#[derive(Debug, Clone)]
pub struct LintFinding {
    /// `episode:<id>` or `campaign:<id>`.
    pub subject: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Default)]
pub struct LintReport {
    pub episodes: usize,
    pub campaigns: usize,
    pub findings: Vec<LintFinding>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// All reasons this episode is invalid; empty means it is shippable.
pub fn validate_episode(episode: &Episode) -> Vec<String> {
    let mut reasons = Vec::new();

    if episode.id.is_empty() {
        reasons.push("episode id must be a non-empty string".to_string());
    }
    for (value, field) in [
        (&episode.title, "title"),
        (&episode.author, "author"),
        (&episode.description, "description"),
        (&episode.stardate, "stardate"),
        (&episode.ship_name, "shipName"),
    ] {
        if value.trim().is_empty() {
            reasons.push(format!("{field} must be a non-empty string"));
        }
    }

    if episode.scenes.is_empty() {
        reasons.push("episode has no scenes".to_string());
        return reasons;
    }
    if !episode.scenes.keys().any(|id| id.as_str() == "start") {
        reasons.push("episode has no `start` scene".to_string());
    }

    for (scene_id, scene) in &episode.scenes {
        if scene_id != &scene.id {
            reasons.push(format!(
                "scene key `{scene_id}` does not match its id `{}`",
                scene.id
            ));
        }
        for choice in &scene.choices {
            if !episode.scenes.contains_key(&choice.next_scene) {
                reasons.push(format!(
                    "scene `{scene_id}` has a choice leading to undefined scene `{}`",
                    choice.next_scene
                ));
            }
        }
    }

    let known: BTreeSet<&str> = STANDARD_MODULE_IDS.into_iter().collect();
    for module_id in &episode.required_modules {
        if !known.contains(module_id.as_str()) {
            reasons.push(format!("required module `{module_id}` does not exist"));
        }
    }

    reasons
}

/// All reasons this campaign is invalid or ambiguous; empty means shippable.
pub fn validate_campaign(campaign: &Campaign) -> Vec<String> {
    let mut reasons = Vec::new();

    if campaign.id.is_empty() {
        reasons.push("campaign id must be a non-empty string".to_string());
    }
    for (value, field) in [
        (&campaign.title, "title"),
        (&campaign.author, "author"),
        (&campaign.description, "description"),
    ] {
        if value.trim().is_empty() {
            reasons.push(format!("{field} must be a non-empty string"));
        }
    }

    if campaign.episodes.is_empty() {
        reasons.push("campaign has no episodes".to_string());
        return reasons;
    }

    for entry in &campaign.episodes {
        if entry.episode_id.is_empty() {
            reasons.push("campaign episode with empty episodeId".to_string());
        }
        if entry.title.trim().is_empty() {
            reasons.push(format!(
                "campaign episode `{}` has an empty title",
                entry.episode_id
            ));
        }
        if entry.order != 1 && entry.condition.is_none() {
            reasons.push(format!(
                "campaign episode `{}` can never be reached: order {} but no condition",
                entry.episode_id, entry.order
            ));
        }
    }

    if !campaign.episodes.iter().any(|entry| entry.order == 1) {
        reasons.push("campaign has no entry episode with order 1".to_string());
    }

    // Two branches sharing a predecessor and an order are only sound when
    // their conditions are mutually exclusive, which the engine cannot
    // check; flag the pair so authors decide.
    let mut seen: BTreeSet<(String, u32)> = BTreeSet::new();
    for entry in &campaign.episodes {
        let Some(condition) = &entry.condition else {
            continue;
        };
        let key = (condition.previous_episode_id.to_string(), entry.order);
        if !seen.insert(key.clone()) {
            reasons.push(format!(
                "multiple branches follow `{}` with order {}; their conditions must be mutually exclusive",
                key.0, key.1
            ));
        }
    }

    reasons
}

/// Read-side facade over whatever content source is wired in.
pub struct ContentService {
    source: Arc<dyn ContentSourcePort>,
}

impl ContentService {
    pub fn new(source: Arc<dyn ContentSourcePort>) -> Self {
        Self { source }
    }

    pub async fn episodes(&self) -> Result<Vec<Episode>> {
        self.source.list_episodes().await
    }

    pub async fn campaigns(&self) -> Result<Vec<Campaign>> {
        self.source.list_campaigns().await
    }

    pub async fn episode_by_id(&self, episode_id: &EpisodeId) -> Result<Option<Episode>> {
        Ok(self
            .source
            .list_episodes()
            .await?
            .into_iter()
            .find(|episode| &episode.id == episode_id))
    }

    pub async fn campaign_by_id(&self, campaign_id: &CampaignId) -> Result<Option<Campaign>> {
        Ok(self
            .source
            .list_campaigns()
            .await?
            .into_iter()
            .find(|campaign| &campaign.id == campaign_id))
    }

    /// Validate everything the source offers. Content sources already reject
    /// malformed files at load time; this pass catches cross-reference
    /// problems (dangling scenes, ambiguous branches) before shipping.
    pub async fn lint_all(&self) -> Result<LintReport> {
        let episodes = self.source.list_episodes().await?;
        let campaigns = self.source.list_campaigns().await?;

        let mut report = LintReport {
            episodes: episodes.len(),
            campaigns: campaigns.len(),
            findings: Vec::new(),
        };

        for episode in &episodes {
            let reasons = validate_episode(episode);
            if !reasons.is_empty() {
                report.findings.push(LintFinding {
                    subject: format!("episode:{}", episode.id),
                    reasons,
                });
            }
        }
        for campaign in &campaigns {
            let mut reasons = validate_campaign(campaign);
            // Campaign entries must resolve against the installed episodes.
            for entry in &campaign.episodes {
                if !episodes.iter().any(|episode| episode.id == entry.episode_id) {
                    reasons.push(format!(
                        "references episode `{}` which is not installed",
                        entry.episode_id
                    ));
                }
            }
            if !reasons.is_empty() {
                report.findings.push(LintFinding {
                    subject: format!("campaign:{}", campaign.id),
                    reasons,
                });
            }
        }

        Ok(report)
    }
}
