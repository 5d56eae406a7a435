//! Filesystem content source
//!
//! Reads pretty-printed JSON content from `<content_dir>/episodes/*.json`
//! and `<content_dir>/campaigns/*.json` — the canonical interchange layout,
//! so episodes authored for other builds of the game load unchanged. Files
//! are validated on load; invalid ones are rejected with per-file reasons
//! and never reach the engine. When two files claim the same id, the later
//! one in filename order wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::outbound::ContentSourcePort;
use crate::application::services::content_service::{validate_campaign, validate_episode};
use crate::domain::entities::{Campaign, Episode};

/// A file the source refused to load, with every reason why.
#[derive(Debug)]
pub struct RejectedFile {
    pub path: PathBuf,
    pub reasons: Vec<String>,
}

/// Everything a directory scan produced.
#[derive(Debug, Default)]
pub struct ContentScan {
    pub episodes: Vec<Episode>,
    pub campaigns: Vec<Campaign>,
    pub rejected: Vec<RejectedFile>,
}

pub struct FsContentSource {
    content_dir: PathBuf,
}

impl FsContentSource {
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        Self {
            content_dir: content_dir.into(),
        }
    }

    /// Scan the content directory, validating every file. Missing
    /// subdirectories simply mean an empty library.
    pub async fn scan(&self) -> Result<ContentScan> {
        let mut scan = ContentScan::default();

        let mut episodes: BTreeMap<String, Episode> = BTreeMap::new();
        for path in json_files(&self.content_dir.join("episodes")).await? {
            match load_json::<Episode>(&path).await {
                Ok(episode) => {
                    let reasons = validate_episode(&episode);
                    if reasons.is_empty() {
                        if episodes
                            .insert(episode.id.to_string(), episode)
                            .is_some()
                        {
                            tracing::debug!(path = %path.display(),
                                "episode replaces an earlier file with the same id");
                        }
                    } else {
                        scan.rejected.push(RejectedFile { path, reasons });
                    }
                }
                Err(error) => scan.rejected.push(RejectedFile {
                    path,
                    reasons: vec![error.to_string()],
                }),
            }
        }

        let mut campaigns: BTreeMap<String, Campaign> = BTreeMap::new();
        for path in json_files(&self.content_dir.join("campaigns")).await? {
            match load_json::<Campaign>(&path).await {
                Ok(campaign) => {
                    let reasons = validate_campaign(&campaign);
                    if reasons.is_empty() {
                        campaigns.insert(campaign.id.to_string(), campaign);
                    } else {
                        scan.rejected.push(RejectedFile { path, reasons });
                    }
                }
                Err(error) => scan.rejected.push(RejectedFile {
                    path,
                    reasons: vec![error.to_string()],
                }),
            }
        }

        scan.episodes = episodes.into_values().collect();
        scan.campaigns = campaigns.into_values().collect();
        Ok(scan)
    }
}

async fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return Ok(files),
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to scan {}", dir.display()))?
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[async_trait]
impl ContentSourcePort for FsContentSource {
    async fn list_episodes(&self) -> Result<Vec<Episode>> {
        let scan = self.scan().await?;
        warn_rejected(&scan);
        Ok(scan.episodes)
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let scan = self.scan().await?;
        warn_rejected(&scan);
        Ok(scan.campaigns)
    }
}

fn warn_rejected(scan: &ContentScan) {
    for rejected in &scan.rejected {
        tracing::warn!(path = %rejected.path.display(), reasons = ?rejected.reasons,
            "rejected content file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn episode_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": "First Contact",
            "author": "Starfleet Command",
            "description": "A mysterious signal.",
            "stardate": "48214.5",
            "shipName": "USS Endeavour",
            "scenes": {
                "start": {
                    "id": "start",
                    "title": "Bridge",
                    "text": ["A signal crackles across subspace."],
                    "choices": [
                        {"text": "Answer it", "nextScene": "end"}
                    ]
                },
                "end": {"id": "end", "title": "Resolution", "text": [], "choices": []}
            }
        })
    }

    async fn write_content(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, content).await.unwrap();
    }

    #[tokio::test]
    async fn scan_loads_valid_and_rejects_invalid_with_reasons() {
        let dir = tempfile::tempdir().unwrap();
        write_content(
            dir.path(),
            "episodes/first-contact.json",
            &episode_json("first-contact").to_string(),
        )
        .await;

        // Dangling scene reference: rejected, not loaded.
        let mut broken = episode_json("broken");
        broken["scenes"]["start"]["choices"][0]["nextScene"] = json!("nowhere");
        write_content(dir.path(), "episodes/broken.json", &broken.to_string()).await;

        // Not JSON at all.
        write_content(dir.path(), "episodes/garbage.json", "{ not json").await;

        let source = FsContentSource::new(dir.path());
        let scan = source.scan().await.unwrap();

        assert_eq!(scan.episodes.len(), 1);
        assert_eq!(scan.episodes[0].id.as_str(), "first-contact");
        assert_eq!(scan.rejected.len(), 2);

        let episodes = source.list_episodes().await.unwrap();
        assert_eq!(episodes.len(), 1);
    }

    #[tokio::test]
    async fn missing_directories_mean_an_empty_library() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsContentSource::new(dir.path().join("does-not-exist"));
        let scan = source.scan().await.unwrap();
        assert!(scan.episodes.is_empty());
        assert!(scan.campaigns.is_empty());
        assert!(scan.rejected.is_empty());
    }

    #[tokio::test]
    async fn later_file_with_same_id_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut original = episode_json("first-contact");
        original["title"] = json!("Original Cut");
        write_content(
            dir.path(),
            "episodes/a-original.json",
            &original.to_string(),
        )
        .await;

        let mut revised = episode_json("first-contact");
        revised["title"] = json!("Revised Cut");
        write_content(dir.path(), "episodes/b-revised.json", &revised.to_string()).await;

        let source = FsContentSource::new(dir.path());
        let scan = source.scan().await.unwrap();
        assert_eq!(scan.episodes.len(), 1);
        assert_eq!(scan.episodes[0].title, "Revised Cut");
    }

    #[tokio::test]
    async fn campaigns_load_from_their_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        let campaign = json!({
            "id": "crisis",
            "title": "Federation Crisis",
            "author": "Starfleet Command",
            "description": "A chained story.",
            "episodes": [
                {"episodeId": "first-contact", "title": "First Contact", "order": 1}
            ]
        });
        write_content(dir.path(), "campaigns/crisis.json", &campaign.to_string()).await;

        let source = FsContentSource::new(dir.path());
        let campaigns = source.list_campaigns().await.unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].id.as_str(), "crisis");
    }
}
