/// Reads the folder data a course page embeds in an inline script
use super::selectors::SelectorStrategy;
use super::{ExclusionMatch, ExtractionResult, OrphanPolicy, ResultBuilder, VideoRecord};
use crate::config::ExtractionConfig;
use crate::error::{DurationError, Result};
use crate::page::PageHandle;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// `window.folderPage.folder = {...};` as assigned by the folder page
#[derive(Debug, Deserialize)]
struct FolderData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    medias: Option<Vec<FolderMedia>>,
}

#[derive(Debug, Deserialize)]
struct FolderMedia {
    /// Seconds, fractional
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    section: Option<FolderSection>,
}

#[derive(Debug, Deserialize)]
struct FolderSection {
    #[serde(default)]
    name: String,
}

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"window\.folderPage\.folder\s*=\s*").expect("assignment pattern is valid")
    })
}

/// Extraction from embedded folder data rather than the rendered tree
#[derive(Debug, Clone)]
pub struct EmbeddedDataExtractor {
    selectors: SelectorStrategy,
    excluded_sections: Vec<String>,
    exclusion_match: ExclusionMatch,
    orphan_policy: OrphanPolicy,
    default_title: String,
}

impl EmbeddedDataExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            selectors: config.selectors.clone(),
            excluded_sections: config.excluded_sections.clone(),
            exclusion_match: config.exclusion_match,
            orphan_policy: config.orphan_policy,
            default_title: config.default_title.clone(),
        }
    }

    /// `Ok(None)` when the page carries no usable folder data
    pub async fn extract(&self, page: &dyn PageHandle) -> Result<Option<ExtractionResult>> {
        let Some(folder) = self.find_folder(page).await? else {
            debug!("No embedded folder data on page");
            return Ok(None);
        };

        let Some(medias) = folder.medias else {
            let url = page.current_url().await.unwrap_or_default();
            warn!("⚠️ Embedded folder data has no media list");
            return Err(DurationError::NoVideoDataFound { url, sections_seen: 0 });
        };

        if medias.is_empty() {
            let url = page.current_url().await.unwrap_or_default();
            return Err(DurationError::NoVideoDataFound { url, sections_seen: 0 });
        }

        let title = folder
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.default_title.clone());

        let result = self.summarize(title, medias);
        info!(
            "📦 Embedded data: {} videos ({}s) across {} sections",
            result.video_count,
            result.total_seconds,
            result.sections.len()
        );
        Ok(Some(result))
    }

    async fn find_folder(&self, page: &dyn PageHandle) -> Result<Option<FolderData>> {
        for script in page.query(&self.selectors.embedded_data).await? {
            let text = script.text_content().await?;
            if let Some(folder) = parse_folder_assignment(&text) {
                return Ok(Some(folder));
            }
        }
        Ok(None)
    }

    fn summarize(&self, title: String, medias: Vec<FolderMedia>) -> ExtractionResult {
        let any_sectioned = medias.iter().any(|m| m.section.is_some());
        let mut builder = ResultBuilder::default();
        // Fractional seconds of every counted media; rounded once at the end
        let mut raw_total = 0.0;

        for media in medias {
            let seconds = playable_seconds(media.duration.unwrap_or(0.0));
            let video = VideoRecord {
                duration_seconds: rounded_seconds(seconds),
            };
            let name = media
                .section
                .map(|s| s.name.split_whitespace().collect::<Vec<_>>().join(" "));

            match name {
                Some(name) if self.exclusion_match.is_excluded(&name, &self.excluded_sections) => {
                    debug!("Skipping media in excluded section '{}'", name);
                }
                Some(name) if !name.is_empty() => {
                    raw_total += seconds;
                    builder.add_to_section(&name, video);
                }
                _ if any_sectioned && self.orphan_policy == OrphanPolicy::Discard => {
                    debug!("Discarding unsectioned media of {}s", video.duration_seconds);
                }
                _ => {
                    raw_total += seconds;
                    builder.add_unattributed(video);
                }
            }
        }

        debug!(
            "Summarized {} counted medias into {} sections",
            builder.video_count(),
            builder.section_count()
        );
        let mut result = builder.build(title);
        result.total_seconds = rounded_seconds(raw_total);
        result
    }
}

/// Pull the folder object out of a script body, if it assigns one
fn parse_folder_assignment(script: &str) -> Option<FolderData> {
    let found = assignment_pattern().find(script)?;
    let rest = &script[found.end()..];

    match serde_json::Deserializer::from_str(rest)
        .into_iter::<FolderData>()
        .next()
    {
        Some(Ok(folder)) => Some(folder),
        Some(Err(e)) => {
            warn!("⚠️ Embedded folder data is not valid JSON: {}", e);
            None
        }
        None => None,
    }
}

/// Negative and non-finite durations count as zero
fn playable_seconds(duration: f64) -> f64 {
    if duration.is_finite() {
        duration.max(0.0)
    } else {
        0.0
    }
}

fn rounded_seconds(duration: f64) -> u64 {
    playable_seconds(duration).round() as u64
}
