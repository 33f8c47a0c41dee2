/// Course extraction pipeline
///
/// Stabilize the page, reveal lazily-loaded content, then walk the rendered
/// tree to recover the Section → Video hierarchy and sum its durations.

pub mod time;
pub mod selectors;
pub mod stabilize;
pub mod reveal;
pub mod hierarchy;
pub mod embedded;

// Re-export main types
pub use embedded::EmbeddedDataExtractor;
pub use hierarchy::HierarchicalExtractor;
pub use reveal::{ContentRevealer, RevealReport};
pub use selectors::SelectorStrategy;
pub use stabilize::{StabilizationDetector, StabilizationState};
pub use time::{parse_duration, try_parse_duration};

use serde::{Deserialize, Serialize};

/// Placeholder title used when the page has no prominent heading
pub const DEFAULT_COURSE_TITLE: &str = "Untitled Course";

/// Section names never counted toward totals unless configured otherwise
pub const EXCLUDED_SECTIONS: [&str; 3] = ["0.0 Course Preview", "Working Source Files", "Archive"];

/// A single video marker found during one extraction pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoRecord {
    pub duration_seconds: u64,
}

/// Per-section totals from one extraction pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub name: String,
    pub video_count: u32,
    pub total_duration_seconds: u64,
}

impl SectionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            video_count: 0,
            total_duration_seconds: 0,
        }
    }

    pub fn add(&mut self, video: VideoRecord) {
        self.video_count += 1;
        self.total_duration_seconds += video.duration_seconds;
    }
}

/// Outcome of one successful extraction pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub course_title: String,
    pub total_seconds: u64,
    pub video_count: u32,
    pub sections: Vec<SectionRecord>,
}

impl ExtractionResult {
    /// Sum of the per-section durations
    pub fn sectioned_seconds(&self) -> u64 {
        self.sections.iter().map(|s| s.total_duration_seconds).sum()
    }

    /// Sum of the per-section video counts
    pub fn sectioned_videos(&self) -> u32 {
        self.sections.iter().map(|s| s.video_count).sum()
    }
}

/// Accumulates videos into sections while keeping pipeline totals
#[derive(Debug, Default)]
pub(crate) struct ResultBuilder {
    sections: Vec<SectionRecord>,
    total_seconds: u64,
    video_count: u32,
}

impl ResultBuilder {
    /// Ensure a record exists for `name`, keeping first-appearance order
    pub(crate) fn section(&mut self, name: &str) -> &mut SectionRecord {
        let position = match self.sections.iter().position(|s| s.name == name) {
            Some(position) => position,
            None => {
                self.sections.push(SectionRecord::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[position]
    }

    pub(crate) fn add_to_section(&mut self, name: &str, video: VideoRecord) {
        self.section(name).add(video);
        self.add_unattributed(video);
    }

    /// Count toward the totals without surfacing a section
    pub(crate) fn add_unattributed(&mut self, video: VideoRecord) {
        self.total_seconds += video.duration_seconds;
        self.video_count += 1;
    }

    pub(crate) fn video_count(&self) -> u32 {
        self.video_count
    }

    pub(crate) fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub(crate) fn build(self, course_title: String) -> ExtractionResult {
        ExtractionResult {
            course_title,
            total_seconds: self.total_seconds,
            video_count: self.video_count,
            sections: self.sections,
        }
    }
}

/// How section names are compared against the excluded set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionMatch {
    /// Name equals an excluded entry
    Exact,
    /// Name contains an excluded entry
    Substring,
}

impl ExclusionMatch {
    pub fn is_excluded(&self, name: &str, excluded: &[String]) -> bool {
        match self {
            ExclusionMatch::Exact => excluded.iter().any(|entry| entry == name),
            ExclusionMatch::Substring => excluded
                .iter()
                .any(|entry| !entry.is_empty() && name.contains(entry.as_str())),
        }
    }
}

/// What to do with a video found outside every recognized section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Count toward totals under the empty-string section, not surfaced
    Count,
    Discard,
}

/// Which extraction strategy a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategyKind {
    /// Walk the rendered tree
    Dom,
    /// Read the folder data embedded in an inline script
    Embedded,
    /// Embedded data when present, otherwise the rendered tree
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excluded() -> Vec<String> {
        EXCLUDED_SECTIONS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_exclusion() {
        let excluded = excluded();
        assert!(ExclusionMatch::Exact.is_excluded("Working Source Files", &excluded));
        assert!(!ExclusionMatch::Exact.is_excluded("Working Source Files (zip)", &excluded));
        assert!(!ExclusionMatch::Exact.is_excluded("working source files", &excluded));
    }

    #[test]
    fn test_substring_exclusion() {
        let excluded = excluded();
        assert!(ExclusionMatch::Substring.is_excluded("Working Source Files (zip)", &excluded));
        assert!(ExclusionMatch::Substring.is_excluded("2019 Archive", &excluded));
        assert!(!ExclusionMatch::Substring.is_excluded("1.0 Getting Started", &excluded));
    }

    #[test]
    fn test_builder_keeps_first_appearance_order() {
        let mut builder = ResultBuilder::default();
        builder.add_to_section("B", VideoRecord { duration_seconds: 10 });
        builder.add_to_section("A", VideoRecord { duration_seconds: 20 });
        builder.add_to_section("B", VideoRecord { duration_seconds: 5 });
        builder.section("C");
        builder.add_unattributed(VideoRecord { duration_seconds: 7 });

        let result = builder.build("Course".to_string());
        let names: Vec<_> = result.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert_eq!(result.sections[0].video_count, 2);
        assert_eq!(result.sections[0].total_duration_seconds, 15);
        assert_eq!(result.sections[2].video_count, 0);
        assert_eq!(result.total_seconds, 42);
        assert_eq!(result.video_count, 4);
        assert_eq!(result.sectioned_seconds(), 35);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ExtractionResult {
            course_title: "Course".to_string(),
            total_seconds: 60,
            video_count: 1,
            sections: vec![SectionRecord {
                name: "Intro".to_string(),
                video_count: 1,
                total_duration_seconds: 60,
            }],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["courseTitle"], "Course");
        assert_eq!(json["totalSeconds"], 60);
        assert_eq!(json["sections"][0]["totalDurationSeconds"], 60);
    }
}
