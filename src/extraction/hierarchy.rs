/// Recovers the Section → Video hierarchy from a rendered folder page
use super::selectors::SelectorStrategy;
use super::time::{is_clock_text, parse_duration, strip_label};
use super::{ExclusionMatch, ExtractionResult, OrphanPolicy, ResultBuilder, VideoRecord};
use crate::config::ExtractionConfig;
use crate::error::{DurationError, Result};
use crate::page::{ElementHandle, ElementId, PageHandle, SelectorSpec};
use std::collections::HashSet;
use tracing::{debug, info};

/// Walks the rendered tree of a stabilized, fully revealed page
#[derive(Debug, Clone)]
pub struct HierarchicalExtractor {
    selectors: SelectorStrategy,
    excluded_sections: Vec<String>,
    exclusion_match: ExclusionMatch,
    orphan_policy: OrphanPolicy,
    time_labels: Vec<String>,
    default_title: String,
}

/// Bookkeeping for one extraction pass
#[derive(Default)]
struct Pass {
    builder: ResultBuilder,
    /// Duration elements already attributed to a section (excluded ones included)
    claimed: HashSet<ElementId>,
    /// Containers already read
    containers: HashSet<ElementId>,
    /// Clock-bearing elements seen anywhere, counted or not
    markers_seen: usize,
}

impl HierarchicalExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            selectors: config.selectors.clone(),
            excluded_sections: config.excluded_sections.clone(),
            exclusion_match: config.exclusion_match,
            orphan_policy: config.orphan_policy,
            time_labels: config.time_labels.clone(),
            default_title: config.default_title.clone(),
        }
    }

    /// Extract exactly one result, or `NoVideoDataFound` when the page has no video markers
    pub async fn extract(&self, page: &dyn PageHandle) -> Result<ExtractionResult> {
        let course_title = self.course_title(page).await?;
        let headers = page.query(&self.selectors.section_header).await?;
        debug!("Found {} section headers", headers.len());

        let mut pass = Pass::default();

        for header in &headers {
            self.read_section(header.as_ref(), &mut pass).await?;
        }

        self.read_orphans(page, &mut pass).await?;

        if pass.markers_seen == 0 {
            let url = page.current_url().await.unwrap_or_default();
            return Err(DurationError::NoVideoDataFound {
                url,
                sections_seen: headers.len(),
            });
        }

        let result = pass.builder.build(course_title);
        info!(
            "📚 Extracted {} videos ({}s) across {} sections from '{}'",
            result.video_count,
            result.total_seconds,
            result.sections.len(),
            result.course_title
        );
        Ok(result)
    }

    async fn course_title(&self, page: &dyn PageHandle) -> Result<String> {
        for heading in page.query(&self.selectors.title).await? {
            let title = collapse_whitespace(&heading.text_content().await?);
            if !title.is_empty() {
                return Ok(title);
            }
        }
        debug!("No course heading found, using '{}'", self.default_title);
        Ok(self.default_title.clone())
    }

    async fn read_section(&self, header: &dyn ElementHandle, pass: &mut Pass) -> Result<()> {
        let name = collapse_whitespace(&header.text_content().await?);

        let container = match header
            .closest_ancestor(&self.selectors.section_container)
            .await?
        {
            Some(container) => container,
            None => {
                debug!("Section header '{}' has no container, using its parent", name);
                let Some(parent) = header.closest_ancestor(&SelectorSpec::from("*")).await? else {
                    debug!("Section header '{}' has no parent, skipping", name);
                    return Ok(());
                };
                parent
            }
        };

        if !pass.containers.insert(container.id()) {
            debug!("Container for '{}' already read", name);
            return Ok(());
        }

        let videos = self.videos_in(container.as_ref(), pass).await?;

        if self.exclusion_match.is_excluded(&name, &self.excluded_sections) {
            info!("🚫 Skipping excluded section '{}' ({} videos)", name, videos.len());
            return Ok(());
        }

        if name.is_empty() {
            debug!("Unnamed section with {} videos treated as unattributed", videos.len());
            for video in videos {
                self.add_orphan(video, pass);
            }
            return Ok(());
        }

        pass.builder.section(&name);
        for video in videos {
            pass.builder.add_to_section(&name, video);
        }
        debug!("Section '{}' read", name);
        Ok(())
    }

    /// Claim and parse every unclaimed duration element inside `container`
    async fn videos_in(
        &self,
        container: &dyn ElementHandle,
        pass: &mut Pass,
    ) -> Result<Vec<VideoRecord>> {
        let mut videos = Vec::new();
        for element in container.query(&self.selectors.video_duration).await? {
            if !pass.claimed.insert(element.id()) {
                continue;
            }
            if let Some(video) = self.parse_marker(element.as_ref()).await? {
                pass.markers_seen += 1;
                videos.push(video);
            }
        }
        Ok(videos)
    }

    /// Duration elements that no recognized section claimed
    async fn read_orphans(&self, page: &dyn PageHandle, pass: &mut Pass) -> Result<()> {
        for element in page.query(&self.selectors.video_duration).await? {
            if pass.claimed.contains(&element.id()) {
                continue;
            }
            if let Some(video) = self.parse_marker(element.as_ref()).await? {
                pass.markers_seen += 1;
                self.add_orphan(video, pass);
            }
        }
        Ok(())
    }

    fn add_orphan(&self, video: VideoRecord, pass: &mut Pass) {
        match self.orphan_policy {
            OrphanPolicy::Count => pass.builder.add_unattributed(video),
            OrphanPolicy::Discard => {
                debug!("Discarding unattributed video of {}s", video.duration_seconds)
            }
        }
    }

    async fn parse_marker(&self, element: &dyn ElementHandle) -> Result<Option<VideoRecord>> {
        let text = element.text_content().await?;
        let clock = strip_label(&text, &self.time_labels);
        if !is_clock_text(clock) {
            debug!("Ignoring non-clock duration text: {:?}", text.trim());
            return Ok(None);
        }
        Ok(Some(VideoRecord {
            duration_seconds: parse_duration(clock),
        }))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SnapshotPage;

    const COURSE: &str = r#"
        <html><body>
          <h1>  Advanced Rust Course </h1>
          <section class="folder-section">
            <h2 class="folder-section-title">0.0 Course Preview</h2>
            <span class="media-duration">2:00</span>
          </section>
          <section class="folder-section">
            <h2 class="folder-section-title">1.0 Getting Started</h2>
            <div class="media"><span class="media-duration">4:05</span></div>
            <div class="media"><span class="media-duration">Duration: 10:00</span></div>
            <div class="media"><span class="media-duration">coming soon</span></div>
          </section>
          <section class="folder-section">
            <h2 class="folder-section-title">2.0 Ownership</h2>
            <div class="media"><span class="media-duration">1:02:03</span></div>
          </section>
          <section class="folder-section">
            <h2 class="folder-section-title">Working Source Files</h2>
            <span class="media-duration">0:30</span>
          </section>
          <section class="folder-section">
            <h2 class="folder-section-title">3.0 Empty Section</h2>
          </section>
        </body></html>
    "#;

    fn extractor() -> HierarchicalExtractor {
        HierarchicalExtractor::new(&ExtractionConfig::default())
    }

    #[tokio::test]
    async fn test_extracts_sections_and_totals() {
        let page = SnapshotPage::from_html(COURSE);
        let result = extractor().extract(&page).await.unwrap();

        assert_eq!(result.course_title, "Advanced Rust Course");
        assert_eq!(result.video_count, 3);
        assert_eq!(result.total_seconds, 245 + 600 + 3723);

        let names: Vec<_> = result.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["1.0 Getting Started", "2.0 Ownership", "3.0 Empty Section"]);
        assert_eq!(result.sections[0].video_count, 2);
        assert_eq!(result.sections[0].total_duration_seconds, 845);
        assert_eq!(result.sections[2].video_count, 0);

        assert_eq!(result.total_seconds, result.sectioned_seconds());
        assert_eq!(result.video_count, result.sectioned_videos());
    }

    #[tokio::test]
    async fn test_substring_exclusion_mode() {
        let page = SnapshotPage::from_html(COURSE);
        let config = ExtractionConfig {
            excluded_sections: vec!["Preview".to_string(), "Source".to_string()],
            exclusion_match: ExclusionMatch::Substring,
            ..ExtractionConfig::default()
        };

        let result = HierarchicalExtractor::new(&config).extract(&page).await.unwrap();
        assert_eq!(result.video_count, 3);
        assert!(result.sections.iter().all(|s| !s.name.contains("Preview")));

        // The same entries match nothing in exact mode
        let exact = ExtractionConfig {
            exclusion_match: ExclusionMatch::Exact,
            ..config
        };
        let result = HierarchicalExtractor::new(&exact).extract(&page).await.unwrap();
        assert_eq!(result.video_count, 5);
    }

    #[tokio::test]
    async fn test_orphan_policy() {
        let html = r#"
            <html><body>
              <h1>Course</h1>
              <section class="folder-section">
                <h2 class="folder-section-title">Intro</h2>
                <span class="media-duration">1:00</span>
              </section>
              <div class="loose"><span class="media-duration">2:00</span></div>
            </body></html>
        "#;
        let page = SnapshotPage::from_html(html);

        let counted = extractor().extract(&page).await.unwrap();
        assert_eq!(counted.video_count, 2);
        assert_eq!(counted.total_seconds, 180);
        assert_eq!(counted.sections.len(), 1);
        assert_eq!(counted.sectioned_seconds(), 60);

        let config = ExtractionConfig {
            orphan_policy: OrphanPolicy::Discard,
            ..ExtractionConfig::default()
        };
        let discarded = HierarchicalExtractor::new(&config).extract(&page).await.unwrap();
        assert_eq!(discarded.video_count, 1);
        assert_eq!(discarded.total_seconds, 60);
    }

    #[tokio::test]
    async fn test_no_markers_is_an_error() {
        let page = SnapshotPage::from_html(
            "<html><body><section class='folder-section'><h2 class='folder-section-title'>Intro</h2></section></body></html>",
        );
        let err = extractor().extract(&page).await.unwrap_err();
        assert!(matches!(
            err,
            DurationError::NoVideoDataFound { sections_seen: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_only_excluded_videos_yield_zero_count() {
        let page = SnapshotPage::from_html(
            r#"<html><body><section class="folder-section">
                 <h2 class="folder-section-title">Archive</h2>
                 <span class="media-duration">5:00</span>
               </section></body></html>"#,
        );
        let result = extractor().extract(&page).await.unwrap();
        assert_eq!(result.video_count, 0);
        assert!(result.sections.is_empty());
    }

    #[tokio::test]
    async fn test_default_title_and_merged_sections() {
        let html = r#"
            <html><body>
              <section class="folder-section">
                <h2 class="folder-section-title">Intro</h2>
                <span class="media-duration">1:00</span>
              </section>
              <section class="folder-section">
                <h2 class="folder-section-title">Intro</h2>
                <span class="media-duration">0:30</span>
              </section>
            </body></html>
        "#;
        let result = extractor()
            .extract(&SnapshotPage::from_html(html))
            .await
            .unwrap();

        assert_eq!(result.course_title, "Untitled Course");
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].video_count, 2);
        assert_eq!(result.sections[0].total_duration_seconds, 90);
    }

    #[tokio::test]
    async fn test_repeated_extraction_is_identical() {
        let page = SnapshotPage::from_html(COURSE);
        let extractor = extractor();

        let first = extractor.extract(&page).await.unwrap();
        let second = extractor.extract(&page).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_header_outside_known_container_uses_parent() {
        let html = r#"
            <html><body>
              <div class="group">
                <h3 class="section-header">Intro</h3>
                <span class="media-duration">1:00</span>
              </div>
              <div class="group">
                <h3 class="section-header">Archive</h3>
                <span class="media-duration">5:00</span>
              </div>
            </body></html>
        "#;
        let result = extractor()
            .extract(&SnapshotPage::from_html(html))
            .await
            .unwrap();

        // Archive is excluded and its video must not come back as an orphan
        assert_eq!(result.video_count, 1);
        assert_eq!(result.total_seconds, 60);
        let names: Vec<_> = result.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Intro"]);
    }
}
