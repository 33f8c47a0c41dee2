/// Structural queries used to read a course folder page
///
/// Every selector the pipeline issues lives here, so following a markup
/// change on the target site means editing configuration, not extraction code.
use crate::error::{DurationError, Result};
use crate::page::SelectorSpec;
use scraper::Selector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorStrategy {
    /// Prominent heading holding the course title
    pub title: SelectorSpec,

    /// Section header elements; their trimmed text is the section name
    pub section_header: SelectorSpec,

    /// Container of a section, resolved as the header's closest ancestor
    pub section_container: SelectorSpec,

    /// Elements carrying a rendered video duration
    pub video_duration: SelectorSpec,

    /// Interactive elements that may be "show more" affordances
    pub reveal_candidates: SelectorSpec,

    /// Wider net used when no "show more" affordance is found
    pub reveal_fallback: SelectorSpec,

    /// Inline scripts that may carry embedded folder data
    pub embedded_data: SelectorSpec,
}

impl Default for SelectorStrategy {
    fn default() -> Self {
        Self {
            title: SelectorSpec::new("h1"),
            section_header: SelectorSpec::new(
                "[data-testid='section-title'], .folder-section-title, .section-header, section > h2",
            ),
            section_container: SelectorSpec::new(
                "[data-testid='section'], .folder-section, .section, section",
            ),
            video_duration: SelectorSpec::new(
                "[data-testid='media-duration'], .media-duration, .duration",
            ),
            reveal_candidates: SelectorSpec::new("button, a, [role='button']"),
            reveal_fallback: SelectorSpec::new("button, a, [role='button'], span, div, p"),
            embedded_data: SelectorSpec::new("script"),
        }
    }
}

impl SelectorStrategy {
    /// All selectors with their field names
    pub fn entries(&self) -> [(&'static str, &SelectorSpec); 7] {
        [
            ("title", &self.title),
            ("section_header", &self.section_header),
            ("section_container", &self.section_container),
            ("video_duration", &self.video_duration),
            ("reveal_candidates", &self.reveal_candidates),
            ("reveal_fallback", &self.reveal_fallback),
            ("embedded_data", &self.embedded_data),
        ]
    }

    /// Check that every selector parses
    pub fn validate(&self) -> Result<()> {
        for (name, spec) in self.entries() {
            if Selector::parse(spec.as_str()).is_err() {
                return Err(DurationError::Config(format!(
                    "selector `{}` for {} does not parse",
                    spec, name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selectors_parse() {
        assert!(SelectorStrategy::default().validate().is_ok());
    }

    #[test]
    fn test_broken_selector_is_reported() {
        let strategy = SelectorStrategy {
            video_duration: SelectorSpec::new("span[data-x"),
            ..SelectorStrategy::default()
        };
        let err = strategy.validate().unwrap_err();
        assert!(err.to_string().contains("video_duration"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let strategy: SelectorStrategy = toml::from_str(r#"video_duration = ".len""#).unwrap();
        assert_eq!(strategy.video_duration.as_str(), ".len");
        assert_eq!(strategy.title.as_str(), "h1");
    }
}
