/// Surfaces content hidden behind "show more" style affordances
use super::selectors::SelectorStrategy;
use crate::config::RevealConfig;
use crate::error::Result;
use crate::page::{ElementHandle, PageHandle, SelectorSpec};
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Summary of one reveal pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevealReport {
    /// Rounds that found at least one affordance
    pub rounds: u32,
    /// Clicks delivered successfully
    pub clicks: u32,
    /// The round cap was hit while affordances were still present
    pub exhausted: bool,
}

/// Which heuristic produced a round's targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Phrase,
    Fallback,
}

pub struct ContentRevealer {
    config: RevealConfig,
    candidates: SelectorSpec,
    fallback: SelectorSpec,
    phrases: Vec<String>,
    fallback_word: Option<Regex>,
}

impl ContentRevealer {
    pub fn new(config: RevealConfig, selectors: &SelectorStrategy) -> Self {
        let phrases = config.phrases.iter().map(|p| normalize(p)).collect();
        let fallback_word = Some(config.fallback_keyword.trim())
            .filter(|word| !word.is_empty())
            .and_then(|word| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).ok());

        Self {
            config,
            candidates: selectors.reveal_candidates.clone(),
            fallback: selectors.reveal_fallback.clone(),
            phrases,
            fallback_word,
        }
    }

    /// Scroll and click reveal affordances until none remain or the round cap is hit
    pub async fn reveal_all(&self, page: &dyn PageHandle) -> Result<RevealReport> {
        let mut report = RevealReport::default();
        let pause = Duration::from_millis(self.config.pause_ms);

        for round in 1..=self.config.max_rounds {
            if let Err(e) = page.scroll_to_bottom().await {
                debug!("Scroll to bottom failed in round {}: {}", round, e);
            }

            let (kind, targets) = self.find_targets(page).await?;
            if targets.is_empty() {
                info!(
                    "🔓 Content fully revealed after {} rounds ({} clicks)",
                    report.rounds, report.clicks
                );
                return Ok(report);
            }

            debug!(
                "Round {}: {} {:?} affordances to activate",
                round,
                targets.len(),
                kind
            );
            report.rounds += 1;

            for target in &targets {
                if let Err(e) = target.scroll_into_view().await {
                    debug!("Could not scroll affordance into view: {}", e);
                }
                match target.dispatch_click().await {
                    Ok(()) => report.clicks += 1,
                    Err(e) => debug!("Click on affordance failed: {}", e),
                }
            }

            tokio::time::sleep(pause).await;
        }

        report.exhausted = true;
        warn!(
            "⚠️ Reveal stopped at the {} round cap with affordances still present",
            self.config.max_rounds
        );
        Ok(report)
    }

    async fn find_targets(
        &self,
        page: &dyn PageHandle,
    ) -> Result<(MatchKind, Vec<Box<dyn ElementHandle>>)> {
        let phrase_matches = self
            .visible_matching(page, &self.candidates, |text| self.matches_phrase(text))
            .await?;
        if !phrase_matches.is_empty() {
            return Ok((MatchKind::Phrase, phrase_matches));
        }

        let fallback_matches = self
            .visible_matching(page, &self.fallback, |text| self.matches_fallback(text))
            .await?;
        Ok((MatchKind::Fallback, fallback_matches))
    }

    async fn visible_matching(
        &self,
        page: &dyn PageHandle,
        selector: &SelectorSpec,
        accept: impl Fn(&str) -> bool + Send + Sync,
    ) -> Result<Vec<Box<dyn ElementHandle>>> {
        let mut matched = Vec::new();
        for element in page.query(selector).await? {
            let text = match element.text_content().await {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping unreadable element: {}", e);
                    continue;
                }
            };
            if !accept(&text) {
                continue;
            }
            if element.is_visible().await.unwrap_or(false) {
                matched.push(element);
            }
        }
        Ok(matched)
    }

    fn matches_phrase(&self, text: &str) -> bool {
        let text = normalize(text);
        !text.is_empty()
            && self
                .phrases
                .iter()
                .any(|phrase| !phrase.is_empty() && text.contains(phrase.as_str()))
    }

    fn matches_fallback(&self, text: &str) -> bool {
        let Some(word) = &self.fallback_word else {
            return false;
        };
        let text = normalize(text);
        text.len() <= self.config.fallback_max_text_len && word.is_match(&text)
    }
}

/// Lowercase and collapse runs of whitespace
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
