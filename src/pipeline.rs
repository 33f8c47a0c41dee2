/// One consensus run: navigate, check authentication, stabilize, reveal, extract
use crate::config::{Config, NavigationConfig};
use crate::error::{DurationError, Result};
use crate::extraction::{
    ContentRevealer, EmbeddedDataExtractor, ExtractionResult, ExtractionStrategyKind,
    HierarchicalExtractor, StabilizationDetector,
};
use crate::page::{PageGuard, PageHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Parse `url` and apply the host policy. No page is touched.
pub fn validate_url(url: &str, navigation: &NavigationConfig) -> Result<Url> {
    let invalid = |reason: String| DurationError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", parsed.scheme())));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?
        .to_ascii_lowercase();

    if let Some(required) = &navigation.required_host_substring {
        if !host.contains(&required.to_ascii_lowercase()) {
            return Err(invalid(format!("host `{}` does not contain `{}`", host, required)));
        }
    }

    Ok(parsed)
}

/// Runs the full per-page sequence against a single page handle
pub struct RunPipeline {
    config: Arc<Config>,
    hierarchy: HierarchicalExtractor,
    embedded: EmbeddedDataExtractor,
    revealer: ContentRevealer,
}

impl RunPipeline {
    pub fn new(config: Arc<Config>) -> Self {
        let hierarchy = HierarchicalExtractor::new(&config.extraction);
        let embedded = EmbeddedDataExtractor::new(&config.extraction);
        let revealer = ContentRevealer::new(config.reveal.clone(), &config.extraction.selectors);

        Self {
            config,
            hierarchy,
            embedded,
            revealer,
        }
    }

    /// Run on the guarded page and close it whatever the outcome
    pub async fn run(&self, guard: PageGuard, url: &str) -> Result<ExtractionResult> {
        let start_time = Instant::now();

        let result = match guard.page() {
            Some(page) => self.execute(page, url).await,
            None => Err(DurationError::Navigation {
                url: url.to_string(),
                reason: "page already released".to_string(),
            }),
        };
        guard.close().await;

        match &result {
            Ok(extraction) => debug!(
                "Run finished in {:.2}s with {} videos",
                start_time.elapsed().as_secs_f64(),
                extraction.video_count
            ),
            Err(e) => warn!("❌ Run failed after {:.2}s: {}", start_time.elapsed().as_secs_f64(), e),
        }
        result
    }

    /// The run sequence without page ownership
    pub async fn execute(&self, page: &dyn PageHandle, url: &str) -> Result<ExtractionResult> {
        self.navigate(page, url).await?;
        self.check_authentication(page, url).await?;

        StabilizationDetector::new(self.config.stabilization.clone())
            .wait_for_stable(page)
            .await?;

        match self.config.extraction.strategy {
            ExtractionStrategyKind::Dom => self.extract_rendered(page).await,
            ExtractionStrategyKind::Embedded => match self.embedded.extract(page).await? {
                Some(result) => Ok(result),
                None => Err(DurationError::NoVideoDataFound {
                    url: url.to_string(),
                    sections_seen: 0,
                }),
            },
            ExtractionStrategyKind::Auto => match self.embedded.extract(page).await? {
                Some(result) => Ok(result),
                None => {
                    debug!("No embedded data, falling back to the rendered tree");
                    self.extract_rendered(page).await
                }
            },
        }
    }

    async fn navigate(&self, page: &dyn PageHandle, url: &str) -> Result<()> {
        let timeout = Duration::from_secs(self.config.navigation.timeout_seconds);
        debug!("Navigating to {} (timeout {:?})", url, timeout);

        match tokio::time::timeout(timeout, page.navigate(url, timeout)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DurationError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DurationError::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    async fn check_authentication(&self, page: &dyn PageHandle, url: &str) -> Result<()> {
        let landed_on = page.current_url().await?;
        let landed_lower = landed_on.to_ascii_lowercase();

        let on_login_page = self
            .config
            .navigation
            .login_markers
            .iter()
            .any(|marker| !marker.is_empty() && landed_lower.contains(&marker.to_ascii_lowercase()));

        if on_login_page {
            warn!("🔒 {} redirected to a login page: {}", url, landed_on);
            return Err(DurationError::AuthenticationRequired {
                url: url.to_string(),
                landed_on,
            });
        }
        Ok(())
    }

    async fn extract_rendered(&self, page: &dyn PageHandle) -> Result<ExtractionResult> {
        let report = self.revealer.reveal_all(page).await?;
        if report.exhausted {
            info!("Extracting after {} reveal rounds with content possibly still hidden", report.rounds);
        }
        self.hierarchy.extract(page).await
    }
}
