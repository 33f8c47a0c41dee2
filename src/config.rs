use crate::error::{DurationError, Result};
use crate::extraction::{
    ExclusionMatch, ExtractionStrategyKind, OrphanPolicy, SelectorStrategy, DEFAULT_COURSE_TITLE,
    EXCLUDED_SECTIONS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the course duration service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Page loading and URL policy
    pub navigation: NavigationConfig,

    /// Content-height polling
    pub stabilization: StabilizationConfig,

    /// "Show more" reveal loop
    pub reveal: RevealConfig,

    /// Hierarchy extraction rules
    pub extraction: ExtractionConfig,

    /// Multi-run majority vote
    pub consensus: ConsensusConfig,

    /// Headless browser settings (used with the `browser` feature)
    pub browser: BrowserSettings,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Navigation timeout in seconds
    pub timeout_seconds: u64,

    /// When set, the URL host must contain this string (e.g. "wistia.com")
    pub required_host_substring: Option<String>,

    /// Fragments of a landing URL that indicate a login or session page
    pub login_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationConfig {
    /// Sampling interval in milliseconds
    pub interval_ms: u64,

    /// Consecutive unchanged, non-zero samples required
    pub required_stable_samples: u32,

    /// Hard ceiling on samples before timing out
    pub max_samples: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Maximum reveal rounds
    pub max_rounds: u32,

    /// Pause after each round's clicks in milliseconds
    pub pause_ms: u64,

    /// Affordance phrases, matched case-insensitively after whitespace normalization
    pub phrases: Vec<String>,

    /// Word searched for when no phrase matches
    pub fallback_keyword: String,

    /// Longest text a fallback match may have
    pub fallback_max_text_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Strategy used by each run
    pub strategy: ExtractionStrategyKind,

    /// Structural queries
    pub selectors: SelectorStrategy,

    /// Sections never counted toward totals
    pub excluded_sections: Vec<String>,

    /// Exact or substring comparison against `excluded_sections`
    pub exclusion_match: ExclusionMatch,

    /// Handling of videos outside any recognized section
    pub orphan_policy: OrphanPolicy,

    /// Label prefixes stripped from duration text
    pub time_labels: Vec<String>,

    /// Title used when the page has no heading
    pub default_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Independent runs per request
    pub runs: usize,

    /// Page handles open at once
    pub max_concurrent_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,

    /// Browser executable; detected when unset
    pub executable: Option<PathBuf>,

    /// Viewport width in pixels
    pub window_width: u32,

    /// Viewport height in pixels
    pub window_height: u32,

    /// Extra command-line arguments
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the crate
    pub level: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            required_host_substring: None,
            login_markers: vec![
                "/login".to_string(),
                "/signin".to_string(),
                "/sign_in".to_string(),
                "/session".to_string(),
            ],
        }
    }
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            required_stable_samples: 5, // 2.5s of quiescence
            max_samples: 120,           // 60s ceiling
        }
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            max_rounds: 40,
            pause_ms: 400,
            phrases: vec!["show more".to_string(), "view more".to_string()],
            fallback_keyword: "remaining".to_string(),
            fallback_max_text_len: 80,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategyKind::Dom,
            selectors: SelectorStrategy::default(),
            excluded_sections: EXCLUDED_SECTIONS.iter().map(|s| s.to_string()).collect(),
            exclusion_match: ExclusionMatch::Exact,
            orphan_policy: OrphanPolicy::Count,
            time_labels: vec!["Duration:".to_string(), "Length:".to_string()],
            default_title: DEFAULT_COURSE_TITLE.to_string(),
        }
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            runs: 3,
            max_concurrent_pages: num_cpus::get().clamp(1, 4),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_width: 1280,
            window_height: 2000,
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
                "--no-first-run".to_string(),
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, else the environment
    pub fn load() -> Result<Self> {
        let config_paths = [
            "course-duration.toml",
            "config/course-duration.toml",
            "/etc/course-duration/config.toml",
        ];

        for path in &config_paths {
            if !Path::new(path).exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("📄 Loaded configuration from: {}", path);
                    return Ok(config.with_env_overrides());
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file {}: {}", path, e);
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            DurationError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&config_str)
            .map_err(|e| DurationError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    /// Apply `COURSE_DURATION_*` environment variables
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(runs) = std::env::var("COURSE_DURATION_RUNS") {
            self.consensus.runs = runs.parse().unwrap_or(self.consensus.runs);
        }

        if let Ok(host) = std::env::var("COURSE_DURATION_REQUIRED_HOST") {
            self.navigation.required_host_substring = Some(host).filter(|h| !h.is_empty());
        }

        if let Ok(timeout) = std::env::var("COURSE_DURATION_NAVIGATION_TIMEOUT") {
            self.navigation.timeout_seconds =
                timeout.parse().unwrap_or(self.navigation.timeout_seconds);
        }

        if let Ok(mode) = std::env::var("COURSE_DURATION_EXCLUSION_MATCH") {
            match mode.to_ascii_lowercase().as_str() {
                "exact" => self.extraction.exclusion_match = ExclusionMatch::Exact,
                "substring" => self.extraction.exclusion_match = ExclusionMatch::Substring,
                other => tracing::warn!("Ignoring unknown exclusion match mode: {}", other),
            }
        }

        if let Ok(level) = std::env::var("COURSE_DURATION_LOG_LEVEL") {
            self.logging.level = level;
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| DurationError::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, config_str).map_err(|e| {
            DurationError::Config(format!("cannot write {}: {}", path.display(), e))
        })?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.consensus.runs == 0 {
            return Err(DurationError::Config("consensus.runs must be greater than 0".to_string()));
        }

        if self.consensus.max_concurrent_pages == 0 {
            return Err(DurationError::Config(
                "consensus.max_concurrent_pages must be greater than 0".to_string(),
            ));
        }

        if self.stabilization.interval_ms == 0 {
            return Err(DurationError::Config(
                "stabilization.interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.stabilization.required_stable_samples == 0
            || self.stabilization.required_stable_samples >= self.stabilization.max_samples
        {
            return Err(DurationError::Config(
                "stabilization.required_stable_samples must be between 1 and max_samples".to_string(),
            ));
        }

        if self.reveal.max_rounds == 0 {
            return Err(DurationError::Config("reveal.max_rounds must be greater than 0".to_string()));
        }

        if !(300..=500).contains(&self.reveal.pause_ms) {
            return Err(DurationError::Config(
                "reveal.pause_ms must be between 300 and 500".to_string(),
            ));
        }

        if self.navigation.timeout_seconds == 0 {
            return Err(DurationError::Config(
                "navigation.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        self.extraction.selectors.validate()?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Course Duration Configuration:\n\
            - Runs: {} ({} pages at once)\n\
            - Strategy: {:?}\n\
            - Excluded Sections: {} ({:?} match)\n\
            - Orphan Videos: {:?}\n\
            - Stabilization: {} samples every {}ms, max {}\n\
            - Reveal: up to {} rounds\n\
            - Required Host: {}",
            self.consensus.runs,
            self.consensus.max_concurrent_pages,
            self.extraction.strategy,
            self.extraction.excluded_sections.join(", "),
            self.extraction.exclusion_match,
            self.extraction.orphan_policy,
            self.stabilization.required_stable_samples,
            self.stabilization.interval_ms,
            self.stabilization.max_samples,
            self.reveal.max_rounds,
            self.navigation.required_host_substring.as_deref().unwrap_or("any"),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.config.consensus.runs = runs;
        self
    }

    pub fn with_max_concurrent_pages(mut self, pages: usize) -> Self {
        self.config.consensus.max_concurrent_pages = pages;
        self
    }

    pub fn with_required_host(mut self, host: impl Into<String>) -> Self {
        self.config.navigation.required_host_substring = Some(host.into());
        self
    }

    pub fn with_exclusion_match(mut self, mode: ExclusionMatch) -> Self {
        self.config.extraction.exclusion_match = mode;
        self
    }

    pub fn with_excluded_sections(mut self, sections: Vec<String>) -> Self {
        self.config.extraction.excluded_sections = sections;
        self
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.config.extraction.orphan_policy = policy;
        self
    }

    pub fn with_strategy(mut self, strategy: ExtractionStrategyKind) -> Self {
        self.config.extraction.strategy = strategy;
        self
    }

    pub fn with_selectors(mut self, selectors: SelectorStrategy) -> Self {
        self.config.extraction.selectors = selectors;
        self
    }

    pub fn with_navigation_timeout(mut self, seconds: u64) -> Self {
        self.config.navigation.timeout_seconds = seconds;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.consensus.runs, 3);
        assert_eq!(config.stabilization.interval_ms, 500);
        assert_eq!(config.stabilization.required_stable_samples, 5);
        assert_eq!(config.stabilization.max_samples, 120);
        assert_eq!(config.reveal.max_rounds, 40);
        assert_eq!(config.extraction.exclusion_match, ExclusionMatch::Exact);
        assert!(config.consensus.max_concurrent_pages >= 1);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_runs(5)
            .with_required_host("wistia.com")
            .with_exclusion_match(ExclusionMatch::Substring)
            .with_orphan_policy(OrphanPolicy::Discard)
            .build();

        assert_eq!(config.consensus.runs, 5);
        assert_eq!(config.navigation.required_host_substring.as_deref(), Some("wistia.com"));
        assert_eq!(config.extraction.exclusion_match, ExclusionMatch::Substring);
        assert_eq!(config.extraction.orphan_policy, OrphanPolicy::Discard);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let config = ConfigBuilder::new().with_runs(0).build();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.reveal.pause_ms = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("course-duration.toml");

        let config = ConfigBuilder::new()
            .with_runs(7)
            .with_strategy(ExtractionStrategyKind::Auto)
            .build();
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.consensus.runs, 7);
        assert_eq!(loaded.extraction.strategy, ExtractionStrategyKind::Auto);
        assert_eq!(loaded.extraction.selectors, config.extraction.selectors);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[extraction]\nexclusion_match = \"substring\"\n\n[consensus]\nruns = 5\n",
        )
        .unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.consensus.runs, 5);
        assert_eq!(loaded.extraction.exclusion_match, ExclusionMatch::Substring);
        assert_eq!(loaded.reveal.max_rounds, 40);
    }
}
