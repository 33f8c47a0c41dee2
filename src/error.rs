use thiserror::Error;

/// Result type for course duration operations
pub type Result<T> = std::result::Result<T, DurationError>;

/// Result type for page collaborator operations
pub type PageResult<T> = std::result::Result<T, PageError>;

/// Failures raised by a page handle or one of its elements
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Element is no longer attached to the page")]
    StaleElement,

    #[error("Page is closed")]
    Closed,

    #[error("Renderer protocol error: {0}")]
    Protocol(String),
}

/// Error types for a duration request
#[derive(Error, Debug)]
pub enum DurationError {
    #[error("Invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Authentication required for {url} (redirected to {landed_on})")]
    AuthenticationRequired { url: String, landed_on: String },

    #[error("Page {url} never stabilized: {samples} samples taken, last content height {last_height}")]
    StabilizationTimeout {
        url: String,
        samples: u32,
        last_height: u64,
    },

    #[error("No video data found on {url} ({sections_seen} section headers seen)")]
    NoVideoDataFound { url: String, sections_seen: usize },

    #[error("No consensus for {url}: all {attempts} runs failed or found no videos [{failures}]")]
    ConsensusUnattainable {
        url: String,
        attempts: usize,
        failures: String,
    },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DurationError {
    /// Short machine-friendly name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            DurationError::InvalidUrl { .. } => "InvalidUrl",
            DurationError::AuthenticationRequired { .. } => "AuthenticationRequired",
            DurationError::StabilizationTimeout { .. } => "StabilizationTimeout",
            DurationError::NoVideoDataFound { .. } => "NoVideoDataFound",
            DurationError::ConsensusUnattainable { .. } => "ConsensusUnattainable",
            DurationError::Navigation { .. } => "Navigation",
            DurationError::Page(_) => "Page",
            DurationError::Config(_) => "Config",
        }
    }
}
