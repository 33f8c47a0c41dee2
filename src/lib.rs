/// Course Duration - Rust Implementation
///
/// Computes the total playable duration of a video course hosted on a
/// dynamically rendered folder page. Each request runs several independent
/// stabilize → reveal → extract passes and returns the majority result.

pub mod config;
pub mod consensus;
pub mod error;
pub mod extraction;
pub mod page;
pub mod pipeline;
pub mod report;
pub mod service;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::consensus::{select_majority, ConsensusAggregator, ConsensusDiagnostics, ConsensusResult};
pub use crate::error::{DurationError, PageError, Result};
pub use crate::extraction::{
    parse_duration, ExclusionMatch, ExtractionResult, ExtractionStrategyKind, OrphanPolicy,
    SectionRecord, SelectorStrategy,
};
pub use crate::page::{ElementHandle, PageFactory, PageHandle, SelectorSpec, SnapshotPage, SnapshotPageFactory};
pub use crate::service::DurationService;

#[cfg(feature = "browser")]
pub use crate::page::{ChromiumPage, ChromiumPageFactory};
