use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::consensus::{ConsensusAggregator, ConsensusResult};
use crate::error::Result;
use crate::page::PageFactory;
use crate::pipeline::{validate_url, RunPipeline};

/// Entry point: computes the total playable duration of a course folder URL
pub struct DurationService {
    config: Arc<Config>,
    pipeline: Arc<RunPipeline>,
    factory: Arc<dyn PageFactory>,
}

impl DurationService {
    /// Validates `config` before accepting any request
    pub fn new(config: Config, factory: Arc<dyn PageFactory>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        Ok(Self {
            pipeline: Arc::new(RunPipeline::new(Arc::clone(&config))),
            config,
            factory,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Majority-voted duration of the course at `url`.
    ///
    /// An invalid URL fails before any page is created. Individual run
    /// failures are absorbed; only the failure of every run surfaces.
    pub async fn compute_duration(&self, url: &str) -> Result<ConsensusResult> {
        let start_time = Instant::now();
        let parsed = validate_url(url, &self.config.navigation)?;

        let aggregator = ConsensusAggregator::new(
            Arc::clone(&self.pipeline),
            Arc::clone(&self.factory),
            &self.config.consensus,
        );
        let consensus = aggregator.aggregate(parsed.as_str()).await?;

        info!(
            "🎬 '{}': {} videos, {}s total (computed in {:.2}s)",
            consensus.result.course_title,
            consensus.result.video_count,
            consensus.result.total_seconds,
            start_time.elapsed().as_secs_f64()
        );
        Ok(consensus)
    }
}
