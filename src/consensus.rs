use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConsensusConfig;
use crate::error::{DurationError, PageError, Result};
use crate::extraction::ExtractionResult;
use crate::page::{PageFactory, PageGuard};
use crate::pipeline::RunPipeline;

/// The majority extraction plus how it was reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    #[serde(flatten)]
    pub result: ExtractionResult,
    pub diagnostics: ConsensusDiagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusDiagnostics {
    /// Runs launched
    pub total_runs: usize,
    /// Runs that succeeded with at least one video
    pub valid_runs: usize,
    /// Runs that failed or counted no videos
    pub discarded_runs: usize,
    /// Valid runs sharing the selected video count
    pub agreeing_runs: usize,
    /// Launch index (zero-based) of the returned run
    pub selected_run: usize,
    pub completed_at: DateTime<Utc>,
}

/// Reconcile ordered run outcomes into one result.
///
/// Failed runs and runs with no videos are discarded. The remaining runs are
/// grouped by video count; the largest group wins, ties going to the group
/// seen first. Its first member is returned unchanged.
pub fn select_majority(url: &str, outcomes: Vec<Result<ExtractionResult>>) -> Result<ConsensusResult> {
    let total_runs = outcomes.len();
    let mut failures = Vec::new();
    let mut valid: Vec<(usize, ExtractionResult)> = Vec::new();

    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(result) if result.video_count > 0 => valid.push((index, result)),
            Ok(_) => failures.push(format!("run {}: no videos counted", index + 1)),
            Err(e) => failures.push(format!("run {}: {}", index + 1, e)),
        }
    }

    if valid.is_empty() {
        return Err(DurationError::ConsensusUnattainable {
            url: url.to_string(),
            attempts: total_runs,
            failures: failures.join("; "),
        });
    }

    // (video_count, first member position in `valid`, group size) in first-appearance order
    let mut groups: Vec<(u32, usize, usize)> = Vec::new();
    for (position, (_, result)) in valid.iter().enumerate() {
        match groups.iter_mut().find(|(count, _, _)| *count == result.video_count) {
            Some(group) => group.2 += 1,
            None => groups.push((result.video_count, position, 1)),
        }
    }

    let mut winner = groups[0];
    for group in &groups[1..] {
        if group.2 > winner.2 {
            winner = *group;
        }
    }

    let valid_runs = valid.len();
    let (selected_run, result) = valid.swap_remove(winner.1);

    if !failures.is_empty() {
        debug!("Discarded runs: {}", failures.join("; "));
    }

    Ok(ConsensusResult {
        result,
        diagnostics: ConsensusDiagnostics {
            total_runs,
            valid_runs,
            discarded_runs: total_runs - valid_runs,
            agreeing_runs: winner.2,
            selected_run,
            completed_at: Utc::now(),
        },
    })
}

/// Aborts every run still in flight when dropped
struct RunTasks(Vec<JoinHandle<Result<ExtractionResult>>>);

impl Drop for RunTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Launches independent runs over a bounded pool of pages and votes on the outcome
pub struct ConsensusAggregator {
    pipeline: Arc<RunPipeline>,
    factory: Arc<dyn PageFactory>,
    page_semaphore: Arc<Semaphore>,
    runs: usize,
}

impl ConsensusAggregator {
    pub fn new(
        pipeline: Arc<RunPipeline>,
        factory: Arc<dyn PageFactory>,
        config: &ConsensusConfig,
    ) -> Self {
        Self {
            pipeline,
            factory,
            page_semaphore: Arc::new(Semaphore::new(config.max_concurrent_pages.max(1))),
            runs: config.runs,
        }
    }

    /// Run `runs` extractions of `url` and return the majority result.
    ///
    /// Waits for every run before voting. Dropping the returned future
    /// aborts runs still in flight; their pages are closed by their guards.
    pub async fn aggregate(&self, url: &str) -> Result<ConsensusResult> {
        info!("🗳️ Starting {} consensus runs for {}", self.runs, url);

        let mut tasks = RunTasks(Vec::with_capacity(self.runs));

        // Pages are created in launch order; the permit is held until the run ends
        for index in 0..self.runs {
            let permit = Arc::clone(&self.page_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| PageError::Protocol("page pool closed".to_string()))?;

            let pipeline = Arc::clone(&self.pipeline);
            let url = url.to_string();
            // An aborted task may never be polled, so the page is guarded before spawning
            let guard = self.factory.new_page().await.map(PageGuard::new);

            tasks.0.push(tokio::spawn(async move {
                let _permit = permit;
                let guard = guard?;
                debug!("Run {} started", index + 1);
                pipeline.run(guard, &url).await
            }));
        }

        let mut outcomes = Vec::with_capacity(self.runs);
        for (index, task) in tasks.0.iter_mut().enumerate() {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Run {} did not complete: {}", index + 1, e);
                    Err(DurationError::Page(PageError::Protocol(format!(
                        "run task failed: {}",
                        e
                    ))))
                }
            };
            outcomes.push(outcome);
        }

        let consensus = select_majority(url, outcomes)?;
        info!(
            "✅ Consensus: {} of {} valid runs agree on {} videos ({}s)",
            consensus.diagnostics.agreeing_runs,
            consensus.diagnostics.valid_runs,
            consensus.result.video_count,
            consensus.result.total_seconds
        );
        Ok(consensus)
    }
}
