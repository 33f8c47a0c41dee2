/// Detects when a dynamically rendered page has stopped growing
use crate::config::StabilizationConfig;
use crate::error::{DurationError, Result};
use crate::page::PageHandle;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Where the detector stands after the latest height sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizationState {
    /// Height changed (or is zero) on the latest sample
    Unstable,
    /// Height unchanged and non-zero for this many consecutive samples
    CountingStable(u32),
    Stable,
    TimedOut,
}

/// Polls content height until it holds steady, with a hard sample ceiling
#[derive(Debug, Clone)]
pub struct StabilizationDetector {
    config: StabilizationConfig,
    state: StabilizationState,
    last_height: Option<u64>,
    samples: u32,
}

impl StabilizationDetector {
    pub fn new(config: StabilizationConfig) -> Self {
        Self {
            config,
            state: StabilizationState::Unstable,
            last_height: None,
            samples: 0,
        }
    }

    pub fn state(&self) -> StabilizationState {
        self.state
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn last_height(&self) -> u64 {
        self.last_height.unwrap_or(0)
    }

    /// Feed one height sample and advance the state machine
    pub fn observe(&mut self, height: u64) -> StabilizationState {
        if matches!(self.state, StabilizationState::Stable | StabilizationState::TimedOut) {
            return self.state;
        }

        self.samples += 1;
        let unchanged = height > 0 && self.last_height == Some(height);
        self.last_height = Some(height);

        self.state = if unchanged {
            let streak = match self.state {
                StabilizationState::CountingStable(n) => n + 1,
                _ => 1,
            };
            if streak >= self.config.required_stable_samples {
                StabilizationState::Stable
            } else {
                StabilizationState::CountingStable(streak)
            }
        } else {
            StabilizationState::Unstable
        };

        if self.state != StabilizationState::Stable && self.samples >= self.config.max_samples {
            self.state = StabilizationState::TimedOut;
        }

        self.state
    }

    /// Sample `page` until its content height settles.
    ///
    /// Fails with `StabilizationTimeout` once `max_samples` samples pass
    /// without `required_stable_samples` consecutive unchanged readings.
    pub async fn wait_for_stable(mut self, page: &dyn PageHandle) -> Result<StabilizationDetector> {
        let mut ticker = interval(Duration::from_millis(self.config.interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let height = page.measure_content_height().await?;

            match self.observe(height) {
                StabilizationState::Stable => {
                    info!(
                        "📏 Page stabilized at height {} after {} samples",
                        height, self.samples
                    );
                    return Ok(self);
                }
                StabilizationState::TimedOut => {
                    let url = page.current_url().await.unwrap_or_default();
                    warn!(
                        "⏱️ Page never stabilized after {} samples (last height {})",
                        self.samples, height
                    );
                    return Err(DurationError::StabilizationTimeout {
                        url,
                        samples: self.samples,
                        last_height: height,
                    });
                }
                state => debug!("Height sample {}: {} ({:?})", self.samples, height, state),
            }
        }
    }
}
