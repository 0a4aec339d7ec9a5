//! Turns noisy single probes into one verdict per cycle.
//!
//! A cycle makes up to `threshold` sequential attempts. The first success
//! ends the cycle as "up"; only a full run of failures makes it "down".
//! Failed attempts are separated by `retry_delay`, never after the last.

use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::config::MonitorConfig;
use crate::error::{ConfigError, ProbeError};
use crate::probe::Prober;

#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    threshold: NonZeroU32,
    retry_delay: Duration,
}

impl Debouncer {
    pub fn new(threshold: NonZeroU32, retry_delay: Duration) -> Self {
        Self { threshold, retry_delay }
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, ConfigError> {
        let threshold = NonZeroU32::new(config.failure_threshold)
            .ok_or_else(|| ConfigError::invalid("failure_threshold", "must be at least 1"))?;
        Ok(Self::new(threshold, config.retry_delay()))
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.get()
    }

    /// Returns `true` when every attempt failed.
    pub async fn evaluate_cycle(&self, prober: &dyn Prober, target: &str) -> Result<bool, ProbeError> {
        let verdict = self.run(prober, target, None).await?;
        Ok(verdict.unwrap_or(true))
    }

    /// Like [`evaluate_cycle`](Self::evaluate_cycle), but a retry wait ends
    /// early once `stop` flips to `true`. `Ok(None)` means the cycle was
    /// abandoned and produced no verdict.
    pub async fn evaluate_cycle_until(
        &self,
        prober: &dyn Prober,
        target: &str,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<Option<bool>, ProbeError> {
        self.run(prober, target, Some(stop)).await
    }

    async fn run(
        &self,
        prober: &dyn Prober,
        target: &str,
        mut stop: Option<&mut watch::Receiver<bool>>,
    ) -> Result<Option<bool>, ProbeError> {
        let threshold = self.threshold.get();
        for attempt in 1..=threshold {
            if prober.probe(target).await? {
                if attempt > 1 {
                    debug!("{} reachable on attempt {}/{}", target, attempt, threshold);
                }
                return Ok(Some(false));
            }
            debug!("Probe {}/{} to {} failed", attempt, threshold, target);

            if attempt < threshold {
                match stop.as_deref_mut() {
                    Some(rx) => {
                        if sleep_or_stop(rx, self.retry_delay).await {
                            return Ok(None);
                        }
                    }
                    None => tokio::time::sleep(self.retry_delay).await,
                }
            }
        }
        Ok(Some(true))
    }
}

/// Sleeps for `duration` unless `stop` becomes `true` first. Returns whether
/// the stop signal was seen. A dropped sender never interrupts the sleep.
pub async fn sleep_or_stop(stop: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *stop.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        Ok(_) = stop.wait_for(|stopped| *stopped) => true,
    }
}
