use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::debounce::{sleep_or_stop, Debouncer};
use crate::error::{ConfigError, MonitorError, ProbeError};
use crate::models::{Statistics, Transition};
use crate::notify::Notifier;
use crate::outage::OutageTracker;
use crate::probe::Prober;
use crate::stats::StatisticsTracker;

/// One monitored target with all of its state. Independent instances share
/// nothing.
pub struct Monitor {
    config: MonitorConfig,
    debouncer: Debouncer,
    prober: Box<dyn Prober>,
    notifier: Box<dyn Notifier>,
    tracker: OutageTracker,
    stats: Arc<Mutex<StatisticsTracker>>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        prober: Box<dyn Prober>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let debouncer = Debouncer::from_config(&config)?;
        Ok(Self {
            config,
            debouncer,
            prober,
            notifier,
            tracker: OutageTracker::new(),
            stats: Arc::new(Mutex::new(StatisticsTracker::new())),
        })
    }

    pub fn stats_handle(&self) -> Arc<Mutex<StatisticsTracker>> {
        Arc::clone(&self.stats)
    }

    pub fn tracker(&self) -> &OutageTracker {
        &self.tracker
    }

    pub async fn statistics(&self) -> Statistics {
        self.stats.lock().await.snapshot()
    }

    /// Probe, debounce and apply one verdict. Retry waits are not cancellable.
    pub async fn run_cycle(&mut self) -> Result<Transition, ProbeError> {
        let is_down = self
            .debouncer
            .evaluate_cycle(&*self.prober, &self.config.target)
            .await?;
        Ok(self.apply_verdict(is_down).await)
    }

    /// Runs cycles every `check_interval` until `shutdown` turns `true`,
    /// then returns the final statistics. A probe fault ends the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<Statistics, MonitorError> {
        info!(
            "Monitoring {} every {}s (threshold {}, retry delay {}s)",
            self.config.target,
            self.config.check_interval,
            self.debouncer.threshold(),
            self.config.retry_delay
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let verdict = self
                .debouncer
                .evaluate_cycle_until(&*self.prober, &self.config.target, &mut shutdown)
                .await;
            match verdict {
                Ok(Some(is_down)) => {
                    self.apply_verdict(is_down).await;
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Probe of {} cannot run: {}", self.config.target, e);
                    return Err(e.into());
                }
            }

            if sleep_or_stop(&mut shutdown, self.config.check_interval()).await {
                break;
            }
        }

        let stats = self.statistics().await;
        info!(
            "Monitor stopped: {} checks, {} failures, {:.1}% success, last status {}",
            stats.total_checks, stats.total_failures, stats.success_rate, stats.current_status
        );
        if !self.tracker.queue().is_empty() {
            warn!(
                "{} notification(s) still queued at shutdown",
                self.tracker.queue().len()
            );
        }
        Ok(stats)
    }

    async fn apply_verdict(&mut self, is_down: bool) -> Transition {
        self.log_result(is_down);
        let transition = self.tracker.handle_verdict(is_down, &*self.notifier).await;

        let mut stats = self.stats.lock().await;
        stats.record_cycle(is_down);
        stats.set_status(self.tracker.state());
        transition
    }

    fn log_result(&self, is_down: bool) {
        if is_down {
            warn!("Disconnected - pinging {}", self.config.target);
        } else if self.config.log_successful_pings {
            info!("Connected - pinging {}", self.config.target);
        } else {
            debug!("Connected - pinging {}", self.config.target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::capture;
    use crate::models::ConnectivityState;
    use crate::notify::testing::RecordingNotifier;
    use crate::probe::testing::{BrokenProber, ScriptedProber};
    use std::time::Duration;

    struct SharedNotifier(Arc<RecordingNotifier>);

    #[async_trait::async_trait]
    impl Notifier for SharedNotifier {
        async fn deliver(&self, message: &str) -> bool {
            self.0.deliver(message).await
        }
    }

    fn config(threshold: u32, retry_delay: u64) -> MonitorConfig {
        MonitorConfig {
            target: "192.0.2.1".into(),
            failure_threshold: threshold,
            retry_delay,
            log_file: None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn down_down_up_scenario() {
        let prober = ScriptedProber::new([false, false, false, false, true], true);
        let notifier = Arc::new(RecordingNotifier::succeeding());
        let mut monitor = Monitor::new(
            config(2, 0),
            Box::new(prober),
            Box::new(SharedNotifier(notifier.clone())),
        )
        .unwrap();

        let first = monitor.run_cycle().await.unwrap();
        assert!(matches!(first, Transition::Lost { .. }));
        assert_eq!(monitor.tracker().queue().len(), 1);

        std::thread::sleep(Duration::from_millis(5));
        let second = monitor.run_cycle().await.unwrap();
        assert_eq!(second, Transition::Unchanged(ConnectivityState::Disconnected));
        assert_eq!(monitor.tracker().queue().len(), 1);

        let third = monitor.run_cycle().await.unwrap();
        match third {
            Transition::Restored { outage: Some(duration), .. } => {
                assert!(duration > chrono::Duration::zero());
            }
            other => panic!("expected a restore with duration, got {:?}", other),
        }
        assert!(monitor.tracker().queue().is_empty());
        assert!(monitor.tracker().outage().is_none());

        let sent = notifier.delivered();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with("Internet connection lost!"));
        assert!(sent[1].contains("outage duration = "));

        let stats = monitor.statistics().await;
        assert_eq!(stats.total_checks, 3);
        assert_eq!(stats.total_failures, 2);
        assert_eq!(stats.current_status, ConnectivityState::Connected);
    }

    #[test]
    fn successful_cycles_log_at_info_only_when_enabled() {
        let build = |log_successful_pings| {
            Monitor::new(
                MonitorConfig { log_successful_pings, ..config(1, 0) },
                Box::new(ScriptedProber::always(true)),
                Box::new(RecordingNotifier::succeeding()),
            )
            .unwrap()
        };

        let quiet = build(false);
        let ((), output) = capture(|| quiet.log_result(false));
        assert!(output.contains("DEBUG"));
        assert!(output.contains("Connected - pinging 192.0.2.1"));
        assert!(!output.contains("INFO"));

        let verbose = build(true);
        let ((), output) = capture(|| verbose.log_result(false));
        assert!(output.contains("INFO"));
        assert!(output.contains("Connected - pinging 192.0.2.1"));
        assert!(!output.contains("DEBUG"));
    }

    #[test]
    fn failed_cycles_always_log_a_warning() {
        let monitor = Monitor::new(
            config(1, 0),
            Box::new(ScriptedProber::always(false)),
            Box::new(RecordingNotifier::succeeding()),
        )
        .unwrap();

        let ((), output) = capture(|| monitor.log_result(true));
        assert!(output.contains("WARN"));
        assert!(output.contains("Disconnected - pinging 192.0.2.1"));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_running() {
        let result = Monitor::new(
            config(0, 0),
            Box::new(ScriptedProber::always(true)),
            Box::new(RecordingNotifier::succeeding()),
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_between_cycles_on_shutdown() {
        let monitor = Monitor::new(
            MonitorConfig { check_interval: 10, ..config(1, 0) },
            Box::new(ScriptedProber::always(true)),
            Box::new(RecordingNotifier::succeeding()),
        )
        .unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(rx));

        tokio::time::sleep(Duration::from_secs(35)).await;
        tx.send(true).unwrap();

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.total_checks, 4);
        assert_eq!(stats.total_failures, 0);
        assert_eq!(stats.success_rate, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_keeps_outage_messages_queued_while_down() {
        let notifier = Arc::new(RecordingNotifier::succeeding());
        let monitor = Monitor::new(
            MonitorConfig { check_interval: 10, ..config(3, 1) },
            Box::new(ScriptedProber::always(false)),
            Box::new(SharedNotifier(notifier.clone())),
        )
        .unwrap();
        let stats = monitor.stats_handle();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(rx));

        tokio::time::sleep(Duration::from_secs(30)).await;
        tx.send(true).unwrap();
        let final_stats = handle.await.unwrap().unwrap();

        assert!(final_stats.total_checks >= 2);
        assert_eq!(final_stats.total_checks, final_stats.total_failures);
        assert_eq!(final_stats.current_status, ConnectivityState::Disconnected);
        assert_eq!(stats.lock().await.snapshot(), final_stats);
        assert!(notifier.delivered().is_empty());
    }

    #[tokio::test]
    async fn probe_fault_ends_the_loop() {
        let monitor = Monitor::new(
            config(2, 0),
            Box::new(BrokenProber),
            Box::new(RecordingNotifier::succeeding()),
        )
        .unwrap();
        let (_tx, rx) = watch::channel(false);

        let result = monitor.run(rx).await;
        assert!(matches!(result, Err(MonitorError::Probe(ProbeError::InvalidTarget(_)))));
    }
}
