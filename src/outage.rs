//! Outage state machine.
//!
//! Consumes one debounced verdict per cycle. Only a verdict that differs
//! from the current state causes a transition, so a long outage yields one
//! "lost" and one "restored" message no matter how many cycles it spans.
//!
//! | Current      | Verdict  | Next         | Action                              |
//! |--------------|----------|--------------|-------------------------------------|
//! | Connected    | up       | Connected    | none                                |
//! | Connected    | down     | Disconnected | record start, queue "lost"          |
//! | Disconnected | down     | Disconnected | none                                |
//! | Disconnected | up       | Connected    | queue "restored", drain, clear start |

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::models::{ConnectivityState, OutageRecord, Transition};
use crate::notify::Notifier;
use crate::queue::{DrainReport, NotificationQueue};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default)]
pub struct OutageTracker {
    state: ConnectivityState,
    outage: Option<OutageRecord>,
    queue: NotificationQueue,
}

impl OutageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn outage(&self) -> Option<&OutageRecord> {
        self.outage.as_ref()
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    /// Applies a verdict and, on recovery, drains the queue through `notifier`.
    pub async fn handle_verdict(&mut self, is_down: bool, notifier: &dyn Notifier) -> Transition {
        self.handle_verdict_at(is_down, Local::now(), notifier).await
    }

    pub async fn handle_verdict_at(
        &mut self,
        is_down: bool,
        now: DateTime<Local>,
        notifier: &dyn Notifier,
    ) -> Transition {
        let transition = self.observe_at(is_down, now);
        if let Transition::Restored { .. } = transition {
            let report = self.flush(notifier).await;
            if report.failed > 0 {
                warn!(
                    "{} of {} queued notifications could not be delivered",
                    report.failed,
                    report.failed + report.delivered
                );
            }
        }
        transition
    }

    /// State change only; queues messages but delivers nothing.
    pub fn observe_at(&mut self, is_down: bool, now: DateTime<Local>) -> Transition {
        match (self.state, is_down) {
            (ConnectivityState::Connected, false) | (ConnectivityState::Disconnected, true) => {
                Transition::Unchanged(self.state)
            }
            (ConnectivityState::Connected, true) => {
                self.state = ConnectivityState::Disconnected;
                self.outage = Some(OutageRecord { start_time: now });
                error!("Internet connection lost at {}", now.format(TIMESTAMP_FORMAT));
                self.queue.enqueue(lost_message(now));
                Transition::Lost { at: now }
            }
            (ConnectivityState::Disconnected, false) => {
                let outage = self.outage.take().map(|record| now - record.start_time);
                self.state = ConnectivityState::Connected;
                match outage {
                    Some(duration) => info!(
                        "Internet connection restored after {}",
                        format_duration(duration)
                    ),
                    None => warn!("Internet connection restored, outage start was not recorded"),
                }
                self.queue.enqueue(restored_message(now, outage));
                Transition::Restored { at: now, outage }
            }
        }
    }

    pub async fn flush(&mut self, notifier: &dyn Notifier) -> DrainReport {
        self.queue.drain(notifier).await
    }
}

pub fn lost_message(at: DateTime<Local>) -> String {
    format!("Internet connection lost! - {}", at.format(TIMESTAMP_FORMAT))
}

pub fn restored_message(at: DateTime<Local>, outage: Option<chrono::Duration>) -> String {
    match outage {
        Some(duration) => format!(
            "Internet connection restored! - {} - outage duration = {}",
            at.format(TIMESTAMP_FORMAT),
            format_duration(duration)
        ),
        None => format!("Internet connection restored! - {}", at.format(TIMESTAMP_FORMAT)),
    }
}

/// `H:MM:SS[.ffffff]`, prefixed with `N day(s), ` for long outages.
/// Negative spans (wall clock stepped back) render as zero.
pub fn format_duration(duration: chrono::Duration) -> String {
    let duration = duration.max(chrono::Duration::zero());
    let total_secs = duration.num_seconds();
    let micros = (duration - chrono::Duration::seconds(total_secs))
        .num_microseconds()
        .unwrap_or(0);

    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = match days {
        0 => String::new(),
        1 => "1 day, ".to_string(),
        n => format!("{} days, ", n),
    };
    out.push_str(&format!("{}:{:02}:{:02}", hours, minutes, seconds));
    if micros > 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    out
}
