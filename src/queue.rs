use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::notify::Notifier;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
}

/// FIFO of pending notification texts. A failed delivery drops the message.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: VecDeque<String>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("Queued message: {}", message);
        self.pending.push_back(message);
    }

    /// Delivers every queued message in insertion order. The queue is empty
    /// on return whatever the notifier reported.
    pub async fn drain(&mut self, notifier: &dyn Notifier) -> DrainReport {
        let mut report = DrainReport::default();
        while let Some(message) = self.pending.pop_front() {
            if notifier.deliver(&message).await {
                report.delivered += 1;
            } else {
                warn!("Dropping undelivered notification: {}", message);
                report.failed += 1;
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }
}
