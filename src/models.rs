use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectivityState {
    #[default]
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Connected => f.write_str("Connected"),
            ConnectivityState::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// Open outage episode. Exists only while disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutageRecord {
    pub start_time: DateTime<Local>,
}

/// What a single verdict did to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Verdict matched the current state.
    Unchanged(ConnectivityState),
    Lost { at: DateTime<Local> },
    Restored {
        at: DateTime<Local>,
        outage: Option<chrono::Duration>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_checks: u64,
    pub total_failures: u64,
    /// Percentage of cycles that were up, `0.0` before the first cycle.
    pub success_rate: f64,
    pub current_status: ConnectivityState,
}
