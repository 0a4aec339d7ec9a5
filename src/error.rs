use std::path::PathBuf;

use thiserror::Error;

/// Rejected configuration. Raised before the monitoring loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// A probe could not be attempted at all. An unreachable host is not an
/// error; probers report that as `Ok(false)`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("malformed target address '{0}'")]
    InvalidTarget(String),

    #[error("probe capability unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}
