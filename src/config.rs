use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::ConfigError;
use crate::probe;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub target: String,
    /// Probe attempts per cycle before the cycle is declared down.
    pub failure_threshold: u32,
    /// Seconds between cycles.
    pub check_interval: u64,
    /// Seconds between failed attempts inside one cycle.
    pub retry_delay: u64,
    pub log_successful_pings: bool,
    pub log_file: Option<PathBuf>,
    pub probe: ProbeKind,
    pub notifier: Option<NotifierConfig>,
    pub stats_port: Option<u16>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target: "8.8.8.8".into(),
            failure_threshold: 2,
            check_interval: 10,
            retry_delay: 2,
            log_successful_pings: false,
            log_file: Some(PathBuf::from("internet_monitor.log")),
            probe: ProbeKind::default(),
            notifier: None,
            stats_port: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ProbeKind {
    Icmp {
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
    },
    Tcp {
        port: u16,
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
    },
}

impl Default for ProbeKind {
    fn default() -> Self {
        ProbeKind::Icmp { timeout_ms: default_timeout() }
    }
}

impl ProbeKind {
    pub fn timeout(&self) -> Duration {
        match self {
            ProbeKind::Icmp { timeout_ms } | ProbeKind::Tcp { timeout_ms, .. } => {
                Duration::from_millis(*timeout_ms)
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum NotifierConfig {
    Webhook {
        url: String,
        #[serde(default = "default_webhook_timeout")]
        timeout_ms: u64,
    },
}

pub fn default_timeout() -> u64 { 3500 }
fn default_webhook_timeout() -> u64 { 10_000 }

impl MonitorConfig {
    /// Defaults, then the JSON file, then `MONITOR_*` environment overrides,
    /// then validation.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let explicit = std::env::var("MONITOR_CONFIG").ok().map(PathBuf::from);
        Self::load_from(explicit.as_deref(), |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load) with the file path and environment given.
    /// Failures are logged at error level before being returned.
    pub fn load_from<F>(explicit: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let result = Self::assemble(explicit, lookup);
        if let Err(e) = &result {
            error!("Invalid configuration: {}", e);
        }
        result
    }

    fn assemble<F>(explicit: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if default_path.exists() => Self::from_file(default_path)?,
            None => {
                debug!("No {} found, starting from defaults", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };

        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies `MONITOR_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(target) = lookup("MONITOR_IP_ADDRESS") {
            self.target = target.trim().to_string();
        }
        if let Some(v) = lookup("MONITOR_FAILURE_THRESHOLD") {
            self.failure_threshold = parse_num("MONITOR_FAILURE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("MONITOR_CHECK_INTERVAL") {
            self.check_interval = parse_num("MONITOR_CHECK_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("MONITOR_RETRY_DELAY") {
            self.retry_delay = parse_num("MONITOR_RETRY_DELAY", &v)?;
        }
        if let Some(v) = lookup("MONITOR_LOG_SUCCESSFUL_PINGS") {
            self.log_successful_pings = parse_bool("MONITOR_LOG_SUCCESSFUL_PINGS", &v)?;
        }
        if let Some(v) = lookup("MONITOR_LOG_FILE") {
            let v = v.trim();
            self.log_file = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }

        let timeout_ms = match lookup("MONITOR_PROBE_TIMEOUT_MS") {
            Some(v) => parse_num("MONITOR_PROBE_TIMEOUT_MS", &v)?,
            None => self.probe.timeout().as_millis() as u64,
        };
        let port = match lookup("MONITOR_PROBE_PORT") {
            Some(v) => Some(parse_num::<u16>("MONITOR_PROBE_PORT", &v)?),
            None => match self.probe {
                ProbeKind::Tcp { port, .. } => Some(port),
                ProbeKind::Icmp { .. } => None,
            },
        };
        let kind = lookup("MONITOR_PROBE").map(|k| k.trim().to_ascii_lowercase());
        self.probe = match kind.as_deref() {
            Some("icmp") => ProbeKind::Icmp { timeout_ms },
            Some("tcp") => ProbeKind::Tcp {
                port: port.ok_or_else(|| {
                    ConfigError::invalid("MONITOR_PROBE_PORT", "required for tcp probes")
                })?,
                timeout_ms,
            },
            Some(other) => {
                return Err(ConfigError::invalid(
                    "MONITOR_PROBE",
                    format!("unknown probe '{}', expected icmp or tcp", other),
                ))
            }
            None => match &self.probe {
                ProbeKind::Icmp { .. } => ProbeKind::Icmp { timeout_ms },
                ProbeKind::Tcp { .. } => ProbeKind::Tcp {
                    port: port.unwrap_or_default(),
                    timeout_ms,
                },
            },
        };

        if let Some(url) = lookup("MONITOR_WEBHOOK_URL") {
            let url = url.trim();
            self.notifier = if url.is_empty() {
                None
            } else {
                Some(NotifierConfig::Webhook {
                    url: url.to_string(),
                    timeout_ms: default_webhook_timeout(),
                })
            };
        }
        if let Some(v) = lookup("MONITOR_STATS_PORT") {
            self.stats_port = Some(parse_num("MONITOR_STATS_PORT", &v)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold", "must be at least 1"));
        }
        if self.check_interval == 0 {
            return Err(ConfigError::invalid("check_interval", "must be a positive number of seconds"));
        }
        probe::validate_target(&self.target)
            .map_err(|e| ConfigError::invalid("target", e.to_string()))?;

        match self.probe {
            ProbeKind::Icmp { timeout_ms: 0 } | ProbeKind::Tcp { timeout_ms: 0, .. } => {
                return Err(ConfigError::invalid("probe.timeout_ms", "must be positive"));
            }
            ProbeKind::Tcp { port: 0, .. } => {
                return Err(ConfigError::invalid("probe.port", "must be a non-zero TCP port"));
            }
            _ => {}
        }

        if let Some(NotifierConfig::Webhook { url, timeout_ms }) = &self.notifier {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| ConfigError::invalid("notifier.url", e.to_string()))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::invalid("notifier.url", "scheme must be http or https"));
            }
            if *timeout_ms == 0 {
                return Err(ConfigError::invalid("notifier.timeout_ms", "must be positive"));
            }
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }
}

fn parse_num<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(field, format!("'{}': {}", value, e)))
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(field, format!("'{}' is not a boolean", other))),
    }
}
