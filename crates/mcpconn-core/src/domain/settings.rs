//! Runtime settings for connection construction and pooling.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::staleness::StalenessThresholds;

/// Default handshake deadline
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Default liveness probe deadline
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Name reported to servers in the MCP initialize handshake
pub const DEFAULT_CLIENT_NAME: &str = "mcpconn";

const ENV_CONNECT_TIMEOUT: &str = "MCPCONN_CONNECT_TIMEOUT_SECS";
const ENV_PROBE_TIMEOUT: &str = "MCPCONN_PROBE_TIMEOUT_SECS";
const ENV_MAX_AGE: &str = "MCPCONN_MAX_AGE_SECS";
const ENV_MAX_IDLE: &str = "MCPCONN_MAX_IDLE_SECS";
const ENV_CLIENT_NAME: &str = "MCPCONN_CLIENT_NAME";

/// Explicit eviction policy for pooled connections.
///
/// Without one, staleness is advisory only and a live connection is never
/// replaced because of its age.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessPolicy {
    pub max_age_ms: Option<u64>,
    pub max_idle_ms: Option<u64>,
    /// Replace connections created before their server config last changed
    pub check_config_updates: bool,
}

impl StalenessPolicy {
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age_ms = Some(duration_to_millis(max_age));
        self
    }

    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle_ms = Some(duration_to_millis(max_idle));
        self
    }

    pub fn with_config_updates(mut self, enabled: bool) -> Self {
        self.check_config_updates = enabled;
        self
    }

    /// Thresholds for one server, given when its config last changed.
    pub fn thresholds(&self, config_updated_at: Option<DateTime<Utc>>) -> StalenessThresholds {
        StalenessThresholds {
            max_age: self.max_age_ms.map(Duration::from_millis),
            max_idle: self.max_idle_ms.map(Duration::from_millis),
            config_updated_at: if self.check_config_updates {
                config_updated_at
            } else {
                None
            },
        }
    }
}

/// Settings shared by the connection factory and repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub connect_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub staleness: Option<StalenessPolicy>,
    pub client_name: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            staleness: None,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        }
    }
}

impl ConnectionSettings {
    /// Defaults overlaid with `MCPCONN_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(ms) = parse_secs_as_millis(&lookup, ENV_CONNECT_TIMEOUT) {
            settings.connect_timeout_ms = ms;
        }
        if let Some(ms) = parse_secs_as_millis(&lookup, ENV_PROBE_TIMEOUT) {
            settings.probe_timeout_ms = ms;
        }

        let max_age = parse_secs_as_millis(&lookup, ENV_MAX_AGE);
        let max_idle = parse_secs_as_millis(&lookup, ENV_MAX_IDLE);
        if max_age.is_some() || max_idle.is_some() {
            settings.staleness = Some(StalenessPolicy {
                max_age_ms: max_age,
                max_idle_ms: max_idle,
                check_config_updates: false,
            });
        }

        if let Some(name) = lookup(ENV_CLIENT_NAME).filter(|n| !n.trim().is_empty()) {
            settings.client_name = name;
        }

        debug!(?settings, "[ConnectionSettings] Loaded");
        settings
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_to_millis(timeout);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = duration_to_millis(timeout);
        self
    }

    pub fn with_staleness(mut self, policy: StalenessPolicy) -> Self {
        self.staleness = Some(policy);
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Whole milliseconds, rounded up so a non-zero duration never becomes zero.
pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

// Environment values are given in seconds.
fn parse_secs_as_millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(secs.saturating_mul(1000)),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "[ConnectionSettings] Ignoring invalid value");
            None
        }
    }
}
