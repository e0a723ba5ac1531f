//! Staleness thresholds for pooled connections.
//!
//! Staleness is an age/idle signal, distinct from liveness: a connection can
//! be stale and still answer its probe. Evaluating it never performs I/O.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Limits a connection is compared against. Every limit is optional and an
/// empty set of thresholds never reports a connection as stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StalenessThresholds {
    /// Maximum time since the connection was established
    pub max_age: Option<Duration>,
    /// Maximum time since the connection was last used or probed
    pub max_idle: Option<Duration>,
    /// Connections created before this instant predate the current config
    pub config_updated_at: Option<DateTime<Utc>>,
}

impl StalenessThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = Some(max_idle);
        self
    }

    pub fn with_config_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.config_updated_at = Some(updated_at);
        self
    }

    /// True if no limit is set
    pub fn is_empty(&self) -> bool {
        self.max_age.is_none() && self.max_idle.is_none() && self.config_updated_at.is_none()
    }

    /// Compare the timestamps of a connection against these limits at `now`.
    pub fn is_exceeded(
        &self,
        created_at: DateTime<Utc>,
        last_activity: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(updated_at) = self.config_updated_at {
            if updated_at > created_at {
                return true;
            }
        }

        if let Some(max_age) = self.max_age {
            if elapsed(created_at, now) > max_age {
                return true;
            }
        }

        if let Some(max_idle) = self.max_idle {
            if elapsed(last_activity, now) > max_idle {
                return true;
            }
        }

        false
    }
}

// Clock skew (timestamp in the future) counts as no time elapsed.
fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
