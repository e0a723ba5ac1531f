//! Server configuration lookup
//!
//! The connection layer never owns server configuration. It asks a
//! [`ServerConfigProvider`] by name, on every construction, and treats the
//! answer as an immutable value.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::ServerConfig;

/// Resolves server names to their connection configuration.
///
/// Implementations must be cheap and side-effect free from the caller's point
/// of view: the repository calls `get_server_config` on every `has` and on
/// every connection construction.
pub trait ServerConfigProvider: Send + Sync {
    /// Configuration for one server, `None` if the name is unknown
    fn get_server_config(&self, server_name: &str) -> Option<ServerConfig>;

    /// Every configured server, keyed by name
    fn get_all_server_configs(&self) -> HashMap<String, ServerConfig>;
}

/// Map-backed provider for embedders that hold server configs in memory.
///
/// Replacing a config with a different value stamps `updated_at`, so pooled
/// connections built from the previous value can be detected as stale.
#[derive(Default)]
pub struct InMemoryServerConfigProvider {
    configs: RwLock<HashMap<String, ServerConfig>>,
}

impl InMemoryServerConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server (builder pattern).
    pub fn with_server(self, server_name: impl Into<String>, config: ServerConfig) -> Self {
        self.configs.write().insert(server_name.into(), config);
        self
    }

    /// Insert or replace a server config, returning the previous one.
    pub fn insert(&self, server_name: impl Into<String>, config: ServerConfig) -> Option<ServerConfig> {
        let server_name = server_name.into();
        let mut configs = self.configs.write();

        let changed = configs
            .get(&server_name)
            .is_some_and(|previous| previous.transport != config.transport);
        let config = if changed && config.updated_at.is_none() {
            debug!(server_name = %server_name, "[ServerConfigProvider] Config changed");
            config.with_updated_at(Utc::now())
        } else {
            config
        };

        configs.insert(server_name, config)
    }

    pub fn remove(&self, server_name: &str) -> Option<ServerConfig> {
        self.configs.write().remove(server_name)
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}

impl ServerConfigProvider for InMemoryServerConfigProvider {
    fn get_server_config(&self, server_name: &str) -> Option<ServerConfig> {
        self.configs.read().get(server_name).cloned()
    }

    fn get_all_server_configs(&self) -> HashMap<String, ServerConfig> {
        self.configs.read().clone()
    }
}
