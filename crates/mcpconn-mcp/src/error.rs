//! Connection errors

use std::time::Duration;

use thiserror::Error;

/// Errors raised while building or tearing down a connection.
///
/// An unknown server name is not an error (the repository returns `None`),
/// and neither is a dead pooled connection (it is replaced transparently).
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("[{server}] invalid configuration: {reason}")]
    InvalidConfig { server: String, reason: String },

    #[error("[{server}] command not found: {command}. Ensure it's installed and in PATH.")]
    CommandNotFound { server: String, command: String },

    #[error("[{server}] failed to spawn process: {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{server}] MCP handshake failed: {message}")]
    Handshake { server: String, message: String },

    #[error("[{server}] connection timeout ({timeout:?})")]
    Timeout { server: String, timeout: Duration },

    #[error("[{server}] transport error: {message}")]
    Transport { server: String, message: String },

    #[error("[{server}] disconnect failed: {message}")]
    Disconnect { server: String, message: String },
}

impl ConnectionError {
    pub fn invalid_config(server: &str, reason: impl ToString) -> Self {
        Self::InvalidConfig {
            server: server.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Name of the server the error belongs to
    pub fn server_name(&self) -> &str {
        match self {
            Self::InvalidConfig { server, .. }
            | Self::CommandNotFound { server, .. }
            | Self::Spawn { server, .. }
            | Self::Handshake { server, .. }
            | Self::Timeout { server, .. }
            | Self::Transport { server, .. }
            | Self::Disconnect { server, .. } => server,
        }
    }

    /// True for failures that a later attempt may not repeat
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport { .. } | Self::Handshake { .. }
        )
    }
}
