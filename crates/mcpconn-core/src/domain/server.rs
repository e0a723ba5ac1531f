//! Server configuration: which transport to use and how to reach it.
//!
//! A [`ServerConfig`] is an opaque value handed out by a provider. The
//! factory resolves its placeholders and validates it before connecting.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::context::ConnectionContext;
use crate::domain::settings::duration_to_millis;
use crate::placeholders::resolve_placeholders;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Stdio,
    Http,
    #[serde(rename = "websocket")]
    WebSocket,
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Stdio => f.write_str("stdio"),
            TransportType::Http => f.write_str("http"),
            TransportType::WebSocket => f.write_str("websocket"),
        }
    }
}

/// Transport parameters for one tool server.
///
/// Serialized with a `type` tag so a config reads like
/// `{"type": "stdio", "command": "npx", "args": ["-y", "server"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Child process speaking MCP over stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
    },
    /// Streamable HTTP
    #[serde(alias = "streamable_http", alias = "streamable-http")]
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// WebSocket (`ws://` or `wss://`)
    #[serde(rename = "websocket")]
    WebSocket {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl TransportConfig {
    pub fn transport_type(&self) -> TransportType {
        match self {
            TransportConfig::Stdio { .. } => TransportType::Stdio,
            TransportConfig::Http { .. } => TransportType::Http,
            TransportConfig::WebSocket { .. } => TransportType::WebSocket,
        }
    }

    /// URL for network transports, `None` for stdio
    pub fn url(&self) -> Option<&str> {
        match self {
            TransportConfig::Http { url, .. } | TransportConfig::WebSocket { url, .. } => Some(url),
            TransportConfig::Stdio { .. } => None,
        }
    }
}

/// Errors found while validating a server configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme '{scheme}' for {transport} transport")]
    UnsupportedScheme {
        scheme: String,
        transport: TransportType,
    },
}

/// Connection configuration for one named server, as resolved by a
/// [`ServerConfigProvider`](crate::ServerConfigProvider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(flatten)]
    pub transport: TransportConfig,

    /// Per-server handshake deadline in milliseconds, overrides the factory default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,

    /// When the provider last changed this server's configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ServerConfig {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            connect_timeout_ms: None,
            updated_at: None,
        }
    }

    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self::new(TransportConfig::Stdio {
            command: command.into(),
            args,
            env: HashMap::new(),
            cwd: None,
        })
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self::new(TransportConfig::Http {
            url: url.into(),
            headers: HashMap::new(),
        })
    }

    pub fn websocket(url: impl Into<String>) -> Self {
        Self::new(TransportConfig::WebSocket {
            url: url.into(),
            headers: HashMap::new(),
        })
    }

    /// Add an environment variable (stdio only, ignored otherwise)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let TransportConfig::Stdio { env, .. } = &mut self.transport {
            env.insert(key.into(), value.into());
        }
        self
    }

    /// Add a request header (network transports only, ignored for stdio)
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self.transport {
            TransportConfig::Http { headers, .. } | TransportConfig::WebSocket { headers, .. } => {
                headers.insert(key.into(), value.into());
            }
            TransportConfig::Stdio { .. } => {}
        }
        self
    }

    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        if let TransportConfig::Stdio { cwd, .. } = &mut self.transport {
            *cwd = Some(dir.into());
        }
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(duration_to_millis(timeout));
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport.transport_type()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Check that the transport parameters can be used to open a connection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.transport {
            TransportConfig::Stdio { command, .. } => {
                if command.trim().is_empty() {
                    return Err(ConfigError::EmptyCommand);
                }
                Ok(())
            }
            TransportConfig::Http { url, .. } => {
                validate_url(url, &["http", "https"], TransportType::Http)
            }
            TransportConfig::WebSocket { url, .. } => {
                validate_url(url, &["ws", "wss"], TransportType::WebSocket)
            }
        }
    }

    /// Return a copy with every `{{NAME}}` and `${env:NAME}` placeholder
    /// substituted from the caller context and process environment.
    ///
    /// Placeholders without a value are left as-is.
    pub fn resolved(&self, context: Option<&ConnectionContext>) -> ServerConfig {
        let resolve = |value: &str| resolve_placeholders(value, context);

        let transport = match &self.transport {
            TransportConfig::Stdio {
                command,
                args,
                env,
                cwd,
            } => TransportConfig::Stdio {
                command: resolve(command),
                args: args.iter().map(|arg| resolve(arg)).collect(),
                env: env.iter().map(|(k, v)| (k.clone(), resolve(v))).collect(),
                cwd: cwd
                    .as_ref()
                    .map(|dir| PathBuf::from(resolve(&dir.to_string_lossy()))),
            },
            TransportConfig::Http { url, headers } => TransportConfig::Http {
                url: resolve(url),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.clone(), resolve(v)))
                    .collect(),
            },
            TransportConfig::WebSocket { url, headers } => TransportConfig::WebSocket {
                url: resolve(url),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.clone(), resolve(v)))
                    .collect(),
            },
        };

        ServerConfig {
            transport,
            connect_timeout_ms: self.connect_timeout_ms,
            updated_at: self.updated_at,
        }
    }
}

fn validate_url(raw: &str, schemes: &[&str], transport: TransportType) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(ConfigError::UnsupportedScheme {
            scheme: parsed.scheme().to_string(),
            transport,
        });
    }
    Ok(())
}
