//! Transport abstraction for MCP connections
//!
//! One [`Transport`] implementation per [`TransportConfig`] variant. Each owns
//! the handshake for its protocol and bounds it by the connect timeout.

mod http;
mod stdio;
mod websocket;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use mcpconn_core::{TransportConfig, TransportType};
use tracing::error;

pub use http::HttpTransport;
pub use stdio::{configure_child_process_platform, StdioTransport};
pub use websocket::WebSocketTransport;

use crate::connection::{McpClient, McpClientHandler};
use crate::error::ConnectionError;

/// Transport trait for MCP connections
///
/// Each transport implementation handles the specifics of connecting
/// to an MCP server using a particular protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel and complete the MCP initialize handshake
    async fn connect(&self) -> Result<McpClient, ConnectionError>;

    fn transport_type(&self) -> TransportType;

    /// Get a description for logging
    fn description(&self) -> String;
}

/// Factory for creating transport instances
pub struct TransportFactory;

impl TransportFactory {
    /// Pick the transport for a (placeholder-resolved) config.
    pub fn create(
        server_name: &str,
        config: &TransportConfig,
        handler: McpClientHandler,
        connect_timeout: Duration,
    ) -> Box<dyn Transport> {
        match config {
            TransportConfig::Stdio {
                command,
                args,
                env,
                cwd,
            } => Box::new(StdioTransport::new(
                server_name.to_string(),
                command.clone(),
                args.clone(),
                env.clone(),
                cwd.clone(),
                handler,
                connect_timeout,
            )),
            TransportConfig::Http { url, headers } => Box::new(HttpTransport::new(
                server_name.to_string(),
                url.clone(),
                headers.clone(),
                handler,
                connect_timeout,
            )),
            TransportConfig::WebSocket { url, headers } => Box::new(WebSocketTransport::new(
                server_name.to_string(),
                url.clone(),
                headers.clone(),
                handler,
                connect_timeout,
            )),
        }
    }
}

/// Convert configured headers for the HTTP client or the WebSocket upgrade.
///
/// Both transports build on the same `http` types, so one conversion serves
/// both and a bad header is rejected the same way before any dial.
pub(crate) fn header_map(
    server_name: &str,
    headers: &HashMap<String, String>,
) -> Result<reqwest::header::HeaderMap, ConnectionError> {
    let mut map = reqwest::header::HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            error!(server_name = %server_name, header = %key, "[Transport] Invalid header name");
            ConnectionError::invalid_config(
                server_name,
                format!("Invalid header name '{}': {}", key, e),
            )
        })?;
        let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            error!(server_name = %server_name, header = %key, "[Transport] Invalid header value");
            ConnectionError::invalid_config(
                server_name,
                format!("Invalid header value for '{}': {}", key, e),
            )
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Map the outcome of a timed `serve` call onto a connection error.
pub(crate) fn finish_handshake<E: std::fmt::Display>(
    server_name: &str,
    connect_timeout: Duration,
    outcome: Result<Result<McpClient, E>, tokio::time::error::Elapsed>,
) -> Result<McpClient, ConnectionError> {
    match outcome {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(e)) => {
            error!(server_name = %server_name, error = %e, "[Transport] MCP handshake failed");
            Err(ConnectionError::Handshake {
                server: server_name.to_string(),
                message: e.to_string(),
            })
        }
        Err(_) => {
            error!(
                server_name = %server_name,
                timeout = ?connect_timeout,
                "[Transport] Connection timeout"
            );
            Err(ConnectionError::Timeout {
                server: server_name.to_string(),
                timeout: connect_timeout,
            })
        }
    }
}
