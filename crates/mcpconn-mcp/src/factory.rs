//! Connection factory
//!
//! Turns a named [`ServerConfig`] into a live [`Connection`]. The factory is
//! stateless: it never caches, pools or retries. That is the repository's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcpconn_core::{ConnectionContext, ConnectionSettings, ServerConfig};
use tracing::{debug, info};

use crate::connection::{Connection, McpClientHandler, McpConnection};
use crate::error::ConnectionError;
use crate::transport::TransportFactory;

/// What to connect to.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRequest<'a> {
    pub server_name: &'a str,
    pub server_config: &'a ServerConfig,
}

impl<'a> ConnectionRequest<'a> {
    pub fn new(server_name: &'a str, server_config: &'a ServerConfig) -> Self {
        Self {
            server_name,
            server_config,
        }
    }
}

/// Builds connections. Implemented by [`McpConnectionFactory`] and by test
/// doubles.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a connection and complete its handshake.
    ///
    /// `context` is whatever the calling repository was created with,
    /// forwarded unmodified.
    async fn create(
        &self,
        request: ConnectionRequest<'_>,
        context: Option<&ConnectionContext>,
    ) -> Result<Arc<dyn Connection>, ConnectionError>;
}

/// Factory for rmcp-backed connections over stdio, HTTP and WebSocket.
#[derive(Debug, Clone, Default)]
pub struct McpConnectionFactory {
    settings: ConnectionSettings,
}

impl McpConnectionFactory {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn connect_timeout(&self, config: &ServerConfig) -> Duration {
        config
            .connect_timeout()
            .unwrap_or_else(|| self.settings.connect_timeout())
    }
}

#[async_trait]
impl ConnectionFactory for McpConnectionFactory {
    async fn create(
        &self,
        request: ConnectionRequest<'_>,
        context: Option<&ConnectionContext>,
    ) -> Result<Arc<dyn Connection>, ConnectionError> {
        let server_name = request.server_name;

        let config = request.server_config.resolved(context);
        config
            .validate()
            .map_err(|e| ConnectionError::invalid_config(server_name, e))?;

        let connect_timeout = self.connect_timeout(&config);
        let handler = McpClientHandler::new(server_name, &self.settings.client_name);
        let transport =
            TransportFactory::create(server_name, &config.transport, handler, connect_timeout);

        debug!(
            server_name = %server_name,
            transport = %transport.description(),
            timeout = ?connect_timeout,
            owner_id = context.map(|c| c.owner_id.as_str()),
            "[ConnectionFactory] Creating connection"
        );

        let client = transport.connect().await?;
        let connection = McpConnection::new(
            server_name,
            transport.transport_type(),
            client,
            self.settings.probe_timeout(),
        );

        info!(
            server_name = %server_name,
            transport_type = %connection.transport_type(),
            "[ConnectionFactory] Connection established"
        );
        Ok(Arc::new(connection))
    }
}
