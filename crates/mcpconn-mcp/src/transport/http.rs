//! HTTP transport for MCP servers
//!
//! Handles connecting to MCP servers over Streamable HTTP. Configured headers
//! are installed as default headers on the underlying reqwest client, so they
//! ride along on every request of the session.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use mcpconn_core::TransportType;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::ServiceExt;
use tracing::{debug, info};

use super::{finish_handshake, header_map, Transport};
use crate::connection::{McpClient, McpClientHandler};
use crate::error::ConnectionError;

/// HTTP transport for Streamable HTTP MCP servers
pub struct HttpTransport {
    server_name: String,
    url: String,
    headers: HashMap<String, String>,
    handler: McpClientHandler,
    connect_timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        server_name: String,
        url: String,
        headers: HashMap<String, String>,
        handler: McpClientHandler,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            server_name,
            url,
            headers,
            handler,
            connect_timeout,
        }
    }

    /// Build a reqwest::Client with configured headers as default_headers.
    fn build_http_client(
        &self,
        headers: reqwest::header::HeaderMap,
    ) -> Result<reqwest::Client, ConnectionError> {
        reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectionError::Transport {
                server: self.server_name.clone(),
                message: format!("Failed to build HTTP client: {}", e),
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> Result<McpClient, ConnectionError> {
        info!(
            server_name = %self.server_name,
            url = %self.url,
            "[HttpTransport] Connecting to HTTP server"
        );

        let headers = header_map(&self.server_name, &self.headers)?;
        if !headers.is_empty() {
            debug!(
                server_name = %self.server_name,
                header_count = headers.len(),
                "[HttpTransport] Applying configured headers"
            );
        }

        let client = self.build_http_client(headers)?;
        let transport_config = StreamableHttpClientTransportConfig::with_uri(self.url.as_str());
        let transport = StreamableHttpClientTransport::with_client(client, transport_config);

        let connect_future = self.handler.clone().serve(transport);
        let outcome = tokio::time::timeout(self.connect_timeout, connect_future).await;
        let client = finish_handshake(&self.server_name, self.connect_timeout, outcome)?;

        info!(server_name = %self.server_name, "[HttpTransport] HTTP server connected");
        Ok(client)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Http
    }

    fn description(&self) -> String {
        format!("http:{}", self.url)
    }
}
