//! Connection handles
//!
//! A [`Connection`] is one stateful session with one server. Liveness is
//! probed over the wire on demand, never cached; staleness is computed from
//! timestamps alone.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcpconn_core::{StalenessThresholds, TransportType};
use parking_lot::RwLock;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, ClientRequest,
    Implementation, ListToolsResult, LoggingLevel, PingRequest,
};
use rmcp::service::{NotificationContext, Peer, RunningService, ServiceError};
use rmcp::RoleClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::ConnectionError;

/// Type alias for the MCP client service
pub type McpClient = RunningService<RoleClient, McpClientHandler>;

/// Client handler for MCP connections
#[derive(Clone)]
pub struct McpClientHandler {
    info: ClientInfo,
    server_name: String,
}

impl std::fmt::Debug for McpClientHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClientHandler")
            .field("server_name", &self.server_name)
            .field("client_name", &self.info.client_info.name)
            .finish()
    }
}

impl McpClientHandler {
    pub fn new(server_name: &str, client_name: &str) -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: format!("{}-{}", client_name, server_name),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: None,
                    icons: None,
                    website_url: None,
                    ..Default::default()
                },
                meta: None,
            },
            server_name: server_name.to_string(),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

impl rmcp::ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }

    fn on_tool_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        async move {
            info!(
                server_name = %self.server_name,
                "[McpClientHandler] Server sent tools/list_changed notification"
            );
        }
    }

    fn on_logging_message(
        &self,
        params: rmcp::model::LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        async move {
            let message = match &params.data {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };

            match params.level {
                LoggingLevel::Debug => debug!(
                    server_name = %self.server_name,
                    logger = ?params.logger,
                    "[McpClientHandler] Server log: {}",
                    message
                ),
                LoggingLevel::Info | LoggingLevel::Notice => info!(
                    server_name = %self.server_name,
                    logger = ?params.logger,
                    "[McpClientHandler] Server log: {}",
                    message
                ),
                LoggingLevel::Warning => warn!(
                    server_name = %self.server_name,
                    logger = ?params.logger,
                    "[McpClientHandler] Server log: {}",
                    message
                ),
                LoggingLevel::Error
                | LoggingLevel::Critical
                | LoggingLevel::Alert
                | LoggingLevel::Emergency => error!(
                    server_name = %self.server_name,
                    logger = ?params.logger,
                    "[McpClientHandler] Server log: {}",
                    message
                ),
            }
        }
    }
}

/// Observed state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Handshake completed, not yet torn down
    Connected,
    /// Torn down by `disconnect()`
    Disconnected,
    /// A liveness probe failed or timed out
    Failed,
}

/// One live session with one server.
///
/// Constructed only by a [`ConnectionFactory`](crate::ConnectionFactory).
/// Once a connection leaves [`ConnectionState::Connected`] it never returns
/// to it; the pool discards it and builds a new one.
#[async_trait]
pub trait Connection: Send + Sync {
    fn server_name(&self) -> &str;

    fn transport_type(&self) -> TransportType;

    /// Probe the server. Never errors: any failure reads as `false`.
    async fn is_connected(&self) -> bool;

    /// Compare age and idle time against `thresholds`. No I/O.
    fn is_stale(&self, thresholds: &StalenessThresholds) -> bool {
        thresholds.is_exceeded(self.created_at(), self.last_activity(), Utc::now())
    }

    /// Tear the session down. Idempotent; later calls return `Ok(())`.
    async fn disconnect(&self) -> Result<(), ConnectionError>;

    /// When the handshake completed
    fn created_at(&self) -> DateTime<Utc>;

    /// Last successful probe or request
    fn last_activity(&self) -> DateTime<Utc>;

    /// Record activity now
    fn touch(&self);

    fn state(&self) -> ConnectionState;

    /// rmcp peer for issuing protocol requests
    fn peer(&self) -> Option<Peer<RoleClient>> {
        None
    }
}

/// [`Connection`] backed by an rmcp client session.
pub struct McpConnection {
    server_name: String,
    transport_type: TransportType,
    peer: Peer<RoleClient>,
    client: tokio::sync::Mutex<Option<McpClient>>,
    state: RwLock<ConnectionState>,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
    probe_timeout: Duration,
}

impl std::fmt::Debug for McpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpConnection")
            .field("server_name", &self.server_name)
            .field("transport_type", &self.transport_type)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl McpConnection {
    pub fn new(
        server_name: impl Into<String>,
        transport_type: TransportType,
        client: McpClient,
        probe_timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            server_name: server_name.into(),
            transport_type,
            peer: client.peer().clone(),
            client: tokio::sync::Mutex::new(Some(client)),
            state: RwLock::new(ConnectionState::Connected),
            created_at: now,
            last_activity: RwLock::new(now),
            probe_timeout,
        }
    }

    /// List the server's tools (first page).
    pub async fn list_tools(&self) -> anyhow::Result<ListToolsResult> {
        use anyhow::Context;

        let result = self
            .peer
            .list_tools(Default::default())
            .await
            .context("Failed to list tools")?;
        self.touch();
        Ok(result)
    }

    /// Call a tool. Non-object arguments are dropped.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> anyhow::Result<CallToolResult> {
        use anyhow::Context;

        debug!(server_name = %self.server_name, tool = %name, "[McpConnection] Calling tool");

        let arguments: Option<Map<String, Value>> = arguments.and_then(|v| v.as_object().cloned());
        let result = self
            .peer
            .call_tool(CallToolRequestParams {
                name: name.to_string().into(),
                arguments,
                task: None,
                meta: None,
            })
            .await
            .with_context(|| format!("Tool call failed: {}", name))?;
        self.touch();
        Ok(result)
    }

    fn mark_failed(&self, reason: &str) {
        let mut state = self.state.write();
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Failed;
            warn!(
                server_name = %self.server_name,
                reason = %reason,
                "[McpConnection] Liveness probe failed"
            );
        }
    }
}

#[async_trait]
impl Connection for McpConnection {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    async fn is_connected(&self) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }

        let ping = self
            .peer
            .send_request(ClientRequest::PingRequest(PingRequest::default()));

        match tokio::time::timeout(self.probe_timeout, ping).await {
            // An error reply still means the session is up
            Ok(Ok(_)) | Ok(Err(ServiceError::McpError(_))) => {
                self.touch();
                true
            }
            Ok(Err(e)) => {
                self.mark_failed(&e.to_string());
                false
            }
            Err(_) => {
                self.mark_failed(&format!("no reply within {:?}", self.probe_timeout));
                false
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        let Some(client) = self.client.lock().await.take() else {
            return Ok(());
        };
        *self.state.write() = ConnectionState::Disconnected;

        info!(server_name = %self.server_name, "[McpConnection] Disconnecting");
        client
            .cancel()
            .await
            .map(|reason| {
                debug!(server_name = %self.server_name, ?reason, "[McpConnection] Disconnected");
            })
            .map_err(|e| ConnectionError::Disconnect {
                server: self.server_name.clone(),
                message: e.to_string(),
            })
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.read()
    }

    fn touch(&self) {
        *self.last_activity.write() = Utc::now();
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn peer(&self) -> Option<Peer<RoleClient>> {
        Some(self.peer.clone())
    }
}
