//! WebSocket transport for MCP servers
//!
//! Each JSON-RPC message travels as one text frame. The socket is split into
//! a sink of outgoing messages and a stream of incoming ones, which rmcp
//! drives directly.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use futures::{SinkExt, StreamExt};
use mcpconn_core::TransportType;
use rmcp::service::{RxJsonRpcMessage, TxJsonRpcMessage};
use rmcp::{RoleClient, ServiceExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use super::{finish_handshake, header_map, Transport};
use crate::connection::{McpClient, McpClientHandler};
use crate::error::ConnectionError;

/// WebSocket transport for `ws://` and `wss://` MCP servers
pub struct WebSocketTransport {
    server_name: String,
    url: String,
    headers: HashMap<String, String>,
    handler: McpClientHandler,
    connect_timeout: Duration,
}

impl WebSocketTransport {
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

    /// Upgrade request for the configured URL with the configured headers.
    fn build_request(&self) -> Result<Request, ConnectionError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectionError::invalid_config(&self.server_name, e))?;

        request
            .headers_mut()
            .extend(header_map(&self.server_name, &self.headers)?);

        Ok(request)
    }
}

fn encode(message: TxJsonRpcMessage<RoleClient>) -> Result<Message, tungstenite::Error> {
    serde_json::to_string(&message)
        .map(Message::Text)
        .map_err(|e| tungstenite::Error::Io(std::io::Error::other(e)))
}

fn decode(server_name: &str, frame: Message) -> Option<RxJsonRpcMessage<RoleClient>> {
    let parsed = match frame {
        Message::Text(text) => serde_json::from_str(&text),
        Message::Binary(bytes) => serde_json::from_slice(&bytes),
        // Control frames are answered by tungstenite itself
        _ => return None,
    };

    match parsed {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(
                server_name = %server_name,
                error = %e,
                "[WebSocketTransport] Dropping malformed message"
            );
            None
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<McpClient, ConnectionError> {
        info!(
            server_name = %self.server_name,
            url = %self.url,
            "[WebSocketTransport] Connecting to WebSocket server"
        );

        let request = self.build_request()?;
        let dial = tokio_tungstenite::connect_async(request);
        let socket = match tokio::time::timeout(self.connect_timeout, dial).await {
            Ok(Ok((socket, response))) => {
                debug!(
                    server_name = %self.server_name,
                    status = %response.status(),
                    "[WebSocketTransport] Upgrade accepted"
                );
                socket
            }
            Ok(Err(e)) => {
                error!(server_name = %self.server_name, error = %e, "[WebSocketTransport] Dial failed");
                return Err(ConnectionError::Transport {
                    server: self.server_name.clone(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(ConnectionError::Timeout {
                    server: self.server_name.clone(),
                    timeout: self.connect_timeout,
                });
            }
        };

        let (sink, stream) = socket.split();
        let sink = Box::pin(
            sink.with(|message: TxJsonRpcMessage<RoleClient>| future::ready(encode(message))),
        );

        let server_name = self.server_name.clone();
        let stream = Box::pin(
            stream
                .take_while(|frame| future::ready(frame.is_ok()))
                .filter_map(move |frame| {
                    future::ready(frame.ok().and_then(|frame| decode(&server_name, frame)))
                }),
        );

        let connect_future = self.handler.clone().serve((sink, stream));
        let outcome = tokio::time::timeout(self.connect_timeout, connect_future).await;
        let client = finish_handshake(&self.server_name, self.connect_timeout, outcome)?;

        info!(server_name = %self.server_name, "[WebSocketTransport] WebSocket server connected");
        Ok(client)
    }

    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }

    fn description(&self) -> String {
        format!("websocket:{}", self.url)
    }
}
