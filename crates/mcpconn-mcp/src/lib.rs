//! # McpConn MCP Library
//!
//! Connection lifecycle for external MCP tool servers.
//!
//! This crate provides:
//! - Connections over stdio (child process), Streamable HTTP and WebSocket
//! - A stateless factory that resolves placeholders, validates and handshakes
//! - A per-owner repository that pools one live connection per server name
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   ConnectionsRepository                         │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │  DashMap<server_name, Arc<dyn Connection>>               │   │
//! │  │  DashMap<server_name, Mutex<()>>   (construction locks)  │   │
//! │  │                                                          │   │
//! │  │  get: lock key → probe pooled → config → factory → pool  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//!            │ ServerConfigProvider           │ ConnectionFactory
//!            ▼                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    McpConnectionFactory                         │
//! │  ┌────────────────┐ ┌────────────────┐ ┌──────────────────┐   │
//! │  │ StdioTransport │ │  HttpTransport │ │WebSocketTransport│   │
//! │  │ (child process)│ │ (reqwest)      │ │ (tungstenite)    │   │
//! │  └────────────────┘ └────────────────┘ └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mcpconn_core::{ConnectionContext, ConnectionSettings, InMemoryServerConfigProvider, ServerConfig};
//! use mcpconn_mcp::{ConnectionsRepository, McpConnectionFactory};
//!
//! let provider = InMemoryServerConfigProvider::new()
//!     .with_server("memory", ServerConfig::stdio("npx", vec![
//!         "-y".to_string(),
//!         "@modelcontextprotocol/server-memory".to_string(),
//!     ]));
//!
//! let settings = ConnectionSettings::from_env();
//! let staleness = settings.staleness.clone();
//! let mut repository = ConnectionsRepository::new(
//!     Arc::new(provider),
//!     Arc::new(McpConnectionFactory::new(settings)),
//!     Some(ConnectionContext::new("user-42")),
//! );
//! if let Some(policy) = staleness {
//!     repository = repository.with_staleness_policy(policy);
//! }
//!
//! if let Some(connection) = repository.get("memory").await? {
//!     let tools = connection.peer().unwrap().list_tools(Default::default()).await?;
//! }
//!
//! repository.shutdown().await;
//! ```

pub mod connection;
pub mod error;
pub mod factory;
pub mod repository;
pub mod transport;

pub use connection::{Connection, ConnectionState, McpClient, McpClientHandler, McpConnection};
pub use error::ConnectionError;
pub use factory::{ConnectionFactory, ConnectionRequest, McpConnectionFactory};
pub use repository::ConnectionsRepository;
pub use transport::{
    HttpTransport, StdioTransport, Transport, TransportFactory, WebSocketTransport,
};
