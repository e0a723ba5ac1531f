//! # McpConn Core Library
//!
//! Domain types shared by the connection layer for external MCP tool servers.
//!
//! ## Modules
//!
//! - `domain` - Server configuration, caller context, settings and staleness thresholds
//! - `provider` - The `ServerConfigProvider` seam and an in-memory implementation
//! - `placeholders` - `{{NAME}}` / `${env:NAME}` substitution in server configs

pub mod domain;
pub mod placeholders;
pub mod provider;

// Re-export commonly used types
pub use domain::*;
pub use placeholders::resolve_placeholders;
pub use provider::{InMemoryServerConfigProvider, ServerConfigProvider};
