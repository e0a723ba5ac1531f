//! Transport Integration Tests
//!
//! Drives the real factory and repository against live endpoints:
//! - Streamable HTTP against an in-process rmcp server
//! - stdio against missing and misbehaving commands
//! - WebSocket against an in-process rmcp server and a closed port

mod echo;
mod http;
mod stdio;
