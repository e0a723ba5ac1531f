//! Test: stdio transport failures

use std::sync::Arc;
use std::time::Duration;

use mcpconn_core::{ConnectionSettings, InMemoryServerConfigProvider, ServerConfig};
use mcpconn_mcp::{ConnectionError, ConnectionsRepository, McpConnectionFactory};
use tests::init_tracing;

fn repository(config: ServerConfig, settings: ConnectionSettings) -> ConnectionsRepository {
    let provider = InMemoryServerConfigProvider::new().with_server("local", config);
    ConnectionsRepository::new(
        Arc::new(provider),
        Arc::new(McpConnectionFactory::new(settings)),
        None,
    )
}

#[tokio::test]
async fn test_missing_command_is_reported() {
    init_tracing();
    let repo = repository(
        ServerConfig::stdio("mcpconn-no-such-binary-xyz", vec![]),
        ConnectionSettings::default(),
    );

    let err = repo.get("local").await.err().expect("command does not exist");

    match err {
        ConnectionError::CommandNotFound { server, command } => {
            assert_eq!(server, "local");
            assert!(command.contains("mcpconn-no-such-binary-xyz"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(repo.is_empty());
}

#[tokio::test]
async fn test_empty_command_is_config_error() {
    init_tracing();
    let repo = repository(ServerConfig::stdio("  ", vec![]), ConnectionSettings::default());

    let err = repo.get("local").await.err().expect("empty command");

    assert!(matches!(err, ConnectionError::InvalidConfig { .. }));
}

/// `cat` echoes the initialize request back instead of answering it
#[cfg(unix)]
#[tokio::test]
async fn test_non_mcp_process_fails_handshake() {
    init_tracing();
    let repo = repository(
        ServerConfig::stdio("cat", vec![]),
        ConnectionSettings::default().with_connect_timeout(Duration::from_secs(1)),
    );

    let err = tokio::time::timeout(Duration::from_secs(10), repo.get("local"))
        .await
        .expect("handshake deadline should fire first")
        .err()
        .expect("cat is not an MCP server");

    assert!(err.is_transient(), "unexpected error: {:?}", err);
    assert!(repo.is_empty());
}
