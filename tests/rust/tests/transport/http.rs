//! Test: Streamable HTTP connections end to end
//!
//! Validates that:
//! 1. The factory handshakes with a live rmcp server through the repository
//! 2. The liveness probe succeeds against that server and reuse is stable
//! 3. Disconnect closes the session and leaves the handle inert
//! 4. Unreachable endpoints surface as transient errors

use std::sync::Arc;
use std::time::Duration;

use mcpconn_core::{
    ConnectionContext, ConnectionSettings, InMemoryServerConfigProvider, ServerConfig,
    TransportType,
};
use mcpconn_mcp::{
    Connection, ConnectionState, ConnectionsRepository, McpClientHandler, McpConnection,
    McpConnectionFactory, TransportFactory,
};
use pretty_assertions::assert_eq;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use tests::{init_tracing, same_connection};
use tokio_util::sync::CancellationToken;

use super::echo::EchoServer;

/// Start a server on a random port and return its URL and shutdown token
async fn start_server() -> (String, CancellationToken) {
    let ct = CancellationToken::new();

    let service = StreamableHttpService::new(
        || Ok(EchoServer),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
            cancellation_token: ct.child_token(),
        },
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to random port");
    let addr = listener.local_addr().unwrap();
    let url = format!("http://127.0.0.1:{}/mcp", addr.port());

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { ct_clone.cancelled().await })
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (url, ct)
}

fn settings() -> ConnectionSettings {
    ConnectionSettings::default()
        .with_connect_timeout(Duration::from_secs(5))
        .with_probe_timeout(Duration::from_secs(5))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_repository_connects_over_http() {
    init_tracing();
    let (url, ct) = start_server().await;

    let provider = InMemoryServerConfigProvider::new().with_server("echo", ServerConfig::http(&url));
    let repo = ConnectionsRepository::new(
        Arc::new(provider),
        Arc::new(McpConnectionFactory::new(settings())),
        Some(ConnectionContext::new("user-1")),
    );

    let connection = repo.get("echo").await.unwrap().expect("echo is configured");

    assert_eq!(connection.server_name(), "echo");
    assert_eq!(connection.transport_type(), TransportType::Http);
    assert!(connection.is_connected().await);

    let tools = connection
        .peer()
        .expect("live MCP connection exposes its peer")
        .list_tools(Default::default())
        .await
        .expect("list_tools should work");
    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "echo");

    // Reuse probes the same session
    let again = repo.get("echo").await.unwrap().unwrap();
    assert!(same_connection(&connection, &again));

    repo.disconnect("echo").await;
    assert!(repo.is_empty());
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(!connection.is_connected().await);
    assert!(connection.disconnect().await.is_ok());

    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sub_second_liveness_timeout_reuses_connection() {
    init_tracing();
    let (url, ct) = start_server().await;

    let settings = ConnectionSettings::default()
        .with_connect_timeout(Duration::from_millis(2500))
        .with_probe_timeout(Duration::from_millis(500));
    let provider = InMemoryServerConfigProvider::new().with_server("echo", ServerConfig::http(&url));
    let repo = ConnectionsRepository::new(
        Arc::new(provider),
        Arc::new(McpConnectionFactory::new(settings)),
        None,
    );

    let first = repo.get("echo").await.unwrap().unwrap();
    let second = repo.get("echo").await.unwrap().unwrap();

    assert!(same_connection(&first, &second));
    assert_eq!(second.state(), ConnectionState::Connected);

    repo.shutdown().await;
    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_headers_resolved_from_context() {
    init_tracing();
    let (url, ct) = start_server().await;

    // The server ignores the header; the placeholder only has to resolve
    let config = ServerConfig::http(&url).with_header("Authorization", "Bearer {{TOKEN}}");
    let provider = InMemoryServerConfigProvider::new().with_server("echo", config);
    let repo = ConnectionsRepository::new(
        Arc::new(provider),
        Arc::new(McpConnectionFactory::new(settings())),
        Some(ConnectionContext::new("user-1").with_var("TOKEN", "abc123")),
    );

    let connection = repo.get("echo").await.unwrap().unwrap();
    assert!(connection.is_connected().await);

    repo.shutdown().await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mcp_connection_tool_calls() {
    init_tracing();
    let (url, ct) = start_server().await;

    let config = ServerConfig::http(&url);
    let client = TransportFactory::create(
        "echo",
        &config.transport,
        McpClientHandler::new("echo", "mcpconn-test"),
        Duration::from_secs(5),
    )
    .connect()
    .await
    .ok()
    .expect("handshake should succeed");
    let connection = McpConnection::new("echo", TransportType::Http, client, Duration::from_secs(5));

    let before = connection.last_activity();
    let tools = connection.list_tools().await.unwrap();
    assert_eq!(tools.tools[0].name, "echo");

    let result = connection
        .call_tool("echo", Some(serde_json::json!({"msg": "hi"})))
        .await
        .unwrap();
    let text = result.content[0].as_text().expect("text content").text.clone();
    assert_eq!(text, r#"echo: {"msg":"hi"}"#);
    assert!(connection.last_activity() >= before);

    connection.disconnect().await.unwrap();
    assert!(connection.list_tools().await.is_err());
    ct.cancel();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_url_is_transient() {
    init_tracing();
    let provider = InMemoryServerConfigProvider::new()
        .with_server("down", ServerConfig::http("http://127.0.0.1:1/mcp"));
    let repo = ConnectionsRepository::new(
        Arc::new(provider),
        Arc::new(McpConnectionFactory::new(settings())),
        None,
    );

    let err = repo.get("down").await.err().expect("nothing listens on port 1");

    assert_eq!(err.server_name(), "down");
    assert!(err.is_transient(), "unexpected error: {:?}", err);
    assert!(repo.is_empty());
}
