//! Test: staleness eviction
//!
//! Validates that:
//! 1. Without a policy, age alone never replaces a live connection
//! 2. Age, idle and config-update limits replace connections when set
//! 3. A stale connection is torn down before its replacement is pooled

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mcpconn_core::StalenessThresholds;
use pretty_assertions::assert_eq;
use tests::fixtures::{self, three_servers};
use tests::{
    init_tracing, same_connection, Connection, ConnectionsRepository, MockConnection,
    MockConnectionFactory, StalenessPolicy,
};

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_no_policy_keeps_old_connection() {
    init_tracing();
    let provider = Arc::new(three_servers());
    let factory = Arc::new(MockConnectionFactory::new());
    let repo = fixtures::repository(&provider, &factory);

    let first = repo.get("server1").await.unwrap().unwrap();
    factory.last_created("server1").unwrap().backdate(24 * HOUR);

    let second = repo.get("server1").await.unwrap().unwrap();

    assert!(same_connection(&first, &second));
    assert_eq!(factory.call_count(), 1);
}

#[tokio::test]
async fn test_max_age_policy_replaces_connection() {
    init_tracing();
    let provider = Arc::new(three_servers());
    let factory = Arc::new(MockConnectionFactory::new());
    let repo = fixtures::repository(&provider, &factory)
        .with_staleness_policy(StalenessPolicy::default().with_max_age(HOUR));

    let first = repo.get("server1").await.unwrap().unwrap();
    let old_mock = factory.last_created("server1").unwrap();
    old_mock.backdate(2 * HOUR);

    let second = repo.get("server1").await.unwrap().unwrap();

    assert!(!same_connection(&first, &second));
    assert_eq!(old_mock.disconnect_calls(), 1);
    // Stale connections are replaced without probing
    assert_eq!(old_mock.probe_calls(), 0);
    assert_eq!(factory.call_count(), 2);
}

#[tokio::test]
async fn test_max_idle_policy_replaces_connection() {
    init_tracing();
    let provider = Arc::new(three_servers());
    let factory = Arc::new(MockConnectionFactory::new());
    let repo = fixtures::repository(&provider, &factory)
        .with_staleness_policy(StalenessPolicy::default().with_max_idle(Duration::from_secs(60)));

    let first = repo.get("server1").await.unwrap().unwrap();
    factory
        .last_created("server1")
        .unwrap()
        .backdate(Duration::from_secs(120));

    let second = repo.get("server1").await.unwrap().unwrap();

    assert!(!same_connection(&first, &second));
}

#[tokio::test]
async fn test_recent_connection_within_policy_is_reused() {
    init_tracing();
    let provider = Arc::new(three_servers());
    let factory = Arc::new(MockConnectionFactory::new());
    let repo = fixtures::repository(&provider, &factory).with_staleness_policy(
        StalenessPolicy::default()
            .with_max_age(HOUR)
            .with_max_idle(HOUR),
    );

    let first = repo.get("server1").await.unwrap().unwrap();
    let second = repo.get("server1").await.unwrap().unwrap();

    assert!(same_connection(&first, &second));
    assert_eq!(factory.call_count(), 1);
}

#[tokio::test]
async fn test_sub_second_idle_limit_is_honored() {
    init_tracing();
    let provider = Arc::new(three_servers());
    let factory = Arc::new(MockConnectionFactory::new());
    let repo = fixtures::repository(&provider, &factory).with_staleness_policy(
        StalenessPolicy::default().with_max_idle(Duration::from_millis(500)),
    );

    let first = repo.get("server1").await.unwrap().unwrap();
    let second = repo.get("server1").await.unwrap().unwrap();
    assert!(same_connection(&first, &second));

    factory
        .last_created("server1")
        .unwrap()
        .backdate(Duration::from_millis(800));
    let third = repo.get("server1").await.unwrap().unwrap();
    assert!(!same_connection(&first, &third));
}

#[tokio::test]
async fn test_config_update_replaces_connection() {
    init_tracing();
    let provider = Arc::new(three_servers());
    let factory = Arc::new(MockConnectionFactory::new());
    let repo = fixtures::repository(&provider, &factory)
        .with_staleness_policy(StalenessPolicy::default().with_config_updates(true));

    let first = repo.get("server1").await.unwrap().unwrap();
    factory.last_created("server1").unwrap().backdate(HOUR);

    let updated = fixtures::http_config()
        .with_header("Authorization", "Bearer rotated")
        .with_updated_at(Utc::now());
    provider.insert("server1", updated.clone());

    let second = repo.get("server1").await.unwrap().unwrap();

    assert!(!same_connection(&first, &second));
    assert_eq!(factory.calls().last().unwrap().1, updated);
}

#[tokio::test]
async fn test_config_update_ignored_without_flag() {
    init_tracing();
    let provider = Arc::new(three_servers());
    let factory = Arc::new(MockConnectionFactory::new());
    let repo = ConnectionsRepository::new(provider.clone(), factory.clone(), None)
        .with_staleness_policy(StalenessPolicy::default().with_max_age(24 * HOUR));

    let first = repo.get("server1").await.unwrap().unwrap();
    factory.last_created("server1").unwrap().backdate(HOUR);
    provider.insert(
        "server1",
        fixtures::http_config().with_updated_at(Utc::now()),
    );

    let second = repo.get("server1").await.unwrap().unwrap();

    assert!(same_connection(&first, &second));
}

#[test]
fn test_default_is_stale_uses_thresholds() {
    let connection = MockConnection::new("server1", mcpconn_core::TransportType::Http);

    assert!(!connection.is_stale(&StalenessThresholds::new()));
    assert!(!connection.is_stale(&StalenessThresholds::new().with_max_age(HOUR)));

    connection.backdate(2 * HOUR);
    assert!(connection.is_stale(&StalenessThresholds::new().with_max_age(HOUR)));
    assert!(connection.is_stale(&StalenessThresholds::new().with_max_idle(HOUR)));
}
