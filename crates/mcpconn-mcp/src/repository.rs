//! Connections Repository - per-owner pool of live connections
//!
//! ConnectionsRepository is responsible for:
//! - Building connections lazily, at most once per server name
//! - Probing pooled connections before handing them out
//! - Replacing dead (and, with a policy, stale) connections in place
//! - Tearing connections down on request or shutdown
//!
//! Construction of one key is serialized on a per-key async mutex; different
//! keys never wait on each other. A connection enters the pool only after the
//! factory has returned it, so a dropped `get` leaves nothing behind.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{join_all, try_join_all};
use mcpconn_core::{ConnectionContext, ServerConfigProvider, StalenessPolicy};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::connection::Connection;
use crate::error::ConnectionError;
use crate::factory::{ConnectionFactory, ConnectionRequest};

/// Keyed pool of connections for one owner.
pub struct ConnectionsRepository {
    provider: Arc<dyn ServerConfigProvider>,
    factory: Arc<dyn ConnectionFactory>,
    context: Option<ConnectionContext>,
    staleness: Option<StalenessPolicy>,
    connections: DashMap<String, Arc<dyn Connection>>,
    /// Per-key construction locks, pruned once nobody holds them
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds a clone of one key's lock and removes the map entry on drop when
/// no other caller references it.
struct KeyLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    name: &'a str,
    lock: Arc<Mutex<()>>,
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        // One reference here, one in the map
        self.locks
            .remove_if(self.name, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

fn same_connection(a: &Arc<dyn Connection>, b: &Arc<dyn Connection>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl ConnectionsRepository {
    pub fn new(
        provider: Arc<dyn ServerConfigProvider>,
        factory: Arc<dyn ConnectionFactory>,
        context: Option<ConnectionContext>,
    ) -> Self {
        Self {
            provider,
            factory,
            context,
            staleness: None,
            connections: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Evict pooled connections that exceed `policy` even if they still
    /// answer their probe. Without a policy staleness is never acted on.
    pub fn with_staleness_policy(mut self, policy: StalenessPolicy) -> Self {
        self.staleness = Some(policy);
        self
    }

    pub fn context(&self) -> Option<&ConnectionContext> {
        self.context.as_ref()
    }

    /// True if the provider knows `server_name`. Does not look at the pool.
    pub fn has(&self, server_name: &str) -> bool {
        self.provider.get_server_config(server_name).is_some()
    }

    /// Return a live connection for `server_name`, building one if needed.
    ///
    /// `Ok(None)` means the provider has no config for that name. Factory
    /// errors are returned unchanged and leave the pool untouched.
    pub async fn get(
        &self,
        server_name: &str,
    ) -> Result<Option<Arc<dyn Connection>>, ConnectionError> {
        let key_lock = self.key_lock(server_name);
        let _guard = key_lock.lock.lock().await;

        if let Some(connection) = self.pooled(server_name) {
            if self.is_expired(server_name, connection.as_ref()) {
                info!(
                    server_name = %server_name,
                    created_at = %connection.created_at(),
                    last_activity = %connection.last_activity(),
                    "[ConnectionsRepository] Connection is stale, replacing"
                );
            } else if connection.is_connected().await {
                debug!(server_name = %server_name, "[ConnectionsRepository] Reusing connection");
                return Ok(Some(connection));
            } else {
                info!(
                    server_name = %server_name,
                    state = ?connection.state(),
                    "[ConnectionsRepository] Connection is not alive, replacing"
                );
            }

            self.connections
                .remove_if(server_name, |_, pooled| same_connection(pooled, &connection));
            Self::teardown(server_name, connection).await;
        }

        let Some(config) = self.provider.get_server_config(server_name) else {
            debug!(server_name = %server_name, "[ConnectionsRepository] No config for server");
            return Ok(None);
        };

        let connection = self
            .factory
            .create(
                ConnectionRequest::new(server_name, &config),
                self.context.as_ref(),
            )
            .await?;

        self.connections
            .insert(server_name.to_string(), Arc::clone(&connection));
        info!(
            server_name = %server_name,
            pooled = self.connections.len(),
            "[ConnectionsRepository] Connection added to pool"
        );
        Ok(Some(connection))
    }

    /// Concurrent [`get`](Self::get) for several names.
    ///
    /// Unknown names are left out of the result. The first error aborts the
    /// batch; connections already built by then stay pooled.
    pub async fn get_many<I, S>(
        &self,
        server_names: I,
    ) -> Result<HashMap<String, Arc<dyn Connection>>, ConnectionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = server_names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        let lookups = names.iter().map(|name| async move {
            self.get(name)
                .await
                .map(|connection| connection.map(|c| (name.clone(), c)))
        });

        let found = try_join_all(lookups).await?;
        Ok(found.into_iter().flatten().collect())
    }

    /// Snapshot of the pool. No probes, no provider or factory calls.
    pub fn get_loaded(&self) -> HashMap<String, Arc<dyn Connection>> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// [`get_many`](Self::get_many) over every server the provider knows.
    pub async fn get_all(&self) -> Result<HashMap<String, Arc<dyn Connection>>, ConnectionError> {
        let names: Vec<String> = self
            .provider
            .get_all_server_configs()
            .into_keys()
            .collect();
        self.get_many(names).await
    }

    /// Remove and tear down the connection for `server_name`, if pooled.
    ///
    /// Waits for an in-flight construction of the same name first. Teardown
    /// failures are logged; the entry is removed regardless.
    pub async fn disconnect(&self, server_name: &str) {
        let key_lock = self.key_lock(server_name);
        let _guard = key_lock.lock.lock().await;

        if let Some((_, connection)) = self.connections.remove(server_name) {
            info!(server_name = %server_name, "[ConnectionsRepository] Disconnecting");
            Self::teardown(server_name, connection).await;
        }
    }

    /// Empty the pool now and tear every connection down in the background.
    ///
    /// The pool is empty when this returns; the handles complete when the
    /// teardowns do. Must be called from within a Tokio runtime.
    ///
    /// Per-key locks are not taken. A `get` already past its liveness check
    /// can still return a connection being torn down here, and a construction
    /// in flight inserts its result after the drain. Use
    /// [`shutdown`](Self::shutdown) when nothing may survive.
    pub fn disconnect_all(&self) -> Vec<JoinHandle<()>> {
        let names: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let handles: Vec<JoinHandle<()>> = names
            .into_iter()
            .filter_map(|name| self.connections.remove(&name))
            .map(|(name, connection)| {
                tokio::spawn(async move {
                    Self::teardown(&name, connection).await;
                })
            })
            .collect();

        info!(
            count = handles.len(),
            "[ConnectionsRepository] Disconnecting all connections"
        );
        handles
    }

    /// [`disconnect_all`](Self::disconnect_all), then wait for constructions
    /// that were in flight, drain again and wait for every teardown.
    pub async fn shutdown(&self) {
        let mut handles = self.disconnect_all();

        let in_flight: Vec<String> = self.locks.iter().map(|entry| entry.key().clone()).collect();
        if !in_flight.is_empty() {
            debug!(
                count = in_flight.len(),
                "[ConnectionsRepository] Waiting for in-flight constructions"
            );
            for name in &in_flight {
                let key_lock = self.key_lock(name);
                let _guard = key_lock.lock.lock().await;
            }
            handles.extend(self.disconnect_all());
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "[ConnectionsRepository] Teardown task failed");
            }
        }
        info!("[ConnectionsRepository] Shutdown complete");
    }

    /// Number of pooled connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Names of pooled connections, sorted
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    fn key_lock<'a>(&'a self, server_name: &'a str) -> KeyLock<'a> {
        let lock = Arc::clone(
            self.locks
                .entry(server_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        KeyLock {
            locks: &self.locks,
            name: server_name,
            lock,
        }
    }

    fn pooled(&self, server_name: &str) -> Option<Arc<dyn Connection>> {
        self.connections
            .get(server_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn is_expired(&self, server_name: &str, connection: &dyn Connection) -> bool {
        let Some(policy) = &self.staleness else {
            return false;
        };
        let config_updated_at = if policy.check_config_updates {
            self.provider
                .get_server_config(server_name)
                .and_then(|config| config.updated_at)
        } else {
            None
        };
        connection.is_stale(&policy.thresholds(config_updated_at))
    }

    async fn teardown(server_name: &str, connection: Arc<dyn Connection>) {
        if let Err(e) = connection.disconnect().await {
            error!(
                server_name = %server_name,
                error = %e,
                "[ConnectionsRepository] Error disconnecting"
            );
        }
    }
}
