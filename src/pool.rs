//! # Client Pool
//!
//! Caches one live database client per tenant schema, bounded by a maximum
//! size. A full pool evicts the least-recently-accessed entry rather than
//! rejecting the request: tenant access is bursty and non-uniform, so a cold
//! reconnect later is cheaper than a user-visible error now. An optional
//! hard-limit mode flips that trade-off for deployments that prefer
//! rejection.
//!
//! The interior map is the pool's single shared mutable resource. One async
//! mutex guards the whole fetch-or-create sequence, so concurrent misses on
//! the same schema coalesce into a single connection creation and eviction
//! can never remove an entry another caller is mid-way through creating.

use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use metrics::{counter, gauge};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::{DisconnectFailure, PoolError};

/// Minimal connection capability the pool depends on. Adapters implement
/// this per concrete driver; the pool never sees anything driver-specific.
#[async_trait]
pub trait ClientConnection: Send + Sync + std::fmt::Debug {
    async fn connect(&self) -> anyhow::Result<()>;
    async fn disconnect(&self) -> anyhow::Result<()>;
}

/// Creates unconnected clients scoped to one tenant schema.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create_client(&self, schema_name: &str) -> anyhow::Result<Arc<dyn ClientConnection>>;
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub active_clients: usize,
    pub max_clients: usize,
    pub total_created: u64,
    pub total_evicted: u64,
}

struct PoolEntry {
    client: Arc<dyn ClientConnection>,
    created_at: Instant,
    last_accessed_at: Instant,
}

struct PoolInner {
    // Unbounded: capacity is enforced by hand because eviction must
    // disconnect the victim, which is an async operation.
    entries: LruCache<String, PoolEntry>,
    total_created: u64,
    total_evicted: u64,
}

/// Per-schema client pool with LRU eviction and idle reaping.
pub struct ClientPool {
    factory: Arc<dyn ClientFactory>,
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

impl ClientPool {
    pub fn new(factory: Arc<dyn ClientFactory>, config: PoolConfig) -> Self {
        Self {
            factory,
            config,
            inner: Mutex::new(PoolInner {
                entries: LruCache::unbounded(),
                total_created: 0,
                total_evicted: 0,
            }),
        }
    }

    /// Returns the cached client for `schema_name`, creating and connecting
    /// one on a miss. At capacity the least-recently-accessed entry is
    /// evicted first (ties broken by oldest creation).
    pub async fn get_client(
        &self,
        schema_name: &str,
    ) -> Result<Arc<dyn ClientConnection>, PoolError> {
        let mut inner = self.inner.lock().await;

        if let Some(entry) = inner.entries.get_mut(schema_name) {
            entry.last_accessed_at = Instant::now();
            return Ok(Arc::clone(&entry.client));
        }

        if inner.entries.len() >= self.config.max_clients && self.config.reject_when_full {
            return Err(PoolError::Exhausted {
                max_clients: self.config.max_clients,
            });
        }

        let client = self
            .factory
            .create_client(schema_name)
            .await
            .map_err(|source| PoolError::ClientCreateFailed {
                schema_name: schema_name.to_string(),
                source,
            })?;
        client
            .connect()
            .await
            .map_err(|source| PoolError::ClientCreateFailed {
                schema_name: schema_name.to_string(),
                source,
            })?;

        // Make room only after the new client is live, so a failed create
        // never costs an existing tenant its connection.
        while inner.entries.len() >= self.config.max_clients {
            let Some((victim_key, victim)) = inner.entries.pop_lru() else {
                break;
            };
            inner.total_evicted += 1;
            counter!("tenancy_pool_clients_evicted_total").increment(1);
            debug!(schema_name = %victim_key, "Evicting least-recently-used pool client");
            if let Err(err) = victim.client.disconnect().await {
                warn!(
                    schema_name = %victim_key,
                    error = ?err,
                    "Evicted client failed to disconnect cleanly"
                );
            }
        }

        let now = Instant::now();
        inner.entries.put(
            schema_name.to_string(),
            PoolEntry {
                client: Arc::clone(&client),
                created_at: now,
                last_accessed_at: now,
            },
        );
        inner.total_created += 1;
        counter!("tenancy_pool_clients_created_total").increment(1);
        gauge!("tenancy_pool_active_clients").set(inner.entries.len() as f64);

        Ok(client)
    }

    /// Refreshes the access time for bookkeeping. Unknown schemas are a
    /// silent no-op.
    pub async fn release_client(&self, schema_name: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.entries.get_mut(schema_name) {
            entry.last_accessed_at = Instant::now();
        }
    }

    /// Disconnects every cached client concurrently, attempting all of them
    /// before reporting. The pool is emptied regardless of individual
    /// outcomes; failures are aggregated into one error.
    pub async fn disconnect_all(&self) -> Result<(), PoolError> {
        let mut inner = self.inner.lock().await;

        let mut drained = Vec::with_capacity(inner.entries.len());
        while let Some((schema_name, entry)) = inner.entries.pop_lru() {
            drained.push((schema_name, entry.client));
        }
        gauge!("tenancy_pool_active_clients").set(0.0);
        drop(inner);

        let mut tasks = JoinSet::new();
        for (schema_name, client) in drained {
            tasks.spawn(async move {
                let outcome = client.disconnect().await;
                (schema_name, outcome)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((schema_name, Err(err))) => failures.push(DisconnectFailure {
                    schema_name,
                    message: format!("{err:#}"),
                }),
                Err(join_err) => failures.push(DisconnectFailure {
                    schema_name: "<unknown>".to_string(),
                    message: join_err.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::DisconnectFailed { failures })
        }
    }

    /// Consistent point-in-time snapshot of the pool counters.
    pub async fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().await;
        PoolStats {
            active_clients: inner.entries.len(),
            max_clients: self.config.max_clients,
            total_created: inner.total_created,
            total_evicted: inner.total_evicted,
        }
    }

    /// Disconnects and removes entries idle strictly longer than the
    /// configured timeout; an entry at exactly the timeout survives until
    /// the next pass. Decisions are made against timestamps re-read under
    /// the lock, so an entry refreshed by a concurrent `get_client`
    /// survives.
    pub async fn reap_idle(&self) -> usize {
        let idle_timeout = Duration::from_secs(self.config.idle_timeout_seconds);
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_accessed_at) > idle_timeout)
            .map(|(schema_name, _)| schema_name.clone())
            .collect();

        let mut reaped = 0;
        for schema_name in expired {
            let Some(entry) = inner.entries.pop(&schema_name) else {
                continue;
            };
            inner.total_evicted += 1;
            counter!("tenancy_pool_clients_evicted_total").increment(1);
            if let Err(err) = entry.client.disconnect().await {
                warn!(
                    schema_name = %schema_name,
                    error = ?err,
                    "Idle client failed to disconnect cleanly"
                );
            }
            reaped += 1;
        }

        if reaped > 0 {
            gauge!("tenancy_pool_active_clients").set(inner.entries.len() as f64);
            debug!(reaped, "Reaped idle pool clients");
        }

        reaped
    }
}

/// Runs the idle reaper until the shutdown token fires. Spawn this next to
/// the pool and cancel the token for a deterministic shutdown.
pub async fn run_reaper(pool: Arc<ClientPool>, shutdown: CancellationToken) {
    info!(
        interval_seconds = pool.config.reap_interval_seconds,
        idle_timeout_seconds = pool.config.idle_timeout_seconds,
        "Starting pool idle reaper"
    );
    let tick = Duration::from_secs(pool.config.reap_interval_seconds);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Pool idle reaper shutdown requested");
                break;
            }
            _ = sleep(tick) => {
                let reaped = pool.reap_idle().await;
                if reaped > 0 {
                    info!(reaped, "Idle reaper evicted clients");
                }
            }
        }
    }

    info!("Pool idle reaper stopped");
}
