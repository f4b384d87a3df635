use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use super::connect::ServerAddress;
use crate::config::DatabaseConfig;
use crate::tenant::{TenantDatabaseName, TenantError, TenantKey, TenantNaming};

type PoolSlot = Arc<OnceCell<PgPool>>;

/// Pool sizing applied to every tenant pool
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub verify_on_create: bool,
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            acquire_timeout: config.acquire_timeout(),
            idle_timeout: config.idle_timeout(),
            verify_on_create: config.verify_pools,
        }
    }
}

/// Owns exactly one connection pool per company database.
///
/// Each key maps to a slot that is filled at most once; concurrent callers for
/// the same key wait on the same initialization instead of racing to build
/// their own pool.
pub struct PoolRegistry {
    address: ServerAddress,
    naming: TenantNaming,
    settings: PoolSettings,
    pools: RwLock<HashMap<TenantKey, PoolSlot>>,
    #[cfg(test)]
    open_hook: std::sync::Mutex<tests::OpenHook>,
}

impl PoolRegistry {
    pub fn new(address: ServerAddress, naming: TenantNaming, settings: PoolSettings) -> Self {
        Self {
            address,
            naming,
            settings,
            pools: RwLock::new(HashMap::new()),
            #[cfg(test)]
            open_hook: Default::default(),
        }
    }

    pub fn naming(&self) -> &TenantNaming {
        &self.naming
    }

    /// Get existing pool or create a new one lazily
    pub async fn get_pool(&self, key: &TenantKey) -> Result<PgPool, TenantError> {
        loop {
            // Fast path: try read lock
            let existing = {
                let pools = self.pools.read().await;
                pools.get(key).cloned()
            };
            if let Some(pool) = existing.as_ref().and_then(|slot| slot.get()) {
                debug!(tenant = %key, "Reusing cached pool");
                return Ok(pool.clone());
            }

            let slot = match existing {
                Some(slot) => slot,
                None => {
                    let mut pools = self.pools.write().await;
                    pools
                        .entry(key.clone())
                        .or_insert_with(|| Arc::new(OnceCell::new()))
                        .clone()
                }
            };

            let database = self.naming.database_name(key);
            let pool = slot
                .get_or_try_init(|| self.open_pool(&database))
                .await?
                .clone();

            // close_one may have evicted the slot while the pool was being opened
            let still_registered = {
                let pools = self.pools.read().await;
                pools.get(key).map_or(false, |current| Arc::ptr_eq(current, &slot))
            };
            if still_registered {
                return Ok(pool);
            }

            warn!(tenant = %key, "Pool evicted during creation, closing it");
            pool.close().await;
        }
    }

    async fn open_pool(&self, database: &TenantDatabaseName) -> Result<PgPool, TenantError> {
        let unavailable = |source: sqlx::Error| TenantError::PoolUnavailable {
            database: database.to_string(),
            source,
        };

        let options = self.address.options_for(database.as_str()).map_err(unavailable)?;
        let pool = PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(self.settings.acquire_timeout)
            .idle_timeout(Some(self.settings.idle_timeout))
            .connect_lazy_with(options);

        #[cfg(test)]
        self.opened(&pool).await;

        if self.settings.verify_on_create {
            if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
                pool.close().await;
                return Err(unavailable(e));
            }
        }

        info!(database = %database, "Created database pool");
        Ok(pool)
    }

    /// Close and evict a single company's pool
    pub async fn close_one(&self, key: &TenantKey) {
        let slot = {
            let mut pools = self.pools.write().await;
            pools.remove(key)
        };
        if let Some(pool) = slot.as_ref().and_then(|slot| slot.get()) {
            pool.close().await;
            info!(tenant = %key, "Closed database pool");
        }
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let drained: Vec<(TenantKey, PoolSlot)> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };

        let closing = drained.into_iter().filter_map(|(key, slot)| {
            slot.get().cloned().map(|pool| async move {
                pool.close().await;
                info!(tenant = %key, "Closed database pool");
            })
        });
        futures::future::join_all(closing).await;
    }

    /// Number of initialized pools currently held
    pub async fn pool_count(&self) -> usize {
        let pools = self.pools.read().await;
        pools.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn contains(&self, key: &TenantKey) -> bool {
        let pools = self.pools.read().await;
        pools.get(key).map_or(false, |slot| slot.initialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{lazy_registry, Gate};

    #[derive(Default)]
    pub(super) struct OpenHook {
        gate: Option<Arc<Gate>>,
        opened: Vec<PgPool>,
    }

    impl PoolRegistry {
        pub(super) async fn opened(&self, pool: &PgPool) {
            let gate = {
                let mut hook = self.open_hook.lock().unwrap();
                hook.opened.push(pool.clone());
                hook.gate.take()
            };
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }

        /// Pause the next pool creation until the gate is released
        fn hold_next_open(&self) -> Arc<Gate> {
            let gate = Arc::new(Gate::default());
            self.open_hook.lock().unwrap().gate = Some(gate.clone());
            gate
        }

        fn opened_pools(&self) -> Vec<PgPool> {
            self.open_hook.lock().unwrap().opened.clone()
        }
    }

    #[tokio::test]
    async fn pool_evicted_while_opening_is_closed_and_replaced() {
        let registry = Arc::new(lazy_registry());
        let key = registry.naming().key("acme").unwrap();
        let gate = registry.hold_next_open();

        let opening = {
            let registry = registry.clone();
            let key = key.clone();
            tokio::spawn(async move { registry.get_pool(&key).await })
        };
        gate.entered.notified().await;
        registry.close_one(&key).await;
        gate.release.notify_one();

        let pool = opening.await.unwrap().unwrap();
        let opened = registry.opened_pools();

        assert_eq!(opened.len(), 2);
        assert!(opened[0].is_closed());
        assert!(!opened[1].is_closed());
        assert!(!pool.is_closed());
        assert_eq!(registry.pool_count().await, 1);
    }

    #[tokio::test]
    async fn get_pool_caches_one_pool_per_key() {
        let registry = lazy_registry();
        let key = registry.naming().key("Acme Corp").unwrap();

        registry.get_pool(&key).await.unwrap();
        registry.get_pool(&key).await.unwrap();

        assert_eq!(registry.pool_count().await, 1);
        assert!(registry.contains(&key).await);
    }

    #[tokio::test]
    async fn concurrent_get_pool_retains_single_pool() {
        let registry = Arc::new(lazy_registry());
        let key = registry.naming().key("acme").unwrap();

        let tasks = (0..16).map(|_| {
            let registry = registry.clone();
            let key = key.clone();
            tokio::spawn(async move { registry.get_pool(&key).await.map(|_| ()) })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(registry.pool_count().await, 1);
    }

    #[tokio::test]
    async fn close_one_evicts_and_closes() {
        let registry = lazy_registry();
        let acme = registry.naming().key("acme").unwrap();
        let globex = registry.naming().key("globex").unwrap();

        let pool = registry.get_pool(&acme).await.unwrap();
        registry.get_pool(&globex).await.unwrap();

        registry.close_one(&acme).await;

        assert!(pool.is_closed());
        assert!(!registry.contains(&acme).await);
        assert!(registry.contains(&globex).await);

        let fresh = registry.get_pool(&acme).await.unwrap();
        assert!(!fresh.is_closed());
    }

    #[tokio::test]
    async fn close_all_clears_registry() {
        let registry = lazy_registry();
        let a = registry.get_pool(&registry.naming().key("acme").unwrap()).await.unwrap();
        let b = registry.get_pool(&registry.naming().key("globex").unwrap()).await.unwrap();

        registry.close_all().await;

        assert!(a.is_closed());
        assert!(b.is_closed());
        assert_eq!(registry.pool_count().await, 0);
    }
}
