use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::audit::{AuditEvent, AuditHook};
use crate::config::TenantConfig;
use crate::database::{Catalog, CreateOutcome, PoolRegistry, SchemaBootstrap};
use crate::tenant::{TenantDatabaseName, TenantError, TenantKey, TenantNaming};

/// Company database as seen in the server catalog
#[derive(Debug, Clone, Serialize)]
pub struct TenantDatabase {
    pub tenant_key: TenantKey,
    pub database_name: String,
    pub size_bytes: Option<i64>,
}

/// Existence and schema state of one company database
#[derive(Debug, Clone, Serialize)]
pub struct TenantStatus {
    pub tenant_key: TenantKey,
    pub database_name: TenantDatabaseName,
    pub exists: bool,
    pub missing_tables: Vec<String>,
}

impl TenantStatus {
    pub fn is_ready(&self) -> bool {
        self.exists && self.missing_tables.is_empty()
    }
}

/// Creates, verifies and drops company databases.
///
/// `ensure` is the single entry point for lazy provisioning. Within one process
/// calls for the same company serialize on a per-key lock, so only one of them
/// issues `CREATE DATABASE` and runs the bootstrap.
pub struct TenantProvisioner {
    catalog: Arc<dyn Catalog>,
    bootstrapper: Arc<dyn SchemaBootstrap>,
    registry: Arc<PoolRegistry>,
    audit: Arc<dyn AuditHook>,
    provision_timeout: Duration,
    known_ttl: Duration,
    creation_locks: Mutex<HashMap<TenantKey, Arc<Mutex<()>>>>,
    known: RwLock<HashMap<TenantKey, Instant>>,
    // created here but not yet bootstrapped successfully
    pending_bootstrap: Mutex<HashSet<TenantKey>>,
}

impl TenantProvisioner {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        bootstrapper: Arc<dyn SchemaBootstrap>,
        registry: Arc<PoolRegistry>,
        audit: Arc<dyn AuditHook>,
        config: &TenantConfig,
    ) -> Self {
        Self {
            catalog,
            bootstrapper,
            registry,
            audit,
            provision_timeout: config.provision_timeout(),
            known_ttl: config.exists_cache_ttl(),
            creation_locks: Mutex::new(HashMap::new()),
            known: RwLock::new(HashMap::new()),
            pending_bootstrap: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_provision_timeout(mut self, timeout: Duration) -> Self {
        self.provision_timeout = timeout;
        self
    }

    pub fn naming(&self) -> &TenantNaming {
        self.registry.naming()
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Canonicalize and validate a raw company name
    pub fn key(&self, raw: &str) -> Result<TenantKey, TenantError> {
        self.naming().key(raw)
    }

    /// Make sure the company database exists and carries the schema
    pub async fn ensure(&self, raw: &str) -> Result<TenantDatabaseName, TenantError> {
        let key = self.key(raw)?;
        self.ensure_key(&key).await
    }

    pub async fn ensure_key(&self, key: &TenantKey) -> Result<TenantDatabaseName, TenantError> {
        let (database, _) = self.provision_key(key).await?;
        Ok(database)
    }

    /// Like `ensure_key`, also reporting whether this call created the database
    pub async fn provision_key(
        &self,
        key: &TenantKey,
    ) -> Result<(TenantDatabaseName, CreateOutcome), TenantError> {
        let database = self.naming().database_name(key);
        if self.is_known(key).await {
            debug!(tenant = %key, "Company database known to exist");
            return Ok((database, CreateOutcome::AlreadyExisted));
        }

        let lock = self.creation_lock(key).await;
        let _guard = lock.lock().await;

        // Another caller may have finished while we waited
        if self.is_known(key).await {
            return Ok((database, CreateOutcome::AlreadyExisted));
        }

        let provisioning = self.provision(key, &database);
        let outcome = match tokio::time::timeout(self.provision_timeout, provisioning).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(tenant = %key, database = %database, "Provisioning timed out");
                return Err(TenantError::ProvisioningTimedOut {
                    database: database.to_string(),
                    timeout: self.provision_timeout,
                });
            }
        };

        self.mark_known(key).await;
        Ok((database, outcome))
    }

    async fn provision(
        &self,
        key: &TenantKey,
        database: &TenantDatabaseName,
    ) -> Result<CreateOutcome, TenantError> {
        let exists = self.catalog.database_exists(database.as_str()).await?;
        let pending = self.pending_bootstrap.lock().await.contains(key);

        if exists && !pending {
            debug!(database = %database, "Company database already exists");
            return Ok(CreateOutcome::AlreadyExisted);
        }

        let mut created = false;
        if exists {
            warn!(database = %database, "Re-running bootstrap left incomplete by an earlier attempt");
        } else {
            self.pending_bootstrap.lock().await.insert(key.clone());
            let outcome = match self.catalog.create_database(database.as_str()).await {
                Ok(outcome) => outcome,
                Err(source) => {
                    self.pending_bootstrap.lock().await.remove(key);
                    return Err(TenantError::DatabaseCreateFailed {
                        database: database.to_string(),
                        source,
                    });
                }
            };
            match outcome {
                CreateOutcome::Created => {
                    info!(database = %database, "Created company database");
                    created = true;
                }
                CreateOutcome::AlreadyExisted => {
                    info!(database = %database, "Company database was created concurrently");
                }
            }
        }

        self.bootstrapper.bootstrap(database.as_str()).await?;
        self.pending_bootstrap.lock().await.remove(key);

        if created {
            self.audit.record(AuditEvent::TenantProvisioned {
                tenant: key.to_string(),
                database: database.to_string(),
            });
            return Ok(CreateOutcome::Created);
        }
        Ok(CreateOutcome::AlreadyExisted)
    }

    /// Catalog existence check, bypassing the known-existing cache
    pub async fn exists(&self, raw: &str) -> Result<bool, TenantError> {
        let key = self.key(raw)?;
        let database = self.naming().database_name(&key);
        Ok(self.catalog.database_exists(database.as_str()).await?)
    }

    /// Pool for the company, provisioning its database first if needed
    pub async fn pool(&self, raw: &str) -> Result<PgPool, TenantError> {
        let key = self.key(raw)?;
        self.pool_for_key(&key).await
    }

    pub async fn pool_for_key(&self, key: &TenantKey) -> Result<PgPool, TenantError> {
        self.ensure_key(key).await?;
        self.registry.get_pool(key).await
    }

    /// Drop a company database. Irreversible.
    pub async fn delete(&self, raw: &str) -> Result<TenantDatabaseName, TenantError> {
        let key = self.key(raw)?;
        let result = {
            let lock = self.creation_lock(&key).await;
            let _guard = lock.lock().await;
            self.drop_tenant(&key).await
        };
        self.prune_creation_lock(&key).await;
        result
    }

    async fn drop_tenant(&self, key: &TenantKey) -> Result<TenantDatabaseName, TenantError> {
        let database = self.naming().database_name(key);
        if !self.catalog.database_exists(database.as_str()).await? {
            return Err(TenantError::TenantNotFound(database.to_string()));
        }

        self.forget(key).await;
        self.registry.close_one(key).await;
        let terminated = self.catalog.terminate_connections(database.as_str()).await?;
        self.catalog.drop_database(database.as_str()).await?;
        // A request that passed the known check before `forget` may have reopened a pool since
        self.registry.close_one(key).await;

        self.audit.record(AuditEvent::TenantDeleted {
            tenant: key.to_string(),
            database: database.to_string(),
            terminated_connections: terminated,
        });
        Ok(database)
    }

    /// Every company database on the server
    pub async fn list_all_tenant_databases(&self) -> Result<Vec<TenantDatabase>, TenantError> {
        let naming = self.naming();
        let databases = self.catalog.list_databases(&naming.like_pattern()).await?;

        Ok(databases
            .into_iter()
            .filter_map(|db| {
                naming.key_from_database(&db.name).map(|tenant_key| TenantDatabase {
                    tenant_key,
                    database_name: db.name,
                    size_bytes: db.size_bytes,
                })
            })
            .collect())
    }

    /// Existence plus the list of required tables missing from the schema
    pub async fn status(&self, raw: &str) -> Result<TenantStatus, TenantError> {
        let key = self.key(raw)?;
        let database = self.naming().database_name(&key);
        let exists = self.catalog.database_exists(database.as_str()).await?;
        let missing_tables = if exists {
            self.bootstrapper.missing_tables(database.as_str()).await?
        } else {
            Vec::new()
        };

        Ok(TenantStatus {
            tenant_key: key,
            database_name: database,
            exists,
            missing_tables,
        })
    }

    async fn creation_lock(&self, key: &TenantKey) -> Arc<Mutex<()>> {
        let mut locks = self.creation_locks.lock().await;
        locks.entry(key.clone()).or_default().clone()
    }

    async fn is_known(&self, key: &TenantKey) -> bool {
        let known = self.known.read().await;
        known
            .get(key)
            .map_or(false, |at| at.elapsed() < self.known_ttl)
    }

    async fn mark_known(&self, key: &TenantKey) {
        let mut known = self.known.write().await;
        known.retain(|_, at| at.elapsed() < self.known_ttl);
        known.insert(key.clone(), Instant::now());
    }

    /// Drop the key's creation lock unless another caller still holds or waits on it
    async fn prune_creation_lock(&self, key: &TenantKey) {
        let mut locks = self.creation_locks.lock().await;
        if locks.get(key).map_or(false, |lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> (usize, usize) {
        (self.creation_locks.lock().await.len(), self.known.read().await.len())
    }

    async fn forget(&self, key: &TenantKey) {
        self.known.write().await.remove(key);
        self.pending_bootstrap.lock().await.remove(key);
    }
}
