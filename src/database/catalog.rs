use async_trait::async_trait;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::info;

use super::connect::{quote_identifier, ServerAddress};
use crate::config::DatabaseConfig;

/// SQLSTATE for `CREATE DATABASE` on a name that is taken
const DUPLICATE_DATABASE: &str = "42P04";

/// What a catalog-level create actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExisted,
}

/// One database row from the server catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogDatabase {
    pub name: String,
    pub size_bytes: Option<i64>,
}

/// Server-level operations performed over the master connection.
///
/// The server catalog is the tenant registry: a company exists exactly when a
/// database with its name exists.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn database_exists(&self, name: &str) -> Result<bool, sqlx::Error>;

    /// Create `name`. A concurrent creator winning the race is reported as
    /// `AlreadyExisted`, not as an error.
    async fn create_database(&self, name: &str) -> Result<CreateOutcome, sqlx::Error>;

    /// Terminate every backend connected to `name`; returns how many were killed.
    async fn terminate_connections(&self, name: &str) -> Result<u64, sqlx::Error>;

    async fn drop_database(&self, name: &str) -> Result<(), sqlx::Error>;

    /// Databases matching a `LIKE ... ESCAPE '\'` pattern, ordered by name
    async fn list_databases(&self, like_pattern: &str) -> Result<Vec<CatalogDatabase>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;

    async fn close(&self);
}

/// Catalog backed by a small fixed-size pool on the maintenance database
pub struct PgCatalog {
    master: PgPool,
}

impl PgCatalog {
    pub async fn connect(address: &ServerAddress, config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = address.options_for(&config.master_database)?;
        let master = PgPoolOptions::new()
            .max_connections(config.master_max_connections.max(1))
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        info!(database = %config.master_database, "Connected master catalog pool");
        Ok(Self { master })
    }
}

fn is_duplicate_database(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == DUPLICATE_DATABASE)
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn database_exists(&self, name: &str) -> Result<bool, sqlx::Error> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
                .bind(name)
                .fetch_one(&self.master)
                .await?;
        Ok(exists)
    }

    async fn create_database(&self, name: &str) -> Result<CreateOutcome, sqlx::Error> {
        // Identifiers cannot be bound as parameters
        let query = format!("CREATE DATABASE {}", quote_identifier(name));
        match sqlx::query(&query).execute(&self.master).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(e) if is_duplicate_database(&e) => Ok(CreateOutcome::AlreadyExisted),
            Err(e) => Err(e),
        }
    }

    async fn terminate_connections(&self, name: &str) -> Result<u64, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = $1 AND pid <> pg_backend_pid()",
        )
        .bind(name)
        .fetch_all(&self.master)
        .await?;
        Ok(rows.len() as u64)
    }

    async fn drop_database(&self, name: &str) -> Result<(), sqlx::Error> {
        let query = format!("DROP DATABASE IF EXISTS {}", quote_identifier(name));
        sqlx::query(&query).execute(&self.master).await?;
        Ok(())
    }

    async fn list_databases(&self, like_pattern: &str) -> Result<Vec<CatalogDatabase>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT datname, pg_database_size(datname) AS size_bytes FROM pg_database \
             WHERE datname LIKE $1 ESCAPE '\\' AND datistemplate = false ORDER BY datname",
        )
        .bind(like_pattern)
        .fetch_all(&self.master)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CatalogDatabase {
                name: row.get("datname"),
                size_bytes: row.get("size_bytes"),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.master).await?;
        Ok(())
    }

    async fn close(&self) {
        self.master.close().await;
        info!("Closed master catalog pool");
    }
}
