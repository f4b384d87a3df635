use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use tracing::{debug, info};

use super::connect::ServerAddress;
use crate::tenant::TenantError;

/// Advisory lock key held while bootstrapping, so two processes applying the
/// schema to the same database run one after the other.
const BOOTSTRAP_LOCK_KEY: i64 = 0x6c6f_676f_735f_6462;

/// Tables every company database must contain
pub const REQUIRED_TABLES: &[&str] = &[
    "user_auth",
    "employees",
    "employee_stats",
    "overall_data",
    "dialogues",
    "verification",
    "departament_report",
    "uploaded_files",
    "call_training",
    "department_analytics",
];

/// Company schema, applied in order. Every statement must be re-runnable.
pub const TENANT_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS user_auth (
        id            BIGSERIAL PRIMARY KEY,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name    TEXT,
        last_name     TEXT,
        avatar_url    TEXT,
        role          TEXT NOT NULL DEFAULT 'employee'
                      CHECK (role IN ('employee', 'manager', 'admin')),
        company_name  TEXT,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS employees (
        id          BIGSERIAL PRIMARY KEY,
        user_id     BIGINT NOT NULL REFERENCES user_auth(id) ON DELETE CASCADE,
        first_name  TEXT,
        last_name   TEXT,
        registed_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS employee_stats (
        id         BIGSERIAL PRIMARY KEY,
        user_id    BIGINT NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
        rating     NUMERIC(4, 1),
        calls      INTEGER NOT NULL DEFAULT 0,
        deals      INTEGER NOT NULL DEFAULT 0,
        plan       INTEGER NOT NULL DEFAULT 0,
        error      INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS overall_data (
        id           BIGSERIAL PRIMARY KEY,
        user_id      BIGINT NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
        task_name    TEXT NOT NULL,
        grade        NUMERIC(4, 1),
        report       TEXT,
        submitted_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS dialogues (
        id             BIGSERIAL PRIMARY KEY,
        user_id        BIGINT NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
        task_name      TEXT,
        full_dialogue  TEXT,
        audio_file_url TEXT,
        recorded_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS verification (
        id         BIGSERIAL PRIMARY KEY,
        email      TEXT NOT NULL,
        code       TEXT NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS departament_report (
        id          BIGSERIAL PRIMARY KEY,
        title       TEXT NOT NULL,
        file_url    TEXT,
        report_date DATE,
        created_by  BIGINT REFERENCES user_auth(id) ON DELETE SET NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS uploaded_files (
        id            BIGSERIAL PRIMARY KEY,
        original_name TEXT NOT NULL,
        file_url      TEXT NOT NULL,
        upload_date   TIMESTAMPTZ NOT NULL DEFAULT now(),
        uploaded_by   BIGINT REFERENCES user_auth(id) ON DELETE SET NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS call_training (
        id              BIGSERIAL PRIMARY KEY,
        user_id         BIGINT NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
        title           TEXT NOT NULL,
        length          INTEGER,
        recommendations TEXT,
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS department_analytics (
        id                    BIGSERIAL PRIMARY KEY,
        user_id               BIGINT NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
        date                  DATE NOT NULL,
        total_calls           INTEGER NOT NULL DEFAULT 0,
        successful_calls      INTEGER NOT NULL DEFAULT 0,
        call_duration_seconds INTEGER NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_user_auth_role ON user_auth (role)",
    "CREATE INDEX IF NOT EXISTS idx_employees_user_id ON employees (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_employee_stats_user_id ON employee_stats (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_overall_data_user_id ON overall_data (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_dialogues_user_id ON dialogues (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_verification_email ON verification (email)",
    "CREATE INDEX IF NOT EXISTS idx_department_analytics_user_date ON department_analytics (user_id, date)",
];

/// Applies the company schema to a database
#[async_trait]
pub trait SchemaBootstrap: Send + Sync {
    /// Apply every schema statement to `database`. Safe to re-run.
    async fn bootstrap(&self, database: &str) -> Result<(), TenantError>;

    /// Required tables absent from `database`
    async fn missing_tables(&self, database: &str) -> Result<Vec<String>, TenantError>;
}

/// Bootstrapper that opens a short-lived connection per call
pub struct PgSchemaBootstrapper {
    address: ServerAddress,
}

impl PgSchemaBootstrapper {
    pub fn new(address: ServerAddress) -> Self {
        Self { address }
    }

    async fn connect(&self, database: &str) -> Result<PgConnection, sqlx::Error> {
        let options = self.address.options_for(database)?;
        PgConnection::connect_with(&options).await
    }
}

#[async_trait]
impl SchemaBootstrap for PgSchemaBootstrapper {
    async fn bootstrap(&self, database: &str) -> Result<(), TenantError> {
        let failed = |statement: usize| {
            let database = database.to_string();
            move |source: sqlx::Error| TenantError::SchemaBootstrapFailed {
                database,
                statement,
                source,
            }
        };

        let mut conn = self.connect(database).await.map_err(failed(0))?;

        // One transaction: a failure part-way leaves no partial schema behind
        let mut tx = conn.begin().await.map_err(failed(0))?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(BOOTSTRAP_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(failed(0))?;

        for (index, statement) in TENANT_SCHEMA.iter().enumerate() {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(failed(index + 1))?;
        }
        tx.commit().await.map_err(failed(TENANT_SCHEMA.len()))?;

        if let Err(e) = conn.close().await {
            debug!(database, error = %e, "Bootstrap connection did not close cleanly");
        }

        info!(database, statements = TENANT_SCHEMA.len(), "Applied company schema");
        Ok(())
    }

    async fn missing_tables(&self, database: &str) -> Result<Vec<String>, TenantError> {
        let mut conn = self.connect(database).await?;

        let required: Vec<String> = REQUIRED_TABLES.iter().map(|t| t.to_string()).collect();
        let present: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = ANY($1)",
        )
        .bind(&required)
        .fetch_all(&mut conn)
        .await?;

        if let Err(e) = conn.close().await {
            debug!(database, error = %e, "Schema check connection did not close cleanly");
        }

        Ok(required
            .into_iter()
            .filter(|table| !present.contains(table))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_statements_are_idempotent_forms() {
        for statement in TENANT_SCHEMA {
            let upper = statement.to_uppercase();
            assert!(
                upper.contains("IF NOT EXISTS"),
                "statement is not re-runnable: {statement}"
            );
        }
    }

    #[test]
    fn every_required_table_is_created() {
        for table in REQUIRED_TABLES {
            let needle = format!("CREATE TABLE IF NOT EXISTS {} (", table);
            assert!(
                TENANT_SCHEMA.iter().any(|s| s.starts_with(&needle)),
                "no CREATE TABLE for {table}"
            );
        }
    }
}
