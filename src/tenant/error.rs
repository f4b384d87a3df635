use std::time::Duration;

use thiserror::Error;

/// Errors raised by the tenant lifecycle core
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Invalid tenant name '{name}': {reason}")]
    InvalidTenantName { name: String, reason: String },

    #[error("A target company is required for this request")]
    TenantRequired,

    #[error("Access denied: principal of '{own}' cannot access company '{requested}'")]
    CrossTenantAccessDenied { own: String, requested: String },

    #[error("{0} privileges required")]
    InsufficientRole(&'static str),

    #[error("User {user_id} is not registered in company '{company}'")]
    NotACompanyMember { user_id: i64, company: String },

    #[error("Company database does not exist: {0}")]
    TenantNotFound(String),

    #[error("Failed to create database {database}: {source}")]
    DatabaseCreateFailed {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Schema bootstrap failed for {database} at statement {statement}: {source}")]
    SchemaBootstrapFailed {
        database: String,
        statement: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("Connection pool unavailable for {database}: {source}")]
    PoolUnavailable {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Provisioning {database} did not finish within {timeout:?}")]
    ProvisioningTimedOut { database: String, timeout: Duration },

    #[error(transparent)]
    Catalog(#[from] sqlx::Error),
}

impl TenantError {
    /// Validation and access errors; callers must not retry these automatically.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TenantError::InvalidTenantName { .. }
                | TenantError::TenantRequired
                | TenantError::CrossTenantAccessDenied { .. }
                | TenantError::InsufficientRole(_)
                | TenantError::NotACompanyMember { .. }
                | TenantError::TenantNotFound(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TenantError::DatabaseCreateFailed { .. }
                | TenantError::SchemaBootstrapFailed { .. }
                | TenantError::PoolUnavailable { .. }
                | TenantError::ProvisioningTimedOut { .. }
                | TenantError::Catalog(_)
        )
    }
}
