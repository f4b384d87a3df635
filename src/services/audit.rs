use serde::Serialize;
use tracing::{info, warn};

/// Security-relevant lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    TenantProvisioned {
        tenant: String,
        database: String,
    },
    TenantDeleted {
        tenant: String,
        database: String,
        terminated_connections: u64,
    },
    CrossTenantDenied {
        principal_id: i64,
        own: String,
        requested: String,
    },
}

/// Sink for audit events. Replace the tracing sink to ship events elsewhere.
pub trait AuditHook: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events to the `audit` tracing target
#[derive(Debug, Clone, Default)]
pub struct TracingAudit {
    /// Also log non-destructive events
    pub verbose: bool,
}

impl TracingAudit {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl AuditHook for TracingAudit {
    fn record(&self, event: AuditEvent) {
        match &event {
            AuditEvent::TenantDeleted {
                tenant,
                database,
                terminated_connections,
            } => warn!(
                target: "audit",
                tenant = %tenant,
                database = %database,
                terminated_connections,
                "Company database dropped"
            ),
            AuditEvent::CrossTenantDenied {
                principal_id,
                own,
                requested,
            } => warn!(
                target: "audit",
                principal_id,
                own = %own,
                requested = %requested,
                "Cross-company access denied"
            ),
            AuditEvent::TenantProvisioned { tenant, database } if self.verbose => info!(
                target: "audit",
                tenant = %tenant,
                database = %database,
                "Company database provisioned"
            ),
            AuditEvent::TenantProvisioned { .. } => {}
        }
    }
}
