pub mod audit;
pub mod lifecycle;
pub mod provisioner;

pub use audit::{AuditEvent, AuditHook, TracingAudit};
pub use lifecycle::{wait_for_shutdown, Lifecycle};
pub use provisioner::{TenantDatabase, TenantProvisioner, TenantStatus};
