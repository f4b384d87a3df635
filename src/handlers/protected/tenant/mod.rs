// handlers/protected/tenant/mod.rs - Company-scoped handlers
pub mod stats; // GET /api/tenant/stats (manager)
pub mod whoami; // GET /api/tenant/whoami

pub use stats::tenant_stats;
pub use whoami::tenant_whoami;
