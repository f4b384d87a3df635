// handlers/protected/mod.rs - Protected handlers (authentication + company context)
//
// Every route here runs behind auth_middleware and tenant_context_middleware, so
// handlers receive the Principal, the ResolvedTenant and a TenantPool that
// belongs to the resolved company only.
pub mod tenant;
