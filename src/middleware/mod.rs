pub mod auth;
pub mod response;
pub mod tenant;

pub use auth::{auth_middleware, API_KEY_HEADER};
pub use response::{ApiResponse, ApiResult};
pub use tenant::{
    require_admin, require_manager, requested_company, tenant_context_middleware, ResolvedTenant,
    TenantGuard, TenantPool, COMPANY_HEADER,
};
