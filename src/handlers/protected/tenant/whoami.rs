// handlers/protected/tenant/whoami.rs - GET /api/tenant/whoami handler

use axum::extract::Extension;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, ResolvedTenant};
use crate::tenant::Principal;

/// Returns the authenticated principal and the company the request resolved to
pub async fn tenant_whoami(
    Extension(principal): Extension<Principal>,
    Extension(tenant): Extension<ResolvedTenant>,
) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "principal": principal,
        "tenant": tenant,
    })))
}
