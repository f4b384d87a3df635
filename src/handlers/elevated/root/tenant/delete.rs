// handlers/elevated/root/tenant/delete.rs - DELETE /api/root/tenant/:name handler

use axum::extract::{Extension, Path, State};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenant::Principal;

/// Drops the company database. Irreversible; 404 when it does not exist.
pub async fn tenant_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    warn!(target: "audit", principal_id = principal.id, company = %name, "Company deletion requested");
    let database = state.provisioner.delete(&name).await?;
    Ok(ApiResponse::success(json!({ "deleted": database })))
}
