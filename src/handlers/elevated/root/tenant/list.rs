// handlers/elevated/root/tenant/list.rs - GET /api/root/tenant handler

use axum::extract::State;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantDatabase;

pub async fn tenant_list(State(state): State<AppState>) -> ApiResult<Vec<TenantDatabase>> {
    let databases = state.provisioner.list_all_tenant_databases().await?;
    Ok(ApiResponse::success(databases))
}
