// handlers/elevated/root/tenant/show.rs - GET /api/root/tenant/:name handler

use axum::extract::{Path, State};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantStatus;

/// Existence and schema completeness; never provisions
pub async fn tenant_show(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<TenantStatus> {
    let status = state.provisioner.status(&name).await?;
    Ok(ApiResponse::success(status))
}
