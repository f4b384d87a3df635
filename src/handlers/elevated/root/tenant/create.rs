// handlers/elevated/root/tenant/create.rs - POST /api/root/tenant handler

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::CreateOutcome;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    #[serde(alias = "companyName")]
    pub company_name: String,
}

/**
 * POST /api/root/tenant - Provision a company database
 *
 * ```json
 * { "company_name": "Acme Corp" }
 * ```
 *
 * 201 when the database was created by this call, 200 when it already existed.
 */
pub async fn tenant_create(
    State(state): State<AppState>,
    Json(body): Json<CreateTenantRequest>,
) -> ApiResult<Value> {
    let provisioner = &state.provisioner;
    let key = provisioner.key(&body.company_name)?;
    let (database, outcome) = provisioner.provision_key(&key).await?;
    let created = outcome == CreateOutcome::Created;

    let data = json!({
        "tenant_key": key,
        "database_name": database,
        "created": created,
    });

    if created {
        Ok(ApiResponse::created(data))
    } else {
        Ok(ApiResponse::success(data))
    }
}
