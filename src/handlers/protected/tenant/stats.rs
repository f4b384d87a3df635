// handlers/protected/tenant/stats.rs - GET /api/tenant/stats handler

use axum::extract::Extension;
use serde::Serialize;
use sqlx::Row;

use crate::middleware::{ApiResponse, ApiResult, ResolvedTenant, TenantPool};

#[derive(Debug, Default, Serialize)]
pub struct CompanyStats {
    pub company: String,
    pub database: String,
    pub total_users: i64,
    pub managers: i64,
    pub employees: i64,
    pub admins: i64,
}

/// User counts by role, read through the company's own pool
pub async fn tenant_stats(
    Extension(tenant): Extension<ResolvedTenant>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<CompanyStats> {
    let rows = sqlx::query("SELECT role, COUNT(*) AS count FROM user_auth GROUP BY role")
        .fetch_all(&pool)
        .await?;

    let mut stats = CompanyStats {
        company: tenant.key.to_string(),
        database: tenant.database.to_string(),
        ..CompanyStats::default()
    };

    for row in rows {
        let role: String = row.try_get("role")?;
        let count: i64 = row.try_get("count")?;
        match role.as_str() {
            "manager" => stats.managers = count,
            "employee" => stats.employees = count,
            "admin" => stats.admins = count,
            _ => {}
        }
        stats.total_users += count;
    }

    Ok(ApiResponse::success(stats))
}
