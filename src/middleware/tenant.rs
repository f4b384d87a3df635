use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::database::MemberDirectory;
use crate::error::ApiError;
use crate::services::{AuditEvent, AuditHook, TenantProvisioner};
use crate::tenant::{Principal, Role, TenantDatabaseName, TenantError, TenantKey};

pub const COMPANY_HEADER: &str = "x-company-name";

/// Tenant database pool for the resolved company, injected by middleware
#[derive(Clone)]
pub struct TenantPool(pub PgPool);

/// Company a request acts on, after access checks and provisioning
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedTenant {
    pub key: TenantKey,
    pub database: TenantDatabaseName,
}

/// Decides which company a principal acts on and makes sure its database is ready.
pub struct TenantGuard {
    provisioner: Arc<TenantProvisioner>,
    audit: Arc<dyn AuditHook>,
    members: Arc<dyn MemberDirectory>,
}

impl TenantGuard {
    pub fn new(
        provisioner: Arc<TenantProvisioner>,
        audit: Arc<dyn AuditHook>,
        members: Arc<dyn MemberDirectory>,
    ) -> Self {
        Self {
            provisioner,
            audit,
            members,
        }
    }

    /// Resolve the acting company without touching the database.
    ///
    /// Service principals must name a company. Everyone else acts on their own
    /// company; naming a different one is only allowed for admins.
    pub fn resolve_key(
        &self,
        principal: &Principal,
        requested: Option<&str>,
    ) -> Result<TenantKey, TenantError> {
        let requested = requested
            .map(|raw| self.provisioner.key(raw))
            .transpose()?;

        if principal.role == Role::Service {
            return requested.ok_or(TenantError::TenantRequired);
        }

        let own = match principal.company.as_deref() {
            Some(company) => self.provisioner.key(company)?,
            None if principal.is_admin() => return requested.ok_or(TenantError::TenantRequired),
            None => return Err(TenantError::TenantRequired),
        };

        match requested {
            Some(requested) if requested != own => {
                if principal.is_admin() {
                    debug!(own = %own, requested = %requested, "Admin acting across companies");
                    return Ok(requested);
                }
                warn!(
                    target: "security",
                    principal_id = principal.id,
                    own = %own,
                    requested = %requested,
                    "Cross-company access attempt"
                );
                self.audit.record(AuditEvent::CrossTenantDenied {
                    principal_id: principal.id,
                    own: own.to_string(),
                    requested: requested.to_string(),
                });
                Err(TenantError::CrossTenantAccessDenied {
                    own: own.to_string(),
                    requested: requested.to_string(),
                })
            }
            _ => Ok(own),
        }
    }

    /// Resolve the company, provision its database if needed and hand out its
    /// pool. Company users must also be registered in that database.
    pub async fn resolve(
        &self,
        principal: &Principal,
        requested: Option<&str>,
    ) -> Result<(ResolvedTenant, PgPool), TenantError> {
        let key = self.resolve_key(principal, requested)?;
        let pool = self.provisioner.pool_for_key(&key).await?;
        let tenant = ResolvedTenant {
            database: self.provisioner.naming().database_name(&key),
            key,
        };
        self.verify_membership(principal, &tenant, &pool).await?;
        Ok((tenant, pool))
    }

    async fn verify_membership(
        &self,
        principal: &Principal,
        tenant: &ResolvedTenant,
        pool: &PgPool,
    ) -> Result<(), TenantError> {
        // Admins and service clients are not rows in any company's user table
        if matches!(principal.role, Role::Admin | Role::Service) {
            return Ok(());
        }

        let member = self
            .members
            .is_member(&tenant.database, pool, principal.id)
            .await
            .map_err(|source| TenantError::PoolUnavailable {
                database: tenant.database.to_string(),
                source,
            })?;

        if member {
            return Ok(());
        }
        warn!(
            target: "security",
            principal_id = principal.id,
            tenant = %tenant.key,
            "User not registered in company"
        );
        Err(TenantError::NotACompanyMember {
            user_id: principal.id,
            company: tenant.key.to_string(),
        })
    }
}

/// Company named by the request: `X-Company-Name` header, else the
/// `company_name` / `companyName` query parameter.
pub fn requested_company(request: &Request) -> Result<Option<String>, ApiError> {
    if let Some(value) = request.headers().get(COMPANY_HEADER) {
        let company = std::str::from_utf8(value.as_bytes())
            .map_err(|_| ApiError::bad_request("X-Company-Name must be valid UTF-8"))?;
        if !company.trim().is_empty() {
            return Ok(Some(company.to_string()));
        }
    }

    let Some(query) = request.uri().query() else {
        return Ok(None);
    };
    Ok(url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, value)| (name == "company_name" || name == "companyName") && !value.is_empty())
        .map(|(_, value)| value.into_owned()))
}

/// Middleware that resolves the company for an authenticated request and
/// injects `ResolvedTenant` and `TenantPool`.
pub async fn tenant_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Authentication required before tenant resolution"))?;

    let requested = requested_company(&request)?;
    let (tenant, pool) = state.guard.resolve(&principal, requested.as_deref()).await?;

    debug!(tenant = %tenant.key, database = %tenant.database, "Tenant context resolved");
    request.extensions_mut().insert(tenant);
    request.extensions_mut().insert(TenantPool(pool));

    Ok(next.run(request).await)
}

/// Rejects principals below manager level (service counts as manager)
pub async fn require_manager(request: Request, next: Next) -> Result<Response, ApiError> {
    require(&request, Principal::can_manage, "Manager")?;
    Ok(next.run(request).await)
}

/// Rejects everyone but admins
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    require(&request, Principal::is_admin, "Admin")?;
    Ok(next.run(request).await)
}

fn require(request: &Request, allowed: fn(&Principal) -> bool, level: &'static str) -> Result<(), ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if allowed(principal) {
        Ok(())
    } else {
        warn!(
            target: "security",
            principal_id = principal.id,
            role = %principal.role,
            required = level,
            "Insufficient role"
        );
        Err(TenantError::InsufficientRole(level).into())
    }
}
