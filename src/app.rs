use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::database::{
    Catalog, MemberDirectory, PgCatalog, PgMemberDirectory, PgSchemaBootstrapper, PoolRegistry,
    PoolSettings, ServerAddress,
};
use crate::handlers::{elevated::root::tenant as root_tenant, protected::tenant, public};
use crate::middleware::{
    auth_middleware, require_admin, require_manager, tenant_context_middleware, TenantGuard,
};
use crate::services::{AuditHook, Lifecycle, TenantProvisioner, TracingAudit};

/// Shared handles given to every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub provisioner: Arc<TenantProvisioner>,
    pub guard: Arc<TenantGuard>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        provisioner: Arc<TenantProvisioner>,
        audit: Arc<dyn AuditHook>,
        members: Arc<dyn MemberDirectory>,
    ) -> Self {
        let guard = Arc::new(TenantGuard::new(provisioner.clone(), audit, members));
        Self {
            config,
            provisioner,
            guard,
        }
    }
}

/// Database-facing components wired from configuration
pub struct Components {
    pub catalog: Arc<dyn Catalog>,
    pub registry: Arc<PoolRegistry>,
    pub audit: Arc<dyn AuditHook>,
    pub members: Arc<dyn MemberDirectory>,
    pub provisioner: Arc<TenantProvisioner>,
}

impl Components {
    /// Connect the master catalog pool and build the provisioning stack.
    /// Tenant pools are created later, on first use.
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let address = ServerAddress::parse(&config.database.url)
            .context("DATABASE_URL is not a valid postgres URL")?;
        info!(server = %address.redacted(), "Connecting to database server");

        let catalog: Arc<dyn Catalog> = Arc::new(
            PgCatalog::connect(&address, &config.database)
                .await
                .context("failed to connect to the maintenance database")?,
        );
        let registry = Arc::new(PoolRegistry::new(
            address.clone(),
            config.tenant.naming(),
            PoolSettings::from(&config.database),
        ));
        let bootstrapper = Arc::new(PgSchemaBootstrapper::new(address));
        let audit: Arc<dyn AuditHook> =
            Arc::new(TracingAudit::new(config.security.enable_audit_logging));

        let provisioner = Arc::new(TenantProvisioner::new(
            catalog.clone(),
            bootstrapper,
            registry.clone(),
            audit.clone(),
            &config.tenant,
        ));

        Ok(Self {
            catalog,
            registry,
            audit,
            members: Arc::new(PgMemberDirectory),
            provisioner,
        })
    }

    pub fn lifecycle(&self, timeout: Duration) -> Lifecycle {
        Lifecycle::new(self.registry.clone(), self.catalog.clone(), timeout)
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        // Public
        .route("/health", get(public::health))
        .merge(protected_routes(&state))
        .merge(elevated_routes(&state));

    if state.config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    let member = Router::new()
        .route("/api/tenant/whoami", get(tenant::tenant_whoami))
        .route_layer(from_fn_with_state(state.clone(), tenant_context_middleware));

    // Role gate runs before the company database is touched
    let manager = Router::new()
        .route("/api/tenant/stats", get(tenant::tenant_stats))
        .route_layer(from_fn_with_state(state.clone(), tenant_context_middleware))
        .route_layer(from_fn(require_manager));

    member
        .merge(manager)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
}

fn elevated_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/root/tenant",
            get(root_tenant::tenant_list).post(root_tenant::tenant_create),
        )
        .route(
            "/api/root/tenant/:name",
            get(root_tenant::tenant_show).delete(root_tenant::tenant_delete),
        )
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
}
