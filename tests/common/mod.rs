#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use uuid::Uuid;

use logos_api::app::Components;
use logos_api::config::AppConfig;
use logos_api::services::TenantProvisioner;

/// Server URL for integration tests; tests skip when it is unset
pub fn database_url() -> Option<String> {
    let _ = dotenvy::dotenv();
    match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => Some(url),
        _ => {
            eprintln!("TEST_DATABASE_URL not set; skipping database test");
            None
        }
    }
}

/// Database prefix unique to one test, so parallel tests never see each other's databases
pub fn unique_prefix() -> String {
    format!("lt_{}", &Uuid::new_v4().simple().to_string()[..12])
}

pub fn test_config(database_url: &str, prefix: &str) -> AppConfig {
    let mut config = AppConfig::defaults();
    config.database.url = database_url.to_string();
    config.tenant.database_prefix = prefix.to_string();
    config.security.jwt_secret = "integration-secret".to_string();
    config.security.service_api_key = Some("integration-service-key".to_string());
    config
}

/// Provisioning stack against the test server, scoped to a unique prefix
pub struct TestStack {
    pub config: AppConfig,
    pub components: Components,
}

impl TestStack {
    pub async fn connect() -> Result<Option<Self>> {
        let Some(url) = database_url() else {
            return Ok(None);
        };
        let config = test_config(&url, &unique_prefix());
        let components = Components::connect(&config).await?;
        Ok(Some(Self { config, components }))
    }

    pub fn provisioner(&self) -> &Arc<TenantProvisioner> {
        &self.components.provisioner
    }

    /// Drop every database created under this stack's prefix, then close pools
    pub async fn cleanup(self) -> Result<()> {
        for db in self.provisioner().list_all_tenant_databases().await? {
            self.provisioner().delete(db.tenant_key.as_str()).await?;
        }
        self.components.lifecycle(Duration::from_secs(5)).shutdown().await;
        Ok(())
    }
}

pub struct TestServer {
    pub base_url: String,
    child: Child,
}

impl TestServer {
    /// Spawn the API binary against the test database with its own prefix
    pub fn spawn(config: &AppConfig) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_logos-api"));
        cmd.env("API_PORT", port.to_string())
            .env("DATABASE_URL", &config.database.url)
            .env("TENANT_DATABASE_PREFIX", &config.tenant.database_prefix)
            .env("JWT_SECRET", &config.security.jwt_secret)
            .env("SERVICE_API_KEY", config.security.service_api_key.as_deref().unwrap_or_default())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        Ok(Self { base_url, child })
    }

    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
