use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};

use crate::database::{Catalog, PoolRegistry};

/// Drains tenant pools and the master connection when the process stops
pub struct Lifecycle {
    registry: Arc<PoolRegistry>,
    catalog: Arc<dyn Catalog>,
    timeout: Duration,
}

impl Lifecycle {
    pub fn new(registry: Arc<PoolRegistry>, catalog: Arc<dyn Catalog>, timeout: Duration) -> Self {
        Self {
            registry,
            catalog,
            timeout,
        }
    }

    /// Close every tenant pool, then the master catalog pool. Never retries;
    /// a drain that overruns the timeout is logged and abandoned.
    pub async fn shutdown(&self) {
        info!("Draining database connections");

        let pools = self.registry.pool_count().await;
        if tokio::time::timeout(self.timeout, self.registry.close_all())
            .await
            .is_err()
        {
            warn!(pools, timeout_secs = self.timeout.as_secs(), "Timed out closing tenant pools");
        }

        if tokio::time::timeout(self.timeout, self.catalog.close())
            .await
            .is_err()
        {
            warn!(timeout_secs = self.timeout.as_secs(), "Timed out closing master catalog pool");
        }

        info!(pools, "Database connections closed");
    }
}

/// Wait for termination signals (Ctrl+C, SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(%e, "Error handling Ctrl+C signal");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C signal");
    };

    tokio::select! {
        _ = ctrl_c => {},
        result = wait_sigterm() => {
            if let Err(e) = result {
                error!(%e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        },
    }

    info!("Shutdown signal received, initiating graceful shutdown");
}

#[cfg(unix)]
async fn wait_sigterm() -> Result<()> {
    let mut handler = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    handler.recv().await;
    info!("Received SIGTERM signal");
    Ok(())
}

#[cfg(not(unix))]
async fn wait_sigterm() -> Result<()> {
    std::future::pending::<Result<()>>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarness;

    #[tokio::test]
    async fn shutdown_closes_pools_then_catalog() {
        let h = TestHarness::new();
        let acme = h.provisioner.pool("acme").await.unwrap();
        let globex = h.provisioner.pool("globex").await.unwrap();

        let lifecycle = Lifecycle::new(
            h.provisioner.registry().clone(),
            h.catalog.clone(),
            Duration::from_secs(5),
        );
        lifecycle.shutdown().await;

        assert!(acme.is_closed());
        assert!(globex.is_closed());
        assert_eq!(h.provisioner.registry().pool_count().await, 0);
        assert!(h.catalog.is_closed());
    }
}
