use std::sync::Arc;

use anyhow::Context;

use jobmesh_api::app::{self, services};
use jobmesh_infra::AppConfig;
use jobmesh_infra::config::Backend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jobmesh_observability::init();

    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr.clone();

    let services = Arc::new(match config.backend {
        Backend::Memory => services::build_in_memory(config)?,
        Backend::Redis => build_redis(config)?,
    });

    let router = app::build_app(services.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tokio::task::spawn_blocking(move || services.shutdown()).await?;
    Ok(())
}

#[cfg(feature = "redis")]
fn build_redis(config: AppConfig) -> anyhow::Result<services::AppServices> {
    services::build_redis(config)
}

#[cfg(not(feature = "redis"))]
fn build_redis(_config: AppConfig) -> anyhow::Result<services::AppServices> {
    anyhow::bail!("JOBMESH_BACKEND=redis requires the `redis` feature")
}
