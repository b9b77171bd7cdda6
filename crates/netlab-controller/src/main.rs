//! Binary entrypoint for the netlab controller.
//!
//! Configuration comes from `NETLAB_*` environment variables (see
//! [`ControllerConfig::from_env`]); log filtering from `RUST_LOG`.

use std::sync::Arc;

use netlab_controller::{Controller, ControllerConfig, HttpCompute};
use netlab_core::{ComputeId, ComputeSpec};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ControllerConfig::from_env()?;
    let local = ComputeSpec::new(
        ComputeId::local(),
        config.local_compute_host.clone(),
        config.local_compute_port,
    );
    let timeout = config.compute_timeout;
    let controller = Controller::new(config);
    controller.register_compute(Arc::new(HttpCompute::new(local, timeout)));

    let loaded = controller.load_projects().await?;
    tracing::info!(
        "netlab controller ready: {} project(s) under {}",
        loaded,
        controller.config().projects_path.display()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down, closing projects");
    controller.close_projects().await;
    Ok(())
}
