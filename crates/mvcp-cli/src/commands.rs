use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::application::Application;

/// Number of reconcile workers behind the processor. Not exposed as config
/// yet — a single node rarely needs more than a handful of concurrent
/// provider calls in flight.
const DEFAULT_WORKERS: usize = 4;

pub async fn serve(app: Arc<Application>) -> Result<()> {
    let cancel = CancellationToken::new();

    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received");
        shutdown_cancel.cancel();
    });

    app.run(cancel, DEFAULT_WORKERS).await
}

pub async fn status(app: Arc<Application>) -> Result<()> {
    let vms = app.lifecycle.get_all().await?;
    let policy = app.policy.get_policy().await;
    let devices = app.gpu.get_all_devices().await;
    let available = app.gpu.get_available_devices().await;

    println!("vms: {}", vms.len());
    println!("policy: {} ({:?})", policy.name, policy.mode);
    println!("gpu devices: {} total, {} available", devices.len(), available.len());
    Ok(())
}

pub async fn policy(app: Arc<Application>, load: Option<PathBuf>) -> Result<()> {
    if let Some(path) = load {
        app.policy.load_policy(&path).await?;
    }

    let policy = app.policy.get_policy().await;
    println!("{}", serde_json::to_string_pretty(&*policy)?);
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
