use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::PolicyEngine;

/// Polls `path`'s mtime every `poll_interval` and reloads the policy into
/// `engine` whenever it changes. A failed reload is logged and the
/// previously loaded policy is left in place.
pub fn spawn_hot_reload(
    engine: Arc<PolicyEngine>,
    path: PathBuf,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_modified: Option<SystemTime> = std::fs::metadata(&path).and_then(|m| m.modified()).ok();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(poll_interval) => {}
            }

            let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "policy file stat failed during hot reload poll");
                    continue;
                }
            };

            if Some(modified) == last_modified {
                continue;
            }

            match engine.load_policy(&path).await {
                Ok(()) => {
                    info!(path = %path.display(), "policy hot-reloaded");
                    last_modified = Some(modified);
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "policy hot reload failed, keeping previous policy");
                }
            }
        }
    })
}
