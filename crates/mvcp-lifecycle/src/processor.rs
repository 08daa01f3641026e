use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mvcp_domain::{LifecycleEvent, VmId, VmState};
use mvcp_store::{EventBus, VM_EVENTS_TOPIC};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::lifecycle::LifecycleService;
use crate::queue::WorkQueue;

const SUPERVISION_WINDOW: Duration = Duration::from_secs(60);

/// Base and ceiling for the exponential backoff applied between reconcile
/// attempts on the same vmid. Doubles per retry, jittered by up to 20%.
const BASE_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// `2^retry * BASE_BACKOFF`, capped at `MAX_BACKOFF` and jittered by up to
/// 20% so a burst of vmids retrying together doesn't thunder back in lockstep.
fn backoff_for(retry: u32) -> Duration {
    let exp = retry.min(16);
    let scaled = BASE_BACKOFF.saturating_mul(1u32.checked_shl(exp).unwrap_or(u32::MAX));
    let capped = scaled.min(MAX_BACKOFF);
    let jitter_frac = rand::random::<f64>() * 0.2;
    capped.mul_f64(1.0 + jitter_frac)
}

/// Runs one event listener plus `num_workers` reconcile workers. Workers
/// are supervised individually: a panicking worker is respawned, but more
/// than `maximum_retry` panics inside one sliding window marks the whole
/// processor `Degraded` and the worker gives up.
pub struct VmProcessor {
    service: Arc<LifecycleService>,
    bus: Arc<dyn EventBus>,
    queue: Arc<WorkQueue>,
    maximum_retry: u32,
    degraded: AtomicBool,
}

impl VmProcessor {
    pub fn new(service: Arc<LifecycleService>, bus: Arc<dyn EventBus>, maximum_retry: u32) -> Self {
        Self { service, bus, queue: Arc::new(WorkQueue::new()), maximum_retry, degraded: AtomicBool::new(false) }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub fn queue(&self) -> Arc<WorkQueue> {
        self.queue.clone()
    }

    /// Runs until `cancel` fires, then drains and joins every worker.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken, num_workers: usize) {
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(num_workers + 1);

        let listener = self.clone();
        let listener_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            listener.run_event_listener(listener_cancel).await;
        }));

        for worker_id in 0..num_workers {
            let processor = self.clone();
            let worker_cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                processor.run_worker_supervised(worker_id, worker_cancel).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn run_event_listener(&self, cancel: CancellationToken) {
        let mut rx = self.bus.subscribe(VM_EVENTS_TOPIC);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.queue.shutdown();
                    return;
                }
                event = rx.recv() => {
                    match event {
                        Ok(LifecycleEvent::Created { id }) | Ok(LifecycleEvent::Updated { id }) => {
                            self.queue.enqueue(id.format()).await;
                        }
                        Ok(LifecycleEvent::Deleted { .. }) => {
                            debug!("discarding deleted event, terminal state needs no reconcile");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event listener lagged behind the bus");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            self.queue.shutdown();
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn run_worker_supervised(&self, worker_id: usize, cancel: CancellationToken) {
        let mut panics_in_window: u32 = 0;
        let mut window_start = tokio::time::Instant::now();

        loop {
            if cancel.is_cancelled() {
                return;
            }

            let service = self.service.clone();
            let queue = self.queue.clone();
            let worker_cancel = cancel.clone();
            let handle =
                tokio::spawn(
                    async move { reconcile_worker_loop(worker_id, service, queue, worker_cancel).await },
                );

            match handle.await {
                Ok(()) => return,
                Err(join_err) if join_err.is_panic() => {
                    if window_start.elapsed() > SUPERVISION_WINDOW {
                        panics_in_window = 0;
                        window_start = tokio::time::Instant::now();
                    }
                    panics_in_window += 1;
                    if panics_in_window > self.maximum_retry {
                        error!(worker_id, "reconcile worker exceeded its panic budget, processor degraded");
                        self.degraded.store(true, Ordering::SeqCst);
                        return;
                    }
                    warn!(worker_id, panics_in_window, "reconcile worker panicked, respawning");
                }
                Err(_) => return,
            }
        }
    }
}

async fn reconcile_worker_loop(
    worker_id: usize,
    service: Arc<LifecycleService>,
    queue: Arc<WorkQueue>,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => return,
            item = queue.dequeue() => item,
        };
        let Some(item) = item else { return };

        let vmid = match VmId::parse(&item) {
            Ok(vmid) => vmid,
            Err(e) => {
                warn!(worker_id, item = %item, error = %e, "dropping unparseable work item");
                continue;
            }
        };

        match service.reconcile(&vmid).await {
            Ok(vm) if vm.status.state == VmState::Pending => {
                let delay = backoff_for(vm.status.retry);
                debug!(worker_id, vmid = %vmid, retry = vm.status.retry, delay_ms = delay.as_millis(), "still pending, backing off before retry");
                let queue = queue.clone();
                let item = item.clone();
                let retry_cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = retry_cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => queue.enqueue(item).await,
                    }
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(worker_id, vmid = %vmid, error = %e, "reconcile failed, worker continues");
            }
        }
    }
}
