use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, Notify};

struct Inner {
    items: VecDeque<String>,
    queued: HashSet<String>,
}

/// FIFO queue of opaque work items (vmid strings) shared by the event
/// listener and the reconcile workers.
///
/// `Enqueue` never blocks. `Dequeue` blocks until an item is available or
/// the queue is shut down, in which case it returns `None`. Items enqueued
/// after shutdown are silently dropped; items already queued before
/// shutdown are still handed out.
pub struct WorkQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    shutdown: AtomicBool,
}

impl Default for Inner {
    fn default() -> Self {
        Self { items: VecDeque::new(), queued: HashSet::new() }
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()), notify: Notify::new(), shutdown: AtomicBool::new(false) }
    }

    pub async fn enqueue(&self, item: String) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut inner = self.inner.lock().await;
            if inner.queued.insert(item.clone()) {
                inner.items.push_back(item);
            } else {
                return;
            }
        }
        self.notify.notify_one();
    }

    pub async fn dequeue(&self) -> Option<String> {
        loop {
            // Register the waiter before checking state so a notify that
            // arrives between the check and the await is never missed.
            let notified = self.notify.notified();

            {
                let mut inner = self.inner.lock().await;
                if let Some(item) = inner.items.pop_front() {
                    inner.queued.remove(&item);
                    return Some(item);
                }
            }

            if self.shutdown.load(Ordering::SeqCst) {
                return None;
            }

            notified.await;
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
