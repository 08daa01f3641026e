use async_trait::async_trait;
use mvcp_domain::{LifecycleEvent, MicroVm, VmId};
use tokio::sync::broadcast;

use crate::error::StoreError;

/// Durable store of `MicroVM` specs keyed by `(namespace, name, uid)`.
///
/// Version is monotonically incremented by the store on every `save`, not by
/// the caller — callers pass in whatever version they last observed and get
/// back the authoritative one.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Assigns a uid if `vm.id` doesn't have one yet, bumps `version`, and
    /// persists. Returns the persisted record.
    async fn save(&self, vm: MicroVm) -> Result<MicroVm, StoreError>;
    async fn get(&self, id: &VmId) -> Result<Option<MicroVm>, StoreError>;
    async fn get_all(&self) -> Result<Vec<MicroVm>, StoreError>;
    async fn delete(&self, id: &VmId) -> Result<(), StoreError>;
}

/// Topic-based pub/sub of lifecycle envelopes. At-least-once delivery to
/// subscribers that were already listening when `publish` was called.
#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    async fn publish(&self, topic: &str, event: LifecycleEvent) -> Result<(), StoreError>;
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<LifecycleEvent>;
}

/// Canonical topic name for VM lifecycle envelopes.
pub const VM_EVENTS_TOPIC: &str = "vm-events";
