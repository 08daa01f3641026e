use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mvcp_domain::{LifecycleEvent, MicroVm, VmId};
use tokio::sync::{broadcast, RwLock};

use crate::error::StoreError;
use crate::store::{EventBus, Repository};

#[derive(Debug, Default)]
struct Inner {
    vms: HashMap<String, MicroVm>,
}

/// In-memory [`Repository`]. All data is lost on process exit — suitable for
/// tests and for running without a configured `STATE_ROOT_DIR`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, mut vm: MicroVm) -> Result<MicroVm, StoreError> {
        let mut guard = self.inner.write().await;
        vm.id.assign_uid();
        let key = vm.id.format();
        let next_version = guard.vms.get(&key).map(|existing| existing.version + 1).unwrap_or(1);
        vm.version = next_version;
        guard.vms.insert(key, vm.clone());
        Ok(vm)
    }

    async fn get(&self, id: &VmId) -> Result<Option<MicroVm>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.vms.get(&id.format()).cloned())
    }

    async fn get_all(&self) -> Result<Vec<MicroVm>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.vms.values().cloned().collect())
    }

    async fn delete(&self, id: &VmId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.vms.remove(&id.format());
        Ok(())
    }
}

/// In-memory [`EventBus`] backed by a `tokio::sync::broadcast` channel per
/// topic. Subscribers that join after a publish miss it — matches the "at
/// least once to current subscribers" contract, not a durable log.
///
/// Uses a `std::sync::Mutex` rather than a tokio lock: `subscribe` is a sync
/// trait method (matching `broadcast::Receiver`'s own constructor shape), and
/// the critical section never awaits, so a std mutex is the simpler and
/// correct choice here.
pub struct InMemoryEventBus {
    topics: std::sync::Mutex<HashMap<String, broadcast::Sender<LifecycleEvent>>>,
    capacity: usize,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self { topics: std::sync::Mutex::new(HashMap::new()), capacity: 256 }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<LifecycleEvent> {
        let mut guard = self.topics.lock().expect("event bus mutex poisoned");
        guard.entry(topic.to_string()).or_insert_with(|| broadcast::channel(self.capacity).0).clone()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, event: LifecycleEvent) -> Result<(), StoreError> {
        let tx = self.sender_for(topic);
        // No subscribers is not an error: publish-then-subscribe is a valid
        // ordering for the first event on a fresh topic.
        let _ = tx.send(event);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<LifecycleEvent> {
        self.sender_for(topic).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvcp_domain::{MicroVmSpec, MicroVmStatus};

    fn dummy_vm(name: &str) -> MicroVm {
        MicroVm {
            id: VmId::new(name, None),
            version: 0,
            spec: MicroVmSpec {
                vcpu: 2,
                memory_mb: 1024,
                kernel_path: "/boot/vmlinux".into(),
                rootfs_path: "/rootfs.ext4".into(),
                host_net_dev: None,
                guest_mac: None,
                image_ref: None,
                provider: "local".into(),
                network_interfaces: vec![],
                created_at: None,
                updated_at: None,
                deleted_at: None,
            },
            status: MicroVmStatus::default(),
        }
    }

    #[tokio::test]
    async fn save_assigns_uid_and_initial_version() {
        let repo = InMemoryRepository::new();
        let saved = repo.save(dummy_vm("a")).await.unwrap();
        assert!(saved.id.is_assigned());
        assert_eq!(saved.version, 1);
    }

    #[tokio::test]
    async fn save_again_increments_version() {
        let repo = InMemoryRepository::new();
        let first = repo.save(dummy_vm("a")).await.unwrap();
        let mut second_input = first.clone();
        second_input.status.retry = 1;
        let second = repo.save(second_input).await.unwrap();
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn get_and_delete_round_trip() {
        let repo = InMemoryRepository::new();
        let saved = repo.save(dummy_vm("a")).await.unwrap();
        assert!(repo.get(&saved.id).await.unwrap().is_some());
        repo.delete(&saved.id).await.unwrap();
        assert!(repo.get(&saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_all_returns_every_saved_record() {
        let repo = InMemoryRepository::new();
        repo.save(dummy_vm("a")).await.unwrap();
        repo.save(dummy_vm("b")).await.unwrap();
        assert_eq!(repo.get_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn publish_is_observed_by_existing_subscriber() {
        let bus = InMemoryEventBus::new();
        let mut rx = bus.subscribe("vm-events");
        let id = VmId::new("a", None);
        bus.publish("vm-events", LifecycleEvent::Created { id: id.clone() }).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.vmid(), &id);
    }
}
