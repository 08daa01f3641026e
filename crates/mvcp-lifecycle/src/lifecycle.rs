use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use mvcp_domain::{LifecycleEvent, MicroVm, MicroVmSpec, MicroVmStatus, Metrics, VmId, VmState};
use mvcp_provider::{ProviderRegistry, RuntimeData};
use mvcp_store::{EventBus, Repository, VM_EVENTS_TOPIC};
use tracing::{debug, warn};

use crate::error::LifecycleError;

/// Create/Delete/Reconcile surface for microVM records. Each mutating call
/// is built on the same order: persist first, publish second, drive the
/// provider last — a failure at any step leaves the preceding ones intact.
pub struct LifecycleService {
    repo: Arc<dyn Repository>,
    bus: Arc<dyn EventBus>,
    providers: Arc<ProviderRegistry>,
    default_provider: String,
    maximum_retry: u32,
    metrics: Arc<Metrics>,
    active_count: AtomicI64,
}

impl LifecycleService {
    pub fn new(
        repo: Arc<dyn Repository>,
        bus: Arc<dyn EventBus>,
        providers: Arc<ProviderRegistry>,
        default_provider: impl Into<String>,
        maximum_retry: u32,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repo,
            bus,
            providers,
            default_provider: default_provider.into(),
            maximum_retry,
            metrics,
            active_count: AtomicI64::new(0),
        }
    }

    /// `id.name` must be non-empty. If `Save` fails, no event is published
    /// and the provider is never called. If `Start` fails after a
    /// successful save, the record stays `Pending` for a later reconcile.
    pub async fn create(&self, id: VmId, mut spec: MicroVmSpec) -> Result<MicroVm, LifecycleError> {
        if id.name.is_empty() {
            return Err(LifecycleError::InvalidArgument("vmid name must not be empty".into()));
        }
        spec.normalize(&self.default_provider)?;
        spec.created_at = Some(Utc::now());

        let vm = MicroVm { id, version: 0, spec, status: MicroVmStatus::default() };
        let saved = self.repo.save(vm).await?;

        self.bus.publish(VM_EVENTS_TOPIC, LifecycleEvent::Created { id: saved.id.clone() }).await?;

        let provider = self.providers.for_name(&saved.spec.provider)?;
        if let Err(e) = provider.start(&saved.spec).await {
            warn!(vmid = %saved.id, error = %e, "provider start failed after create, vm stays pending");
        }

        Ok(saved)
    }

    /// Load, stop, then delete — all three must succeed. Callers may retry
    /// a delete against an already-removed vmid; it surfaces as `NotFound`.
    pub async fn delete(&self, id: &VmId) -> Result<(), LifecycleError> {
        let vm = self.repo.get(id).await?.ok_or_else(|| LifecycleError::NotFound(id.format()))?;
        let provider = self.providers.for_name(&vm.spec.provider)?;
        provider.stop(&vm.spec).await?;
        self.repo.delete(id).await?;
        self.bus.publish(VM_EVENTS_TOPIC, LifecycleEvent::Deleted { id: id.clone() }).await?;

        if vm.status.state == VmState::Running {
            let count = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
            self.metrics.set_active_count(count);
        }

        Ok(())
    }

    /// Drives a `Pending`/`Failed` record toward `Running`. A no-op for
    /// anything else, so `Reconcile` is idempotent once a vm settles.
    pub async fn reconcile(&self, id: &VmId) -> Result<MicroVm, LifecycleError> {
        let mut vm = self.repo.get(id).await?.ok_or_else(|| LifecycleError::NotFound(id.format()))?;

        if !matches!(vm.status.state, VmState::Pending | VmState::Failed) {
            return Ok(vm);
        }

        let provider = self.providers.for_name(&vm.spec.provider)?;
        match provider.start(&vm.spec).await {
            Ok(()) => {
                vm.status.state = VmState::Running;
                let duration_seconds = vm
                    .spec
                    .created_at
                    .map(|created| (Utc::now() - created).num_milliseconds() as f64 / 1000.0)
                    .unwrap_or(0.0);
                self.metrics.record_spawn("running", duration_seconds.max(0.0));
                let count = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
                self.metrics.set_active_count(count);
            }
            Err(e) => {
                vm.status.retry += 1;
                if vm.status.retry > self.maximum_retry {
                    vm.status.state = VmState::Failed;
                    warn!(vmid = %id, retry = vm.status.retry, "exceeded maximum retry, marking failed");
                    let duration_seconds = vm
                        .spec
                        .created_at
                        .map(|created| (Utc::now() - created).num_milliseconds() as f64 / 1000.0)
                        .unwrap_or(0.0);
                    self.metrics.record_spawn("failed", duration_seconds.max(0.0));
                } else {
                    debug!(vmid = %id, error = %e, retry = vm.status.retry, "start failed, will retry");
                }
            }
        }

        Ok(self.repo.save(vm).await?)
    }

    pub async fn get(&self, id: &VmId) -> Result<Option<MicroVm>, LifecycleError> {
        Ok(self.repo.get(id).await?)
    }

    pub async fn get_all(&self) -> Result<Vec<MicroVm>, LifecycleError> {
        Ok(self.repo.get_all().await?)
    }

    pub async fn runtime_data(&self, id: &VmId) -> Result<RuntimeData, LifecycleError> {
        let vm = self.repo.get(id).await?.ok_or_else(|| LifecycleError::NotFound(id.format()))?;
        let provider = self.providers.for_name(&vm.spec.provider)?;
        Ok(provider.runtime_data(&vm.spec).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mvcp_provider::{DriverError, Provider};
    use mvcp_store::{InMemoryEventBus, InMemoryRepository};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn sample_spec() -> MicroVmSpec {
        MicroVmSpec {
            vcpu: 2,
            memory_mb: 512,
            kernel_path: "/boot/vmlinux".into(),
            rootfs_path: "/rootfs.ext4".into(),
            host_net_dev: None,
            guest_mac: None,
            image_ref: None,
            provider: String::new(),
            network_interfaces: vec![],
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    struct AlwaysOkProvider;

    #[async_trait]
    impl Provider for AlwaysOkProvider {
        fn name(&self) -> &'static str {
            "ok"
        }
        async fn start(&self, _spec: &MicroVmSpec) -> Result<(), DriverError> {
            Ok(())
        }
        async fn stop(&self, _spec: &MicroVmSpec) -> Result<(), DriverError> {
            Ok(())
        }
        async fn runtime_data(&self, _spec: &MicroVmSpec) -> Result<RuntimeData, DriverError> {
            Ok(serde_json::json!({}))
        }
    }

    /// Fails `start` the first `fail_times` calls, then succeeds.
    struct FlakyProvider {
        fail_times: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }
        async fn start(&self, _spec: &MicroVmSpec) -> Result<(), DriverError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(DriverError::StartFailed("transient".into()))
            } else {
                Ok(())
            }
        }
        async fn stop(&self, _spec: &MicroVmSpec) -> Result<(), DriverError> {
            Ok(())
        }
        async fn runtime_data(&self, _spec: &MicroVmSpec) -> Result<RuntimeData, DriverError> {
            Ok(serde_json::json!({}))
        }
    }

    fn service_with(
        providers: Vec<Arc<dyn Provider>>,
        default_provider: &str,
        maximum_retry: u32,
    ) -> LifecycleService {
        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(provider);
        }
        LifecycleService::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(InMemoryEventBus::new()),
            Arc::new(registry),
            default_provider,
            maximum_retry,
            Arc::new(Metrics::new()),
        )
    }

    #[tokio::test]
    async fn create_rejects_empty_name() {
        let service = service_with(vec![Arc::new(AlwaysOkProvider)], "ok", 3);
        let err = service.create(VmId::new("", None), sample_spec()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn spawn_then_delete() {
        let service = service_with(vec![Arc::new(AlwaysOkProvider)], "ok", 3);
        let vm = service.create(VmId::new("web", None), sample_spec()).await.unwrap();
        assert!(vm.id.is_assigned());
        assert_eq!(vm.status.state, VmState::Pending);

        service.delete(&vm.id).await.unwrap();
        assert!(service.get(&vm.id).await.unwrap().is_none());

        let err = service.delete(&vm.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }

    #[tokio::test]
    async fn reconcile_after_transient_failure_eventually_runs() {
        let flaky = Arc::new(FlakyProvider { fail_times: 2, attempts: AtomicU32::new(0) });
        let service = service_with(vec![flaky], "flaky", 3);
        let vm = service.create(VmId::new("db", None), sample_spec()).await.unwrap();
        assert_eq!(vm.status.state, VmState::Pending);

        let vm = service.reconcile(&vm.id).await.unwrap();
        assert_eq!(vm.status.state, VmState::Pending);
        assert_eq!(vm.status.retry, 1);

        let vm = service.reconcile(&vm.id).await.unwrap();
        assert_eq!(vm.status.state, VmState::Pending);
        assert_eq!(vm.status.retry, 2);

        let vm = service.reconcile(&vm.id).await.unwrap();
        assert_eq!(vm.status.state, VmState::Running);
    }

    #[tokio::test]
    async fn reconcile_marks_failed_once_retry_budget_exhausted() {
        struct AlwaysFailProvider;
        #[async_trait]
        impl Provider for AlwaysFailProvider {
            fn name(&self) -> &'static str {
                "bad"
            }
            async fn start(&self, _spec: &MicroVmSpec) -> Result<(), DriverError> {
                Err(DriverError::StartFailed("permanent".into()))
            }
            async fn stop(&self, _spec: &MicroVmSpec) -> Result<(), DriverError> {
                Ok(())
            }
            async fn runtime_data(&self, _spec: &MicroVmSpec) -> Result<RuntimeData, DriverError> {
                Ok(serde_json::json!({}))
            }
        }

        let service = service_with(vec![Arc::new(AlwaysFailProvider)], "bad", 2);
        let vm = service.create(VmId::new("flapper", None), sample_spec()).await.unwrap();

        let mut vm = vm;
        for _ in 0..2 {
            vm = service.reconcile(&vm.id).await.unwrap();
            assert_eq!(vm.status.state, VmState::Pending);
        }
        vm = service.reconcile(&vm.id).await.unwrap();
        assert_eq!(vm.status.state, VmState::Failed);
        assert_eq!(vm.status.retry, 3);
    }

    #[tokio::test]
    async fn reconcile_is_noop_once_running() {
        let service = service_with(vec![Arc::new(AlwaysOkProvider)], "ok", 3);
        let vm = service.create(VmId::new("web", None), sample_spec()).await.unwrap();
        let vm = service.reconcile(&vm.id).await.unwrap();
        assert_eq!(vm.status.state, VmState::Running);

        let vm2 = service.reconcile(&vm.id).await.unwrap();
        assert_eq!(vm2.version, vm.version);
    }

    #[tokio::test]
    async fn create_stamps_created_at_for_spawn_duration() {
        let service = service_with(vec![Arc::new(AlwaysOkProvider)], "ok", 3);
        let vm = service.create(VmId::new("web", None), sample_spec()).await.unwrap();
        assert!(vm.spec.created_at.is_some());
    }

    #[tokio::test]
    async fn metrics_reflect_spawn_and_delete() {
        let metrics = Arc::new(Metrics::new());
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(AlwaysOkProvider));
        let service = LifecycleService::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(InMemoryEventBus::new()),
            Arc::new(registry),
            "ok",
            3,
            metrics.clone(),
        );

        let vm = service.create(VmId::new("web", None), sample_spec()).await.unwrap();
        service.reconcile(&vm.id).await.unwrap();
        let after_spawn = metrics.render().unwrap();
        assert!(after_spawn.contains("spawn_total"));
        assert!(after_spawn.contains(r#"status="running""#));

        service.delete(&vm.id).await.unwrap();
        let after_delete = metrics.render().unwrap();
        assert_ne!(after_spawn, after_delete, "active_count gauge should drop after delete");
    }
}
