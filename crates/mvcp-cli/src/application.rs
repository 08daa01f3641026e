use std::sync::Arc;

use anyhow::{Context, Result};
use mvcp_api::Metrics;
use mvcp_config::DaemonConfig;
use mvcp_domain::{DeviceStatus, GpuDeviceInfo, Policy, PolicyMode, PolicyRules, PolicyScoring};
use mvcp_gpu::GpuScheduler;
use mvcp_lifecycle::{LifecycleService, VmProcessor};
use mvcp_policy::{spawn_hot_reload, PolicyEngine};
use mvcp_provider::{LocalProvider, ProviderRegistry};
use mvcp_store::{InMemoryEventBus, RedbRepository, Repository};
use tokio_util::sync::CancellationToken;

/// Owns every long-lived component and the trait objects they share.
/// Constructors below take only the interfaces they need — nothing reaches
/// back into `Application` itself.
pub struct Application {
    pub config: DaemonConfig,
    pub lifecycle: Arc<LifecycleService>,
    pub processor: Arc<VmProcessor>,
    pub gpu: Arc<GpuScheduler>,
    pub policy: Arc<PolicyEngine>,
    pub metrics: Arc<Metrics>,
}

impl Application {
    /// Wires the repository, event bus, provider registry, GPU scheduler,
    /// and policy engine from `config`. Fails (exit code 1 at the call
    /// site) if the configured default provider has no registered driver.
    pub fn bootstrap(config: DaemonConfig) -> Result<Self> {
        let repo: Arc<dyn Repository> = Arc::new(
            RedbRepository::open(&config.state_root_dir.join("state.redb"))
                .with_context(|| format!("opening state store at {}", config.state_root_dir.display()))?,
        );
        let bus = Arc::new(InMemoryEventBus::new());

        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(LocalProvider::new()));
        let registry = Arc::new(registry);
        registry
            .for_name(&config.default_provider)
            .with_context(|| format!("default provider '{}' is not registered", config.default_provider))?;

        let metrics = Arc::new(Metrics::new());

        let lifecycle = Arc::new(LifecycleService::new(
            repo,
            bus.clone(),
            registry,
            config.default_provider.clone(),
            config.maximum_retry,
            metrics.clone(),
        ));
        let processor = Arc::new(VmProcessor::new(lifecycle.clone(), bus, config.maximum_retry));

        let devices: Vec<GpuDeviceInfo> = (0..config.gpu_device_count)
            .map(|i| GpuDeviceInfo {
                id: format!("gpu{i}"),
                name: format!("gpu-{i}"),
                total_memory_bytes: config.gpu_device_memory_gb * (1u64 << 30),
                available_memory_bytes: config.gpu_device_memory_gb * (1u64 << 30),
                mig_enabled: true,
                status: DeviceStatus::Available,
                allocations: vec![],
            })
            .collect();
        let gpu = Arc::new(GpuScheduler::with_noop_backend(devices));

        let policy = Arc::new(PolicyEngine::new(
            Policy {
                name: "default".into(),
                mode: PolicyMode::Permissive,
                rules: PolicyRules::default(),
                scoring: PolicyScoring::default(),
            },
            metrics.clone(),
        ));

        Ok(Self { config, lifecycle, processor, gpu, policy, metrics })
    }

    /// Starts the API server and the reconcile processor, and blocks until
    /// `cancel` fires. Either half can be turned off from config, in which
    /// case this only waits on whichever half is still running.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken, num_workers: usize) -> Result<()> {
        let processor_handle = if self.config.disable_reconcile {
            None
        } else {
            let processor = self.processor.clone();
            let processor_cancel = cancel.clone();
            Some(tokio::spawn(async move { processor.run(processor_cancel, num_workers).await }))
        };

        let reload_handle = if let Some(policy_path) = self.config.policy_path.clone() {
            self.policy
                .load_policy(&policy_path)
                .await
                .with_context(|| format!("loading policy from {}", policy_path.display()))?;
            Some(spawn_hot_reload(
                self.policy.clone(),
                policy_path,
                self.config.policy_reload_period,
                cancel.clone(),
            ))
        } else {
            None
        };

        if !self.config.disable_api {
            let app = mvcp_api::build_app(
                self.lifecycle.clone(),
                self.gpu.clone(),
                self.metrics.clone(),
                self.config.basic_auth_token.clone().map(Arc::new),
            );

            let addr = self.config.http_endpoint.context("no http endpoint configured")?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding http listener on {addr}"))?;

            tracing::info!(%addr, "mvcpd listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
                .context("http server error")?;
        } else {
            cancel.cancelled().await;
        }

        if let Some(processor_handle) = processor_handle {
            processor_handle.await.context("processor task panicked")?;
        }
        if let Some(reload_handle) = reload_handle {
            reload_handle.await.context("policy hot-reload task panicked")?;
        }

        Ok(())
    }
}
