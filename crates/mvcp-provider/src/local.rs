use async_trait::async_trait;
use mvcp_domain::MicroVmSpec;
use serde_json::json;
use tracing::debug;

use crate::driver::{Provider, RuntimeData};
use crate::error::DriverError;

/// A stub provider that simulates a hypervisor locally. Performs no actual
/// virtualization — useful for tests and for running the daemon without a
/// real backend installed.
#[derive(Debug, Default, Clone)]
pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn start(&self, spec: &MicroVmSpec) -> Result<(), DriverError> {
        debug!(kernel = %spec.kernel_path, "LocalProvider: start");
        Ok(())
    }

    async fn stop(&self, spec: &MicroVmSpec) -> Result<(), DriverError> {
        debug!(kernel = %spec.kernel_path, "LocalProvider: stop");
        Ok(())
    }

    async fn runtime_data(&self, spec: &MicroVmSpec) -> Result<RuntimeData, DriverError> {
        Ok(json!({
            "provider": "local",
            "vcpu": spec.vcpu,
            "memory_mb": spec.memory_mb,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> MicroVmSpec {
        MicroVmSpec {
            vcpu: 2,
            memory_mb: 512,
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
        }
    }

    #[tokio::test]
    async fn start_and_stop_succeed() {
        let provider = LocalProvider::new();
        let spec = sample_spec();
        provider.start(&spec).await.unwrap();
        provider.stop(&spec).await.unwrap();
    }

    #[tokio::test]
    async fn runtime_data_reports_spec_shape() {
        let provider = LocalProvider::new();
        let spec = sample_spec();
        let data = provider.runtime_data(&spec).await.unwrap();
        assert_eq!(data["vcpu"], 2);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let provider = LocalProvider::new();
        let spec = sample_spec();
        provider.stop(&spec).await.unwrap();
        provider.stop(&spec).await.unwrap();
    }
}
