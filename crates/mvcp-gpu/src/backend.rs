use async_trait::async_trait;
use mvcp_domain::{DeviceId, MigProfile, WorkloadId};

use crate::error::GpuError;

/// The opaque partitioning operation the scheduler delegates to — whatever
/// actually carves a device into a MIG-style slice (nvidia-smi, a vendor
/// SDK, or nothing at all in tests).
#[async_trait]
pub trait GpuBackend: Send + Sync + 'static {
    async fn create_partition(&self, device_id: &DeviceId, profile: &MigProfile) -> Result<(), GpuError>;
    async fn destroy_partition(&self, device_id: &DeviceId, workload_id: &WorkloadId) -> Result<(), GpuError>;
}

/// A backend that always succeeds and does no actual partitioning. Used by
/// default when no real accelerator driver is wired in.
#[derive(Debug, Default, Clone)]
pub struct NoopBackend;

#[async_trait]
impl GpuBackend for NoopBackend {
    async fn create_partition(&self, _device_id: &DeviceId, _profile: &MigProfile) -> Result<(), GpuError> {
        Ok(())
    }

    async fn destroy_partition(&self, _device_id: &DeviceId, _workload_id: &WorkloadId) -> Result<(), GpuError> {
        Ok(())
    }
}
