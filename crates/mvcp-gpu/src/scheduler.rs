use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use mvcp_domain::{
    AllocationInfo, AllocationStatus, DeviceId, DeviceStatus, GpuDeviceInfo, MigProfile, WorkloadId,
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::backend::{GpuBackend, NoopBackend};
use crate::error::GpuError;

struct Inner {
    devices: Vec<GpuDeviceInfo>,
    allocations: HashMap<WorkloadId, AllocationInfo>,
}

/// Thread-safe allocator for MIG-style GPU partitions.
///
/// Every state-mutating operation holds the single internal lock across the
/// whole call, including the backend round-trip — reads take the shared
/// mode. Devices are tried in stable insertion order for tie-breaking.
pub struct GpuScheduler {
    inner: RwLock<Inner>,
    backend: Arc<dyn GpuBackend>,
}

impl GpuScheduler {
    pub fn new(devices: Vec<GpuDeviceInfo>, backend: Arc<dyn GpuBackend>) -> Self {
        Self { inner: RwLock::new(Inner { devices, allocations: HashMap::new() }), backend }
    }

    pub fn with_noop_backend(devices: Vec<GpuDeviceInfo>) -> Self {
        Self::new(devices, Arc::new(NoopBackend))
    }

    pub async fn allocate_gpu(
        &self,
        workload_id: WorkloadId,
        profile: MigProfile,
    ) -> Result<AllocationInfo, GpuError> {
        let mut inner = self.inner.write().await;
        if inner.allocations.contains_key(&workload_id) {
            return Err(GpuError::DuplicateWorkload(workload_id));
        }

        let needed = profile.memory_bytes();
        let mut last_backend_err: Option<String> = None;

        let candidate_idx = inner
            .devices
            .iter()
            .position(|d| d.status == DeviceStatus::Available && d.available_memory_bytes >= needed);

        // Try every device with enough capacity, in stable order, before
        // giving up — a single backend rejection doesn't exhaust the search.
        let mut idx = candidate_idx;
        while let Some(i) = idx {
            let device_id = inner.devices[i].id.clone();
            match self.backend.create_partition(&device_id, &profile).await {
                Ok(()) => {
                    let device = &mut inner.devices[i];
                    device.available_memory_bytes -= needed;
                    device.allocations.push(workload_id.clone());
                    let record = AllocationInfo {
                        workload_id: workload_id.clone(),
                        device_id: device.id.clone(),
                        profile,
                        status: AllocationStatus::Allocated,
                        created_at: Utc::now(),
                        expires_at: None,
                    };
                    inner.allocations.insert(workload_id, record.clone());
                    return Ok(record);
                }
                Err(e) => {
                    last_backend_err = Some(e.to_string());
                    idx = inner.devices.iter().enumerate().skip(i + 1).find_map(|(j, d)| {
                        (d.status == DeviceStatus::Available && d.available_memory_bytes >= needed)
                            .then_some(j)
                    });
                }
            }
        }

        match last_backend_err {
            Some(msg) => Err(GpuError::BackendPartitionFailed(msg)),
            None => Err(GpuError::NoSuitableDevice),
        }
    }

    pub async fn deallocate_gpu(&self, workload_id: &WorkloadId) -> Result<(), GpuError> {
        let mut inner = self.inner.write().await;
        self.deallocate_locked(&mut inner, workload_id).await
    }

    async fn deallocate_locked(
        &self,
        inner: &mut Inner,
        workload_id: &WorkloadId,
    ) -> Result<(), GpuError> {
        let record = inner
            .allocations
            .remove(workload_id)
            .ok_or_else(|| GpuError::UnknownWorkload(workload_id.clone()))?;

        if let Some(device) = inner.devices.iter_mut().find(|d| d.id == record.device_id) {
            device.available_memory_bytes += record.profile.memory_bytes();
            device.allocations.retain(|w| w != workload_id);
        }

        // Backend teardown is best-effort: the record is removed regardless
        // of whether the underlying partition actually tears down cleanly.
        if let Err(e) = self.backend.destroy_partition(&record.device_id, workload_id).await {
            warn!(workload_id = %workload_id, error = %e, "destroy_partition failed, record removed anyway");
        }

        Ok(())
    }

    pub async fn get_workload_allocation(
        &self,
        workload_id: &WorkloadId,
    ) -> Result<AllocationInfo, GpuError> {
        let inner = self.inner.read().await;
        inner
            .allocations
            .get(workload_id)
            .cloned()
            .ok_or_else(|| GpuError::UnknownWorkload(workload_id.clone()))
    }

    pub async fn get_all_allocations(&self) -> Vec<AllocationInfo> {
        let inner = self.inner.read().await;
        inner.allocations.values().cloned().collect()
    }

    pub async fn get_available_devices(&self) -> Vec<GpuDeviceInfo> {
        let inner = self.inner.read().await;
        inner.devices.iter().filter(|d| d.status == DeviceStatus::Available).cloned().collect()
    }

    /// All devices regardless of status, in stable insertion order.
    pub async fn get_all_devices(&self) -> Vec<GpuDeviceInfo> {
        let inner = self.inner.read().await;
        inner.devices.clone()
    }

    pub async fn get_device_status(&self) -> HashMap<DeviceId, DeviceStatus> {
        let inner = self.inner.read().await;
        inner.devices.iter().map(|d| (d.id.clone(), d.status)).collect()
    }

    pub async fn get_device_utilization(&self) -> HashMap<DeviceId, f64> {
        let inner = self.inner.read().await;
        inner
            .devices
            .iter()
            .map(|d| {
                let total = d.total_memory_bytes as f64;
                let used = total - d.available_memory_bytes as f64;
                let percent = if total > 0.0 { used / total * 100.0 } else { 0.0 };
                (d.id.clone(), percent)
            })
            .collect()
    }

    /// Sweep allocations older than `timeout_seconds`, or whose `expires_at`
    /// has already passed, and deallocate them.
    pub async fn cleanup_expired_allocations(&self, timeout_seconds: i64) -> Result<(), GpuError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let expired: Vec<WorkloadId> = inner
            .allocations
            .values()
            .filter(|a| {
                let stale = (now - a.created_at).num_seconds() > timeout_seconds;
                let past_expiry = a.expires_at.map_or(false, |exp| exp < now);
                stale || past_expiry
            })
            .map(|a| a.workload_id.clone())
            .collect();

        for workload_id in expired {
            let _ = self.deallocate_locked(&mut inner, &workload_id).await;
        }
        Ok(())
    }
}
