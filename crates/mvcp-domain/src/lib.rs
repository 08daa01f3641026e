pub mod error;
pub mod metrics;
pub mod types;

pub use error::DomainError;
pub use metrics::Metrics;
pub use types::{
    AllocationInfo, AllocationStatus, BeaconMetadata, DeviceId, DeviceStatus, GpuDeviceInfo,
    LifecycleEvent, Member, MemberStatus, MicroVm, MicroVmSpec, MicroVmStatus, MigProfile,
    NetworkInterface, Policy, PolicyMode, PolicyRules, PolicyScoring, VmId, VmState, WorkloadId,
    DEFAULT_NAMESPACE, MEMORY_MB_MAX, MEMORY_MB_MIN, METADATA_IFACE_CIDR, METADATA_IFACE_MAC,
    METADATA_IFACE_NAME, VCPU_MAX, VCPU_MIN,
};
