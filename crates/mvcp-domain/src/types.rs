use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ── VMID ──────────────────────────────────────────────────────────────────────

/// Namespace used when the caller supplies none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Composite identity `(name, namespace, uid)`.
///
/// `uid` is empty until the record's first successful `Repository::save` —
/// see [`VmId::is_assigned`]. Serializes as `namespace/name/uid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VmId {
    pub name: String,
    pub namespace: String,
    pub uid: String,
}

impl VmId {
    /// Construct a new, not-yet-persisted id. `namespace` defaults to
    /// [`DEFAULT_NAMESPACE`] when absent.
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            uid: String::new(),
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.uid.is_empty()
    }

    /// Assign a freshly generated uid. No-op if already assigned.
    pub fn assign_uid(&mut self) {
        if self.uid.is_empty() {
            self.uid = random_hex_id();
        }
    }

    pub fn format(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.name, self.uid)
    }

    /// Parse `namespace/name/uid`. Rejects anything but exactly three
    /// non-empty segments.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(DomainError::MalformedVMID(s.to_string()));
        }
        Ok(Self {
            namespace: parts[0].to_string(),
            name: parts[1].to_string(),
            uid: parts[2].to_string(),
        })
    }
}

impl std::fmt::Display for VmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// Repository-internal uid scheme; not an RFC4122 UUID, just opaque and
/// collision-resistant enough for a single node's state store.
fn random_hex_id() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ── MicroVM spec/status ───────────────────────────────────────────────────────

pub const VCPU_MIN: u32 = 1;
pub const VCPU_MAX: u32 = 32;
pub const MEMORY_MB_MIN: u32 = 1;
pub const MEMORY_MB_MAX: u32 = 65536;

pub const METADATA_IFACE_NAME: &str = "eth0";
pub const METADATA_IFACE_MAC: &str = "AA:FF:00:00:00:01";
pub const METADATA_IFACE_CIDR: &str = "169.254.0.1/16";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Device name as seen inside the guest (e.g. `eth0`).
    pub guest_dev_name: String,
    pub mac: String,
    /// Static `ip/prefix` assignment, if any.
    pub static_ip: Option<String>,
}

impl NetworkInterface {
    /// The synthetic metadata interface prepended to every spec unless the
    /// caller already declared one with the same guest device name.
    pub fn metadata_default() -> Self {
        Self {
            guest_dev_name: METADATA_IFACE_NAME.to_string(),
            mac: METADATA_IFACE_MAC.to_string(),
            static_ip: Some(METADATA_IFACE_CIDR.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroVmSpec {
    pub vcpu: u32,
    pub memory_mb: u32,
    pub kernel_path: String,
    pub rootfs_path: String,
    pub host_net_dev: Option<String>,
    pub guest_mac: Option<String>,
    pub image_ref: Option<String>,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MicroVmSpec {
    /// Validate bounds, fill in the configured default provider, and prepend
    /// the metadata interface. Idempotent — safe to call again on Reconcile.
    pub fn normalize(&mut self, default_provider: &str) -> Result<(), DomainError> {
        if !(VCPU_MIN..=VCPU_MAX).contains(&self.vcpu) {
            return Err(DomainError::InvalidArgument(format!(
                "vcpu {} outside [{},{}]",
                self.vcpu, VCPU_MIN, VCPU_MAX
            )));
        }
        if !(MEMORY_MB_MIN..=MEMORY_MB_MAX).contains(&self.memory_mb) {
            return Err(DomainError::InvalidArgument(format!(
                "memory_mb {} outside [{},{}]",
                self.memory_mb, MEMORY_MB_MIN, MEMORY_MB_MAX
            )));
        }
        if self.provider.is_empty() {
            self.provider = default_provider.to_string();
        }
        let has_metadata_iface = self
            .network_interfaces
            .iter()
            .any(|n| n.guest_dev_name == METADATA_IFACE_NAME);
        if !has_metadata_iface {
            self.network_interfaces.insert(0, NetworkInterface::metadata_default());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmState {
    Pending,
    Running,
    Failed,
    Deleted,
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VmState::Pending => "pending",
            VmState::Running => "running",
            VmState::Failed => "failed",
            VmState::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroVmStatus {
    pub state: VmState,
    pub retry: u32,
}

impl Default for MicroVmStatus {
    fn default() -> Self {
        Self { state: VmState::Pending, retry: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroVm {
    pub id: VmId,
    pub version: u64,
    pub spec: MicroVmSpec,
    pub status: MicroVmStatus,
}

// ── Event envelope ────────────────────────────────────────────────────────────

/// Tagged lifecycle event published on the VM-events topic. `Deleted` is
/// terminal and never enqueued for reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LifecycleEvent {
    Created { id: VmId },
    Updated { id: VmId },
    Deleted { id: VmId },
}

impl LifecycleEvent {
    pub fn vmid(&self) -> &VmId {
        match self {
            LifecycleEvent::Created { id }
            | LifecycleEvent::Updated { id }
            | LifecycleEvent::Deleted { id } => id,
        }
    }
}

// ── GPU partition scheduler types ─────────────────────────────────────────────

pub type WorkloadId = String;
pub type DeviceId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Available,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuDeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    pub mig_enabled: bool,
    pub status: DeviceStatus,
    /// Insertion-ordered sequence of workload ids currently allocated here.
    pub allocations: Vec<WorkloadId>,
}

/// Atomic shape descriptor for a MIG-style partition. The scheduler never
/// re-partitions a profile — it is the unit of allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigProfile {
    pub id: String,
    pub memory_gb: u64,
    pub compute_util: u32,
}

impl MigProfile {
    pub fn memory_bytes(&self) -> u64 {
        self.memory_gb * (1u64 << 30)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Allocated,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationInfo {
    pub workload_id: WorkloadId,
    pub device_id: DeviceId,
    pub profile: MigProfile,
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
    /// `None` means never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

// ── Policy engine types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Permissive,
    Enforce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRules {
    #[serde(default)]
    pub max_latency_ms: f64,
    #[serde(default)]
    pub max_price_per_gb: f64,
    #[serde(default)]
    pub min_reputation_score: f64,
    #[serde(default)]
    pub max_queue_depth: f64,
    #[serde(default)]
    pub max_packet_loss: f64,
    #[serde(default)]
    pub max_jitter_ms: f64,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
}

impl Default for PolicyRules {
    fn default() -> Self {
        Self {
            max_latency_ms: 0.0,
            max_price_per_gb: 0.0,
            min_reputation_score: 0.0,
            max_queue_depth: 0.0,
            max_packet_loss: 0.0,
            max_jitter_ms: 0.0,
            required_capabilities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyScoring {
    #[serde(default)]
    pub latency_weight: f64,
    #[serde(default)]
    pub price_weight: f64,
    #[serde(default)]
    pub reputation_weight: f64,
    #[serde(default)]
    pub queue_weight: f64,
}

impl Default for PolicyScoring {
    fn default() -> Self {
        Self { latency_weight: 1.0, price_weight: 0.0, reputation_weight: 0.0, queue_weight: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub mode: PolicyMode,
    #[serde(default)]
    pub rules: PolicyRules,
    #[serde(default)]
    pub scoring: PolicyScoring,
}

impl Policy {
    /// Bounds and weights must be non-negative. A zero bound in `rules`
    /// means that constraint is disabled, not "always fails."
    pub fn validate(&self) -> Result<(), DomainError> {
        let rules = &self.rules;
        let bounds = [
            ("max_latency_ms", rules.max_latency_ms),
            ("max_price_per_gb", rules.max_price_per_gb),
            ("min_reputation_score", rules.min_reputation_score),
            ("max_queue_depth", rules.max_queue_depth),
            ("max_packet_loss", rules.max_packet_loss),
            ("max_jitter_ms", rules.max_jitter_ms),
        ];
        for (name, v) in bounds {
            if v < 0.0 {
                return Err(DomainError::InvalidConfig(format!("{} must be >= 0, got {}", name, v)));
            }
        }
        let weights = [
            ("latency_weight", self.scoring.latency_weight),
            ("price_weight", self.scoring.price_weight),
            ("reputation_weight", self.scoring.reputation_weight),
            ("queue_weight", self.scoring.queue_weight),
        ];
        for (name, v) in weights {
            if v < 0.0 {
                return Err(DomainError::InvalidConfig(format!("{} must be >= 0, got {}", name, v)));
            }
        }
        Ok(())
    }
}

/// Per cluster-member telemetry snapshot, as supplied by the gossip layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconMetadata {
    pub latency_ms: f64,
    pub price_per_gb: f64,
    /// Stringly-typed on the wire; use [`BeaconMetadata::reputation`] to get
    /// a clamped `[0,1]` value.
    pub reputation_score: String,
    pub queue_depth: f64,
    pub packet_loss: f64,
    pub jitter_ms: f64,
    pub node_capabilities: Vec<String>,
}

impl BeaconMetadata {
    pub fn reputation(&self) -> f64 {
        self.reputation_score.parse::<f64>().unwrap_or(0.0).clamp(0.0, 1.0)
    }
}

/// Membership status of a cluster node, as reported by the gossip layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Alive,
    Suspect,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub node_name: String,
    pub status: MemberStatus,
    pub metadata: Option<BeaconMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vmid_round_trips() {
        let id = VmId { name: "t1".into(), namespace: "default".into(), uid: "abc123".into() };
        let formatted = id.format();
        let parsed = VmId::parse(&formatted).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn vmid_parse_rejects_malformed() {
        assert!(VmId::parse("not-enough-parts").is_err());
        assert!(VmId::parse("a//c").is_err());
        assert!(VmId::parse("a/b/").is_err());
    }

    #[test]
    fn vmid_assign_uid_is_idempotent() {
        let mut id = VmId::new("t1", None);
        assert!(!id.is_assigned());
        id.assign_uid();
        let first = id.uid.clone();
        id.assign_uid();
        assert_eq!(first, id.uid);
    }

    #[test]
    fn spec_normalize_rejects_out_of_bounds_vcpu() {
        let mut spec = sample_spec();
        spec.vcpu = 0;
        assert!(spec.normalize("hv").is_err());
        spec.vcpu = 33;
        assert!(spec.normalize("hv").is_err());
    }

    #[test]
    fn spec_normalize_rejects_out_of_bounds_memory() {
        let mut spec = sample_spec();
        spec.memory_mb = 0;
        assert!(spec.normalize("hv").is_err());
        spec.memory_mb = 65537;
        assert!(spec.normalize("hv").is_err());
    }

    #[test]
    fn spec_normalize_fills_default_provider() {
        let mut spec = sample_spec();
        spec.provider = String::new();
        spec.normalize("firecracker").unwrap();
        assert_eq!(spec.provider, "firecracker");
    }

    #[test]
    fn spec_normalize_prepends_metadata_iface_once() {
        let mut spec = sample_spec();
        spec.normalize("hv").unwrap();
        assert_eq!(spec.network_interfaces.len(), 1);
        assert_eq!(spec.network_interfaces[0].guest_dev_name, METADATA_IFACE_NAME);

        spec.normalize("hv").unwrap();
        assert_eq!(spec.network_interfaces.len(), 1);
    }

    #[test]
    fn policy_validate_rejects_negative_bounds() {
        let mut policy = sample_policy();
        policy.rules.max_latency_ms = -1.0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn policy_validate_rejects_negative_weights() {
        let mut policy = sample_policy();
        policy.scoring.latency_weight = -1.0;
        assert!(policy.validate().is_err());
    }

    fn sample_spec() -> MicroVmSpec {
        MicroVmSpec {
            vcpu: 4,
            memory_mb: 8192,
            kernel_path: "/boot/vmlinux".into(),
            rootfs_path: "/rootfs.ext4".into(),
            host_net_dev: None,
            guest_mac: None,
            image_ref: None,
            provider: "hv".into(),
            network_interfaces: vec![],
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    fn sample_policy() -> Policy {
        Policy {
            name: "default".into(),
            mode: PolicyMode::Enforce,
            rules: PolicyRules::default(),
            scoring: PolicyScoring::default(),
        }
    }
}
