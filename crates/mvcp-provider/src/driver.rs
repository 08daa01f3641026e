use async_trait::async_trait;
use mvcp_domain::MicroVmSpec;
use serde_json::Value;

use crate::error::DriverError;

/// Opaque runtime snapshot a provider returns for a running microVM — CPU/mem
/// usage, hypervisor-specific identifiers, whatever the backend exposes.
pub type RuntimeData = Value;

/// Closed capability set exposed by a hypervisor backend. Unknown provider
/// names are rejected at [`crate::registry::ProviderRegistry::for_name`] call
/// time, not deep inside a reconcile loop.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Start (or idempotently re-assert) the microVM described by `spec`.
    /// Implementations must be idempotent for the same `(VMID, Version)` so
    /// reconcile retries never duplicate side effects.
    async fn start(&self, spec: &MicroVmSpec) -> Result<(), DriverError>;

    /// Stop the microVM. Must succeed if the VM is already stopped.
    async fn stop(&self, spec: &MicroVmSpec) -> Result<(), DriverError>;

    /// Read-only runtime snapshot; does not mutate provider state.
    async fn runtime_data(&self, spec: &MicroVmSpec) -> Result<RuntimeData, DriverError>;
}
