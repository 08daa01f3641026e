use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no device has capacity for the requested profile")]
    NoSuitableDevice,

    #[error("workload '{0}' is already allocated")]
    DuplicateWorkload(String),

    #[error("backend partition creation failed: {0}")]
    BackendPartitionFailed(String),

    #[error("unknown workload: {0}")]
    UnknownWorkload(String),
}
