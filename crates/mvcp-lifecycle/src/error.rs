use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("vm not found: {0}")]
    NotFound(String),

    #[error("domain error: {0}")]
    Domain(#[from] mvcp_domain::DomainError),

    #[error("store error: {0}")]
    Store(#[from] mvcp_store::StoreError),

    #[error("provider error: {0}")]
    Provider(#[from] mvcp_provider::DriverError),
}
