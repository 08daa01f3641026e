use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("malformed vmid: {0}")]
    MalformedVMID(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
