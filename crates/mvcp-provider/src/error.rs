use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("provider start failed: {0}")]
    StartFailed(String),

    #[error("provider stop failed: {0}")]
    StopFailed(String),

    #[error("internal provider error: {0}")]
    Internal(String),

    #[error("no provider registered with name '{0}'")]
    ProviderNotConfigured(String),
}
