use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("no node satisfies the policy's hard constraints")]
    NoViablePlacement,

    #[error("policy config error: {0}")]
    Config(#[from] mvcp_config::ConfigError),
}
