use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Node-local daemon configuration, loaded once at startup from environment
/// variables. Every field has a documented default so the daemon runs with
/// nothing set beyond `MVCP_STATE_ROOT_DIR`.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub state_root_dir: PathBuf,
    pub maximum_retry: u32,
    pub default_provider: String,
    pub resync_period: Duration,
    pub delete_timeout: Duration,
    pub grpc_endpoint: Option<SocketAddr>,
    pub http_endpoint: Option<SocketAddr>,
    pub disable_api: bool,
    pub disable_reconcile: bool,
    pub basic_auth_token: Option<String>,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    /// Size of the local GPU inventory to seed at startup. Not part of the
    /// documented environment surface; a node-local default for standing up
    /// the scheduler without a real device discovery mechanism.
    pub gpu_device_count: u32,
    pub gpu_device_memory_gb: u64,
    /// Policy file to load at startup and hot-reload from. `None` leaves
    /// the permissive default policy in place with no watcher running.
    pub policy_path: Option<PathBuf>,
    pub policy_reload_period: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            state_root_dir: env_path("MVCP_STATE_ROOT_DIR", PathBuf::from("/var/lib/mvcp")),
            maximum_retry: env_parse("MVCP_MAXIMUM_RETRY", 3)?,
            default_provider: env_string("MVCP_DEFAULT_PROVIDER", "local"),
            resync_period: Duration::from_secs(env_parse("MVCP_RESYNC_PERIOD_SECS", 30)?),
            delete_timeout: Duration::from_secs(env_parse("MVCP_DELETE_TIMEOUT_SECS", 60)?),
            grpc_endpoint: env_socket_addr("MVCP_GRPC_ENDPOINT")?,
            http_endpoint: Some(
                env_socket_addr("MVCP_HTTP_ENDPOINT")?
                    .unwrap_or_else(|| "0.0.0.0:8080".parse().expect("valid default addr")),
            ),
            disable_api: env_bool("MVCP_DISABLE_API", false)?,
            disable_reconcile: env_bool("MVCP_DISABLE_RECONCILE", false)?,
            basic_auth_token: std::env::var("MVCP_BASIC_AUTH_TOKEN").ok(),
            tls_cert_path: std::env::var("MVCP_TLS_CERT_PATH").ok().map(PathBuf::from),
            tls_key_path: std::env::var("MVCP_TLS_KEY_PATH").ok().map(PathBuf::from),
            gpu_device_count: env_parse("MVCP_GPU_DEVICE_COUNT", 1)?,
            gpu_device_memory_gb: env_parse("MVCP_GPU_DEVICE_MEMORY_GB", 40)?,
            policy_path: std::env::var("MVCP_POLICY_PATH").ok().map(PathBuf::from),
            policy_reload_period: Duration::from_secs(env_parse("MVCP_POLICY_RELOAD_PERIOD_SECS", 10)?),
        })
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    std::env::var(name).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v.parse::<T>().map_err(|_| ConfigError::InvalidEnvVar {
            name: name.to_string(),
            value: v,
        }),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidEnvVar { name: name.to_string(), value: v }),
        },
        Err(_) => Ok(default),
    }
}

fn env_socket_addr(name: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v
            .parse::<SocketAddr>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar { name: name.to_string(), value: v }),
        Err(_) => Ok(None),
    }
}
