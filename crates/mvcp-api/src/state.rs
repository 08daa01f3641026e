use std::sync::Arc;

use mvcp_domain::Metrics;
use mvcp_gpu::GpuScheduler;
use mvcp_lifecycle::LifecycleService;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<LifecycleService>,
    pub gpu: Arc<GpuScheduler>,
    pub metrics: Arc<Metrics>,
    /// `None` disables the bearer-token check entirely.
    pub auth_token: Option<Arc<String>>,
}
