use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use mvcp_gpu::GpuScheduler;
use mvcp_lifecycle::LifecycleService;
use tower_http::trace::TraceLayer;

use mvcp_domain::Metrics;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::AppState;

pub fn build_app(
    lifecycle: Arc<LifecycleService>,
    gpu: Arc<GpuScheduler>,
    metrics: Arc<Metrics>,
    auth_token: Option<Arc<String>>,
) -> Router {
    let state = AppState { lifecycle, gpu, metrics, auth_token };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/vms", post(handlers::create_vm).get(handlers::list_vms))
        .route("/vms/stream", get(handlers::stream_vms))
        .route("/vms/:namespace/:name/:uid", get(handlers::get_vm).delete(handlers::delete_vm))
        .route("/gpu/allocate", post(handlers::allocate_gpu))
        .route("/gpu/deallocate/:workload_id", delete(handlers::deallocate_gpu))
        .route("/gpu/allocation/:workload_id", get(handlers::get_gpu_allocation))
        .route("/gpu/allocations", get(handlers::get_gpu_allocations))
        .route("/gpu/devices", get(handlers::get_gpu_devices))
        .route("/gpu/devices/available", get(handlers::get_gpu_devices_available))
        .route("/gpu/devices/utilization", get(handlers::get_gpu_devices_utilization))
        .route("/gpu/devices/status", get(handlers::get_gpu_devices_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use mvcp_domain::{MicroVmSpec, MigProfile};
    use mvcp_provider::{LocalProvider, ProviderRegistry};
    use mvcp_store::{InMemoryEventBus, InMemoryRepository};
    use tower::util::ServiceExt;

    const TEST_TOKEN: &str = "test-token";

    fn test_app() -> Router {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(LocalProvider::new()));
        let metrics = Arc::new(Metrics::new());
        let lifecycle = Arc::new(LifecycleService::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(InMemoryEventBus::new()),
            Arc::new(registry),
            "local",
            3,
            metrics.clone(),
        ));
        let gpu = Arc::new(GpuScheduler::with_noop_backend(vec![mvcp_domain::GpuDeviceInfo {
            id: "gpu0".into(),
            name: "gpu-0".into(),
            total_memory_bytes: 40 * (1u64 << 30),
            available_memory_bytes: 40 * (1u64 << 30),
            mig_enabled: true,
            status: mvcp_domain::DeviceStatus::Available,
            allocations: vec![],
        }]));
        build_app(lifecycle, gpu, metrics, Some(Arc::new(TEST_TOKEN.to_string())))
    }

    fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {}", TEST_TOKEN))
    }

    fn sample_spec() -> MicroVmSpec {
        MicroVmSpec {
            vcpu: 2,
            memory_mb: 512,
            kernel_path: "/boot/vmlinux".into(),
            rootfs_path: "/rootfs.ext4".into(),
            host_net_dev: None,
            guest_mac: None,
            image_ref: None,
            provider: "local".into(),
            network_interfaces: vec![],
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app();
        let resp =
            app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_returns_200_when_authed() {
        let app = test_app();
        let resp =
            app.oneshot(authed(Request::builder().uri("/health")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_returns_200() {
        let app = test_app();
        let resp =
            app.oneshot(authed(Request::builder().uri("/metrics")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_then_get_vm() {
        let app = test_app();
        let body = serde_json::json!({ "name": "web", "spec": sample_spec() });
        let resp = app
            .clone()
            .oneshot(
                authed(Request::builder().method(Method::POST).uri("/vms").header("content-type", "application/json"))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(authed(Request::builder().uri("/vms")).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gpu_allocation_exhaustion_then_recovery_over_http() {
        let app = test_app();
        let alloc_body = |workload: &str, gb: u64| {
            serde_json::json!({ "workload_id": workload, "profile": { "id": format!("1g.{gb}gb"), "memory_gb": gb, "compute_util": 10 } })
        };

        let resp = app
            .clone()
            .oneshot(
                authed(
                    Request::builder().method(Method::POST).uri("/gpu/allocate").header("content-type", "application/json"),
                )
                .body(Body::from(alloc_body("w1", 24).to_string()))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(
                authed(
                    Request::builder().method(Method::POST).uri("/gpu/allocate").header("content-type", "application/json"),
                )
                .body(Body::from(alloc_body("w2", 20).to_string()))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = app
            .oneshot(authed(Request::builder().method(Method::DELETE).uri("/gpu/deallocate/w1")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let _ = MigProfile { id: "x".into(), memory_gb: 1, compute_util: 1 };
    }

    #[tokio::test]
    async fn gpu_allocate_missing_workload_id_returns_400() {
        let app = test_app();
        let body = serde_json::json!({ "workload_id": "", "profile": { "id": "p", "memory_gb": 1, "compute_util": 1 } });
        let resp = app
            .oneshot(
                authed(
                    Request::builder().method(Method::POST).uri("/gpu/allocate").header("content-type", "application/json"),
                )
                .body(Body::from(body.to_string()))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn gpu_deallocate_unknown_workload_returns_404() {
        let app = test_app();
        let resp = app
            .oneshot(authed(Request::builder().method(Method::DELETE).uri("/gpu/deallocate/nope")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn gpu_devices_available_and_status() {
        let app = test_app();
        let resp = app
            .clone()
            .oneshot(authed(Request::builder().uri("/gpu/devices")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(authed(Request::builder().uri("/gpu/devices/status")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(authed(Request::builder().uri("/gpu/devices/utilization")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
