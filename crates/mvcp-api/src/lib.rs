pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use app::build_app;
pub use mvcp_domain::Metrics;
pub use state::AppState;
