pub mod engine;
pub mod error;
pub mod reload;
pub mod scoring;

pub use engine::{PlacementRequest, PolicyEngine};
pub use error::PolicyError;
pub use reload::spawn_hot_reload;
