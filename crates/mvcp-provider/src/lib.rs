pub mod driver;
pub mod error;
pub mod local;
pub mod registry;

pub use driver::{Provider, RuntimeData};
pub use error::DriverError;
pub use local::LocalProvider;
pub use registry::ProviderRegistry;
