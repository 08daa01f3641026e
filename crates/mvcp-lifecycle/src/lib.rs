pub mod error;
pub mod lifecycle;
pub mod processor;
pub mod queue;

pub use error::LifecycleError;
pub use lifecycle::LifecycleService;
pub use processor::VmProcessor;
pub use queue::WorkQueue;
