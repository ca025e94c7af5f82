pub mod shutdown;

pub use crate::infrastructure::logging::init_tracing;
pub use shutdown::ShutdownManager;
