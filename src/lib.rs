pub mod infrastructure;
pub mod monitoring;
pub mod rpc;
pub mod shared;

// Re-export commonly used types
pub use shared::error::MonitorError;
pub use shared::types::Address;

// Re-export result type
pub type Result<T> = anyhow::Result<T>;
