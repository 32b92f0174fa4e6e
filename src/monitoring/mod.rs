// Monitoring core - per-pass collection, merge, and divergence analysis

pub mod collector;
pub mod domain;
pub mod peers;
pub mod scheduler;
pub mod txpool;

pub use domain::{BuilderStatus, MergedPool, PeerClass};
pub use scheduler::Monitor;
