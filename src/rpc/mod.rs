// Builder RPC - typed admin/txpool queries over JSON-RPC

pub mod client;
pub mod types;

pub use client::{BuilderRpc, HttpRpc};
pub use types::{PeerEntry, TxSummary, TxpoolContent};
