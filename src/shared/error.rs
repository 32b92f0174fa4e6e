use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid builder address: {0}")]
    InvalidAddress(String),

    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<MonitorError>),
}

impl From<config::ConfigError> for MonitorError {
    fn from(err: config::ConfigError) -> Self {
        MonitorError::Config(err.to_string())
    }
}

/// Collapse sibling errors into a single error carrying all messages.
///
/// Zero errors flatten to `None`, a single error passes through untouched,
/// anything more becomes `MonitorError::Multiple`.
pub fn flatten_errors(mut errs: Vec<MonitorError>) -> Option<MonitorError> {
    match errs.len() {
        0 => None,
        1 => Some(errs.remove(0)),
        _ => Some(MonitorError::Multiple(errs)),
    }
}
