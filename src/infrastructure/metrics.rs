use metrics::Label;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Process-wide namespace prefixed to every exported metric name.
pub const METRICS_NAMESPACE: &str = "builder_monitor";

pub const PEERS_COUNT: &str = "peers_count";
pub const TXPOOL_DUPLICATE_NONCE_COUNT: &str = "txpool_duplicate_nonce_count";
pub const TXPOOL_NONCE_GAP_LENGTH: &str = "txpool_nonce_gap_length";
pub const TXPOOL_MISSING_TX_COUNT: &str = "txpool_missing_tx_count";

/// Sink the monitoring core records through. Implementations must be
/// thread-safe; the core never reads back what it recorded.
pub trait MetricsRecorder: Send + Sync {
    fn record_gauge(&self, name: &'static str, value: i64, labels: &[(&'static str, String)]);

    fn add_counter(&self, name: &'static str, delta: i64, labels: &[(&'static str, String)]);
}

/// Production recorder backed by the `metrics` registry, exported in
/// Prometheus text format through the HTTP server.
pub struct PrometheusRecorder;

/// Install the global Prometheus recorder and register instrument
/// descriptions. The returned handle renders the scrape payload.
pub fn install_prometheus() -> Result<PrometheusHandle, crate::shared::error::MonitorError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| crate::shared::error::MonitorError::Server(format!(
            "failed to install Prometheus recorder: {}",
            e
        )))?;

    metrics::describe_gauge!(
        namespaced(PEERS_COUNT),
        "count of connected peers"
    );
    metrics::describe_counter!(
        namespaced(TXPOOL_DUPLICATE_NONCE_COUNT),
        "count of transactions seen that have same address and nonce but different hashes"
    );
    metrics::describe_gauge!(
        namespaced(TXPOOL_NONCE_GAP_LENGTH),
        "cumulative length of nonce gaps"
    );
    metrics::describe_gauge!(
        namespaced(TXPOOL_MISSING_TX_COUNT),
        "count of missing transactions in the txpool"
    );

    Ok(handle)
}

fn namespaced(name: &str) -> String {
    format!("{}_{}", METRICS_NAMESPACE, name)
}

fn to_labels(labels: &[(&'static str, String)]) -> Vec<Label> {
    labels
        .iter()
        .map(|(key, value)| Label::new(*key, value.clone()))
        .collect()
}

impl MetricsRecorder for PrometheusRecorder {
    fn record_gauge(&self, name: &'static str, value: i64, labels: &[(&'static str, String)]) {
        metrics::gauge!(namespaced(name), to_labels(labels)).set(value as f64);
    }

    fn add_counter(&self, name: &'static str, delta: i64, labels: &[(&'static str, String)]) {
        metrics::counter!(namespaced(name), to_labels(labels)).increment(delta.max(0) as u64);
    }
}

/// Recorder that keeps observations in memory, for tests.
#[derive(Default)]
pub struct InMemoryRecorder {
    gauges: Mutex<BTreeMap<String, i64>>,
    counters: Mutex<BTreeMap<String, i64>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<i64> {
        self.gauges.lock().unwrap().get(&series_key(name, labels)).copied()
    }

    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> i64 {
        self.counters
            .lock()
            .unwrap()
            .get(&series_key(name, labels))
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct gauge series recorded, across all names.
    pub fn gauge_series_count(&self) -> usize {
        self.gauges.lock().unwrap().len()
    }
}

fn series_key(name: &str, labels: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = labels.to_vec();
    sorted.sort();
    let rendered: Vec<String> = sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    format!("{}{{{}}}", name, rendered.join(","))
}

impl MetricsRecorder for InMemoryRecorder {
    fn record_gauge(&self, name: &'static str, value: i64, labels: &[(&'static str, String)]) {
        let borrowed: Vec<(&str, &str)> =
            labels.iter().map(|(key, value)| (*key, value.as_str())).collect();
        self.gauges
            .lock()
            .unwrap()
            .insert(series_key(name, &borrowed), value);
    }

    fn add_counter(&self, name: &'static str, delta: i64, labels: &[(&'static str, String)]) {
        let borrowed: Vec<(&str, &str)> =
            labels.iter().map(|(key, value)| (*key, value.as_str())).collect();
        *self
            .counters
            .lock()
            .unwrap()
            .entry(series_key(name, &borrowed))
            .or_insert(0) += delta;
    }
}
