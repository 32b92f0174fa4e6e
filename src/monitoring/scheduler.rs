use crate::infrastructure::metrics::MetricsRecorder;
use crate::infrastructure::shutdown::ShutdownSignal;
use crate::monitoring::collector::collect_statuses;
use crate::monitoring::peers::analyse_peers;
use crate::monitoring::txpool::analyse_txpool;
use crate::rpc::client::BuilderRpc;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Fixed-interval driver of the monitoring pass.
///
/// Passes never overlap: each runs to completion inside its own tick, and a
/// tick that fires while a pass is still running is delayed rather than
/// burst. Shutdown stops the ticker; an in-flight pass finishes first.
pub struct Monitor {
    builders: HashMap<String, Arc<dyn BuilderRpc>>,
    peer_labels: HashMap<IpAddr, String>,
    interval: Duration,
    timeout: Duration,
    recorder: Arc<dyn MetricsRecorder>,
    shutdown: ShutdownSignal,
}

impl Monitor {
    pub fn new(
        builders: HashMap<String, Arc<dyn BuilderRpc>>,
        peer_labels: HashMap<IpAddr, String>,
        interval: Duration,
        timeout: Duration,
        recorder: Arc<dyn MetricsRecorder>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            builders,
            peer_labels,
            interval,
            timeout,
            recorder,
            shutdown,
        }
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            builders = self.builders.len(),
            interval = %humantime::format_duration(self.interval),
            "Monitoring loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.pass().await;
                }
                _ = self.shutdown.wait() => {
                    info!("Monitoring loop stopped");
                    break;
                }
            }
        }
    }

    /// One end-to-end pass: collect, analyse peers, analyse txpools.
    pub async fn pass(&self) {
        debug!("Running new monitoring pass...");

        let status = collect_statuses(&self.builders, self.timeout).await;

        analyse_peers(&status, &self.peer_labels, self.recorder.as_ref());
        analyse_txpool(
            &status,
            &self.builders,
            self.timeout,
            self.recorder.as_ref(),
        )
        .await;
    }

    /// Close every builder client. Safe to call more than once.
    pub async fn close(&self) {
        for rpc in self.builders.values() {
            rpc.close().await;
        }
    }
}
