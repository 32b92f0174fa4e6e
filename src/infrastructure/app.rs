use crate::infrastructure::config::Config;
use crate::infrastructure::metrics::{install_prometheus, PrometheusRecorder};
use crate::infrastructure::server;
use crate::infrastructure::shutdown::ShutdownSignal;
use crate::monitoring::scheduler::Monitor;
use crate::rpc::client::{BuilderRpc, HttpRpc};
use crate::shared::error::{flatten_errors, MonitorError};
use crate::Result;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Ties the pieces together: builder clients, the metrics exporter, the
/// healthcheck server, and the monitoring loop.
pub struct App {
    config: Config,
    builders: HashMap<String, Arc<dyn BuilderRpc>>,
    peer_labels: HashMap<IpAddr, String>,
    shutdown: ShutdownSignal,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let endpoints = config.monitor.builder_endpoints()?;
        let mut builders: HashMap<String, Arc<dyn BuilderRpc>> =
            HashMap::with_capacity(endpoints.len());
        for (name, url) in endpoints {
            builders.insert(name, Arc::new(HttpRpc::new(url)?));
        }

        let peer_labels = config.monitor.peer_labels()?;

        Ok(Self {
            config,
            builders,
            peer_labels,
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Run until a stop signal or an internal failure, then shut down
    /// gracefully. All internal failures observed along the way are
    /// aggregated into the returned error.
    pub async fn run(self) -> Result<()> {
        let prometheus = install_prometheus()?;
        let listen_address: SocketAddr = self
            .config
            .server
            .listen_address
            .parse()
            .map_err(|_| MonitorError::Config(self.config.server.listen_address.clone()))?;

        let (failure_tx, mut failure_rx) = mpsc::channel::<MonitorError>(8);

        let server_handle = {
            let shutdown = self.shutdown.clone();
            let failure_tx = failure_tx.clone();
            tokio::spawn(async move {
                if let Err(err) = server::serve(listen_address, prometheus, shutdown).await {
                    let _ = failure_tx.send(err).await;
                }
            })
        };

        let monitor = Arc::new(Monitor::new(
            self.builders.clone(),
            self.peer_labels.clone(),
            self.config.monitor.interval,
            self.config.monitor.timeout,
            Arc::new(PrometheusRecorder),
            self.shutdown.clone(),
        ));
        let monitor_handle = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run().await })
        };

        let mut interrupt = signal(SignalKind::interrupt())
            .map_err(|e| MonitorError::Server(format!("failed to install signal handler: {}", e)))?;
        let mut terminate = signal(SignalKind::terminate())
            .map_err(|e| MonitorError::Server(format!("failed to install signal handler: {}", e)))?;

        let mut errs: Vec<MonitorError> = Vec::new();
        tokio::select! {
            _ = interrupt.recv() => {
                info!("Stop signal received; shutting down...");
            }
            _ = terminate.recv() => {
                info!("Stop signal received; shutting down...");
            }
            Some(err) = failure_rx.recv() => {
                error!(error = %err, "Internal failure; shutting down...");
                errs.push(err);
            }
        }

        self.shutdown.shutdown();

        let _ = monitor_handle.await;
        let _ = server_handle.await;
        monitor.close().await;

        // pick up failures that raced with the shutdown
        while let Ok(err) = failure_rx.try_recv() {
            error!(error = %err, "Extra internal failure");
            errs.push(err);
        }

        match flatten_errors(errs) {
            None => Ok(()),
            Some(err) => Err(err.into()),
        }
    }

}
