use crate::monitoring::domain::BuilderStatus;
use crate::rpc::client::BuilderRpc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Poll every builder for its peers and txpool, all builders in parallel.
///
/// Per-call failures are folded into that builder's status and never abort
/// the pass; the returned map always holds one entry per builder.
pub async fn collect_statuses(
    builders: &HashMap<String, Arc<dyn BuilderRpc>>,
    timeout: Duration,
) -> HashMap<String, BuilderStatus> {
    let mut tasks = Vec::with_capacity(builders.len());
    for (name, rpc) in builders {
        let name = name.clone();
        let rpc = rpc.clone();
        tasks.push(tokio::spawn(async move {
            let status = fetch_status(&name, rpc.as_ref(), timeout).await;
            (name, status)
        }));
    }

    let mut status = HashMap::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok((name, builder_status)) => {
                status.insert(name, builder_status);
            }
            Err(err) => {
                error!(error = %err, "Status collection task panicked");
            }
        }
    }
    status
}

async fn fetch_status(name: &str, rpc: &dyn BuilderRpc, timeout: Duration) -> BuilderStatus {
    let mut status = BuilderStatus::default();

    match rpc.get_peers(timeout).await {
        Ok(peers) => status.peers = Some(peers),
        Err(err) => {
            error!(error = %err, builder = %name, "Failed to get builder's peers");
            status.errors.push(err);
        }
    }

    match rpc.get_txpool(timeout).await {
        Ok(txpool) => status.txpool = Some(txpool.normalize()),
        Err(err) => {
            error!(error = %err, builder = %name, "Failed to get builder's txpool");
            status.errors.push(err);
        }
    }

    status
}
