use crate::infrastructure::metrics::{
    MetricsRecorder, TXPOOL_MISSING_TX_COUNT, TXPOOL_NONCE_GAP_LENGTH,
};
use crate::monitoring::domain::{BuilderStatus, MergedPool};
use crate::rpc::client::BuilderRpc;
use crate::shared::types::{nonce_key, Address};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Merge every builder's txpool into the canonical per-pass view, then
/// inspect each builder's pool against it.
///
/// Runs only after collection is complete: no builder's snapshot is folded
/// in once inspection has begun.
pub async fn analyse_txpool(
    status: &HashMap<String, BuilderStatus>,
    builders: &HashMap<String, Arc<dyn BuilderRpc>>,
    timeout: Duration,
    recorder: &dyn MetricsRecorder,
) {
    let merged = MergedPool::merge(status, recorder);
    debug!(size = merged.by_hash.len(), "Merged the txpools");

    for (builder, sts) in status {
        let Some(rpc) = builders.get(builder) else {
            continue;
        };
        inspect_builder(builder, sts, rpc.as_ref(), &merged, timeout, recorder).await;
    }
}

/// Walk the merged nonce window of every known sender and count the
/// transactions this builder lacks, plus the cumulative length of closed
/// nonce gaps.
async fn inspect_builder(
    builder: &str,
    sts: &BuilderStatus,
    rpc: &dyn BuilderRpc,
    merged: &MergedPool,
    timeout: Duration,
    recorder: &dyn MetricsRecorder,
) {
    let Some(txpool) = &sts.txpool else {
        return;
    };

    debug!(
        builder = %builder,
        pending = txpool.pending.len(),
        queued = txpool.queued.len(),
        "Inspecting builder's txpool..."
    );

    let mut missing_tx_count: i64 = 0;
    let mut nonce_gaps_length: u64 = 0;

    for addr in &merged.addresses {
        let pending = txpool.pending.get(addr);
        let queued = txpool.queued.get(addr);

        // an address whose every observation failed nonce decoding has no
        // merged bounds and therefore no window to walk
        let (Some(&addr_min), Some(&addr_max)) =
            (merged.nonce_min.get(addr), merged.nonce_max.get(addr))
        else {
            continue;
        };

        let parsed: Address = match addr.parse() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    error = %err,
                    addr = %addr,
                    builder = %builder,
                    "Failed to parse a tx from address"
                );
                continue;
            }
        };

        let nonce_pending = match rpc.pending_nonce_at(&parsed, timeout).await {
            Ok(nonce) => nonce,
            Err(err) => {
                warn!(
                    error = %err,
                    addr = %addr,
                    builder = %builder,
                    "Failed to get pending nonce"
                );
                continue;
            }
        };

        let lo = addr_min.max(nonce_pending);
        let hi = addr_max;
        if lo > hi {
            info!(
                builder = %builder,
                from = %addr,
                nonce = nonce_pending,
                "No un-included transactions from address, skipping"
            );
            continue;
        }

        info!(
            builder = %builder,
            from = %addr,
            nonce_min = lo,
            nonce_max = hi,
            "Iterating through nonces"
        );

        let mut gap_start: Option<u64> = None;
        for nonce in lo..=hi {
            let key = nonce_key(nonce);
            let is_pending = pending.is_some_and(|m| m.contains_key(&key));
            let is_queued = queued.is_some_and(|m| m.contains_key(&key));

            match (is_pending, is_queued) {
                (true, true) => {
                    // present either way; does not open or close a gap
                    warn!(
                        builder = %builder,
                        from = %addr,
                        nonce = nonce,
                        "Same tx is both pending and queued (should never be the case)"
                    );
                }
                (false, false) => {
                    if gap_start.is_none() {
                        gap_start = Some(nonce);
                    }
                    missing_tx_count += 1;

                    match merged.tx_at(addr, nonce) {
                        None => {
                            warn!(
                                builder = %builder,
                                from = %addr,
                                nonce = %key,
                                "Tx is not known to any builder"
                            );
                        }
                        Some(tx) => {
                            warn!(
                                builder = %builder,
                                from = %addr,
                                nonce = %key,
                                tx_hash = %tx.hash,
                                "Tx is not known to the builder"
                            );
                        }
                    }
                }
                _ => {
                    if let Some(start) = gap_start.take() {
                        let length = nonce - start;
                        nonce_gaps_length += length;
                        warn!(
                            builder = %builder,
                            from = %addr,
                            nonce_gap_start = start,
                            nonce_gap_end = nonce - 1,
                            nonce_gap_length = length,
                            "Nonce gap detected"
                        );
                    }
                }
            }
        }
        // a gap still open at the top of the window is not counted; only a
        // re-appearing higher nonce closes it
    }

    recorder.record_gauge(
        TXPOOL_NONCE_GAP_LENGTH,
        nonce_gaps_length as i64,
        &[("builder", builder.to_string())],
    );
    recorder.record_gauge(
        TXPOOL_MISSING_TX_COUNT,
        missing_tx_count,
        &[("builder", builder.to_string())],
    );
}
