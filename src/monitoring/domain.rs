use crate::infrastructure::metrics::{MetricsRecorder, TXPOOL_DUPLICATE_NONCE_COUNT};
use crate::rpc::types::{PeerEntry, TxSummary, TxpoolContent};
use crate::shared::error::MonitorError;
use crate::shared::types::parse_nonce;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use tracing::warn;

/// What one builder answered during a pass. `peers` and `txpool` are
/// independently optional: failure of one sub-query must not suppress the
/// other.
#[derive(Debug, Default)]
pub struct BuilderStatus {
    pub peers: Option<Vec<PeerEntry>>,
    pub txpool: Option<TxpoolContent>,
    pub errors: Vec<MonitorError>,
}

/// Reachability class of a peer's remote IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerClass {
    Loopback,
    Internal,
    External,
}

impl PeerClass {
    pub fn label(self) -> &'static str {
        match self {
            PeerClass::Loopback => "loopback",
            PeerClass::Internal => "internal",
            PeerClass::External => "external",
        }
    }

    pub fn of(ip: IpAddr) -> Self {
        if ip.is_loopback() {
            PeerClass::Loopback
        } else if is_private(ip) {
            PeerClass::Internal
        } else {
            PeerClass::External
        }
    }
}

// RFC 1918 / link-local for v4, fc00::/7 / fe80::/10 for v6.
fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            (head & 0xfe00) == 0xfc00 || (head & 0xffc0) == 0xfe80
        }
    }
}

/// The canonical cross-builder view of the txpool, rebuilt every pass from
/// every builder's `pending` and `queued` maps.
#[derive(Debug, Default)]
pub struct MergedPool {
    /// First observation of every transaction hash.
    pub by_hash: HashMap<String, TxSummary>,
    /// First observation per `(address, nonce)`; later conflicting hashes
    /// are counted, not stored.
    pub by_addr_nonce: HashMap<String, HashMap<u64, TxSummary>>,
    pub nonce_min: HashMap<String, u64>,
    pub nonce_max: HashMap<String, u64>,
    pub addresses: HashSet<String>,
}

impl MergedPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold every builder's txpool snapshot into the merged view.
    pub fn merge(
        status: &HashMap<String, BuilderStatus>,
        recorder: &dyn MetricsRecorder,
    ) -> Self {
        let mut pool = MergedPool::new();
        for (builder, sts) in status {
            let Some(txpool) = &sts.txpool else {
                continue;
            };
            for by_nonce in txpool.pending.values() {
                for tx in by_nonce.values() {
                    pool.observe(tx, builder, recorder);
                }
            }
            for by_nonce in txpool.queued.values() {
                for tx in by_nonce.values() {
                    pool.observe(tx, builder, recorder);
                }
            }
        }
        pool
    }

    /// Record a single observed transaction.
    ///
    /// The address and hash register before the nonce decodes so that a
    /// malformed nonce still leaves a trace of the sender; the nonce index
    /// and bounds only advance for decodable entries. A conflicting hash at
    /// a known `(address, nonce)` increments the duplicate counter once per
    /// additional distinct hash, with the first observation kept.
    pub fn observe(&mut self, tx: &TxSummary, builder: &str, recorder: &dyn MetricsRecorder) {
        self.addresses.insert(tx.from.clone());

        let hash_is_new = !self.by_hash.contains_key(&tx.hash);
        if hash_is_new {
            self.by_hash.insert(tx.hash.clone(), tx.clone());
        }

        let nonce = match parse_nonce(&tx.nonce) {
            Ok(nonce) => nonce,
            Err(err) => {
                warn!(
                    error = %err,
                    nonce = %tx.nonce,
                    builder = %builder,
                    "Failed to parse nonce from hex into uint"
                );
                return;
            }
        };

        let by_nonce = self.by_addr_nonce.entry(tx.from.clone()).or_default();
        match by_nonce.get(&nonce) {
            None => {
                by_nonce.insert(nonce, tx.clone());
            }
            Some(known) if known.hash != tx.hash => {
                warn!(
                    from = %tx.from,
                    known_tx_hash = %known.hash,
                    other_tx_hash = %tx.hash,
                    builder = %builder,
                    "Multiple tx from same address and nonce"
                );
                if hash_is_new {
                    recorder.add_counter(
                        TXPOOL_DUPLICATE_NONCE_COUNT,
                        1,
                        &[("from", tx.from.clone())],
                    );
                }
                return;
            }
            Some(_) => {}
        }

        let min = self.nonce_min.entry(tx.from.clone()).or_insert(nonce);
        *min = (*min).min(nonce);
        let max = self.nonce_max.entry(tx.from.clone()).or_insert(nonce);
        *max = (*max).max(nonce);
    }

    /// The merged transaction at `(addr, nonce)`, if any builder reported one.
    pub fn tx_at(&self, addr: &str, nonce: u64) -> Option<&TxSummary> {
        self.by_addr_nonce.get(addr).and_then(|m| m.get(&nonce))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::metrics::InMemoryRecorder;

    fn tx(from: &str, nonce: &str, hash: &str) -> TxSummary {
        TxSummary {
            from: from.to_string(),
            nonce: nonce.to_string(),
            hash: hash.to_string(),
        }
    }

    #[test]
    fn test_observe_tracks_bounds() {
        let recorder = InMemoryRecorder::new();
        let mut pool = MergedPool::new();

        pool.observe(&tx("0xabc", "0x7", "0x11"), "alpha", &recorder);
        pool.observe(&tx("0xabc", "0x5", "0x22"), "alpha", &recorder);
        pool.observe(&tx("0xabc", "0x6", "0x33"), "beta", &recorder);

        assert_eq!(pool.nonce_min["0xabc"], 5);
        assert_eq!(pool.nonce_max["0xabc"], 7);
        assert_eq!(pool.addresses.len(), 1);
        assert_eq!(pool.by_addr_nonce["0xabc"].len(), 3);

        // bounds always refer to stored entries
        assert!(pool.tx_at("0xabc", 5).is_some());
        assert!(pool.tx_at("0xabc", 7).is_some());
    }

    #[test]
    fn test_first_seen_wins_on_duplicate_nonce() {
        let recorder = InMemoryRecorder::new();
        let mut pool = MergedPool::new();

        pool.observe(&tx("0xabc", "0x5", "0x11"), "alpha", &recorder);
        pool.observe(&tx("0xabc", "0x5", "0x22"), "beta", &recorder);

        assert_eq!(pool.tx_at("0xabc", 5).unwrap().hash, "0x11");
        assert_eq!(
            recorder.counter(TXPOOL_DUPLICATE_NONCE_COUNT, &[("from", "0xabc")]),
            1
        );
    }

    #[test]
    fn test_duplicate_counted_once_per_distinct_hash() {
        let recorder = InMemoryRecorder::new();
        let mut pool = MergedPool::new();

        pool.observe(&tx("0xabc", "0x5", "0x11"), "alpha", &recorder);
        pool.observe(&tx("0xabc", "0x5", "0x22"), "beta", &recorder);
        // a third builder re-reporting the same losing hash is not a new collision
        pool.observe(&tx("0xabc", "0x5", "0x22"), "gamma", &recorder);
        // but a third distinct hash is
        pool.observe(&tx("0xabc", "0x5", "0x33"), "gamma", &recorder);

        assert_eq!(
            recorder.counter(TXPOOL_DUPLICATE_NONCE_COUNT, &[("from", "0xabc")]),
            2
        );
    }

    #[test]
    fn test_same_hash_reobservation_is_silent() {
        let recorder = InMemoryRecorder::new();
        let mut pool = MergedPool::new();

        pool.observe(&tx("0xabc", "0x5", "0x11"), "alpha", &recorder);
        pool.observe(&tx("0xabc", "0x5", "0x11"), "beta", &recorder);

        assert_eq!(
            recorder.counter(TXPOOL_DUPLICATE_NONCE_COUNT, &[("from", "0xabc")]),
            0
        );
        assert_eq!(pool.by_hash.len(), 1);
    }

    #[test]
    fn test_unparseable_nonce_is_skipped() {
        let recorder = InMemoryRecorder::new();
        let mut pool = MergedPool::new();

        pool.observe(&tx("0xabc", "0xzz", "0x11"), "alpha", &recorder);

        // the sender and hash still register, but no nonce index exists
        assert!(pool.addresses.contains("0xabc"));
        assert!(pool.by_hash.contains_key("0x11"));
        assert!(pool.by_addr_nonce.get("0xabc").is_none());
        assert!(pool.nonce_min.get("0xabc").is_none());
    }

    #[test]
    fn test_addresses_match_nonce_index_for_decodable_input() {
        let recorder = InMemoryRecorder::new();
        let mut pool = MergedPool::new();

        pool.observe(&tx("0xabc", "0x5", "0x11"), "alpha", &recorder);
        pool.observe(&tx("0xdef", "0x0", "0x22"), "beta", &recorder);

        let indexed: HashSet<String> = pool.by_addr_nonce.keys().cloned().collect();
        assert_eq!(pool.addresses, indexed);
    }

    #[test]
    fn test_peer_class_of() {
        let cases = [
            ("127.0.0.1", PeerClass::Loopback),
            ("::1", PeerClass::Loopback),
            ("10.0.0.5", PeerClass::Internal),
            ("192.168.1.2", PeerClass::Internal),
            ("172.16.0.1", PeerClass::Internal),
            ("169.254.1.1", PeerClass::Internal),
            ("fc00::1", PeerClass::Internal),
            ("fe80::1", PeerClass::Internal),
            ("8.8.8.8", PeerClass::External),
            ("2001:4860:4860::8888", PeerClass::External),
        ];

        for (raw, expected) in cases {
            let ip: IpAddr = raw.parse().unwrap();
            assert_eq!(PeerClass::of(ip), expected, "{}", raw);
        }
    }
}
