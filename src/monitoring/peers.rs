use crate::infrastructure::metrics::{MetricsRecorder, PEERS_COUNT};
use crate::monitoring::domain::{BuilderStatus, PeerClass};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, warn};

/// Classify every builder's peers by remote-IP reachability and emit the
/// per-class `peers_count` gauges.
///
/// Peers whose `remote_address` does not parse are logged and excluded from
/// every bucket.
pub fn analyse_peers(
    status: &HashMap<String, BuilderStatus>,
    peer_labels: &HashMap<IpAddr, String>,
    recorder: &dyn MetricsRecorder,
) {
    for (builder, sts) in status {
        let Some(peers) = &sts.peers else {
            continue;
        };

        let (mut loopback, mut internal, mut external) = (0i64, 0i64, 0i64);
        for peer in peers {
            let remote: SocketAddr = match peer.network.remote_address.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    warn!(
                        error = %err,
                        builder = %builder,
                        peer_id = %peer.id,
                        peer_enode = %peer.enode,
                        peer_ip = %peer.network.remote_address,
                        "Failed to parse peer's remote address"
                    );
                    continue;
                }
            };

            match PeerClass::of(remote.ip()) {
                PeerClass::Loopback => loopback += 1,
                PeerClass::Internal => internal += 1,
                PeerClass::External => {
                    external += 1;
                    debug!(
                        builder = %builder,
                        peer_enode = %peer.enode,
                        peer_id = %peer.id,
                        peer_caps = ?peer.capabilities,
                        peer_name = %peer.name,
                        peer_ip = %peer.network.remote_address,
                        peer_label = peer_labels.get(&remote.ip()).map(String::as_str),
                        "Builder has external peer"
                    );
                }
            }
        }

        for (class, count) in [
            (PeerClass::Loopback, loopback),
            (PeerClass::Internal, internal),
            (PeerClass::External, external),
        ] {
            recorder.record_gauge(
                PEERS_COUNT,
                count,
                &[
                    ("builder", builder.clone()),
                    ("type", class.label().to_string()),
                ],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::metrics::InMemoryRecorder;
    use crate::rpc::types::{PeerEntry, PeerNetwork};

    fn peer(remote: &str) -> PeerEntry {
        PeerEntry {
            enode: format!("enode://feed@{}", remote),
            id: "feed".to_string(),
            name: "test-client/v1".to_string(),
            capabilities: vec!["eth/68".to_string()],
            network: PeerNetwork {
                local_address: "10.0.0.1:30303".to_string(),
                remote_address: remote.to_string(),
            },
        }
    }

    fn status_with_peers(peers: Vec<PeerEntry>) -> BuilderStatus {
        BuilderStatus {
            peers: Some(peers),
            txpool: None,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_classification_buckets() {
        let mut status = HashMap::new();
        status.insert(
            "alpha".to_string(),
            status_with_peers(vec![
                peer("127.0.0.1:30303"),
                peer("10.0.0.5:30303"),
                peer("8.8.8.8:30303"),
                peer("bogus"),
            ]),
        );

        let recorder = InMemoryRecorder::new();
        analyse_peers(&status, &HashMap::new(), &recorder);

        let gauge = |class: &str| {
            recorder.gauge(PEERS_COUNT, &[("builder", "alpha"), ("type", class)])
        };
        assert_eq!(gauge("loopback"), Some(1));
        assert_eq!(gauge("internal"), Some(1));
        assert_eq!(gauge("external"), Some(1));
    }

    #[test]
    fn test_ipv6_remotes() {
        let mut status = HashMap::new();
        status.insert(
            "alpha".to_string(),
            status_with_peers(vec![peer("[::1]:30303"), peer("[2001:4860::8888]:30303")]),
        );

        let recorder = InMemoryRecorder::new();
        analyse_peers(&status, &HashMap::new(), &recorder);

        assert_eq!(
            recorder.gauge(PEERS_COUNT, &[("builder", "alpha"), ("type", "loopback")]),
            Some(1)
        );
        assert_eq!(
            recorder.gauge(PEERS_COUNT, &[("builder", "alpha"), ("type", "external")]),
            Some(1)
        );
    }

    #[test]
    fn test_builder_without_peer_list_emits_nothing() {
        let mut status = HashMap::new();
        status.insert("alpha".to_string(), BuilderStatus::default());

        let recorder = InMemoryRecorder::new();
        analyse_peers(&status, &HashMap::new(), &recorder);

        assert_eq!(recorder.gauge_series_count(), 0);
    }

    #[test]
    fn test_empty_peer_list_emits_zeroes() {
        let mut status = HashMap::new();
        status.insert("alpha".to_string(), status_with_peers(Vec::new()));

        let recorder = InMemoryRecorder::new();
        analyse_peers(&status, &HashMap::new(), &recorder);

        for class in ["loopback", "internal", "external"] {
            assert_eq!(
                recorder.gauge(PEERS_COUNT, &[("builder", "alpha"), ("type", class)]),
                Some(0)
            );
        }
    }
}
