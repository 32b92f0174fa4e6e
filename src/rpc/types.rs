use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of the `admin_peers` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    pub enode: String,
    pub id: String,
    pub name: String,
    #[serde(rename = "caps", default)]
    pub capabilities: Vec<String>,
    pub network: PeerNetwork,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerNetwork {
    #[serde(rename = "localAddress")]
    pub local_address: String,
    #[serde(rename = "remoteAddress")]
    pub remote_address: String,
}

/// The `txpool_content` response: two maps of
/// `address -> decimal nonce -> transaction`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxpoolContent {
    #[serde(default)]
    pub pending: HashMap<String, HashMap<String, TxSummary>>,
    #[serde(default)]
    pub queued: HashMap<String, HashMap<String, TxSummary>>,
}

/// The subset of a txpool transaction the monitor cares about. `nonce` keeps
/// its wire form (`0x`-prefixed hex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxSummary {
    pub from: String,
    pub nonce: String,
    pub hash: String,
}

impl TxpoolContent {
    /// Normalize wire-form address strings to lowercase so that map lookups
    /// are canonical across builders that checksum differently.
    pub fn normalize(self) -> Self {
        TxpoolContent {
            pending: normalize_side(self.pending),
            queued: normalize_side(self.queued),
        }
    }
}

fn normalize_side(
    side: HashMap<String, HashMap<String, TxSummary>>,
) -> HashMap<String, HashMap<String, TxSummary>> {
    side.into_iter()
        .map(|(addr, by_nonce)| {
            let by_nonce = by_nonce
                .into_iter()
                .map(|(nonce, mut tx)| {
                    tx.from = tx.from.to_lowercase();
                    (nonce, tx)
                })
                .collect();
            (addr.to_lowercase(), by_nonce)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_admin_peers_entry() {
        let raw = serde_json::json!({
            "enode": "enode://abcd@10.0.0.5:30303",
            "id": "abcd",
            "name": "Geth/v1.13.0",
            "caps": ["eth/68", "snap/1"],
            "network": {
                "localAddress": "10.0.0.1:30303",
                "remoteAddress": "10.0.0.5:30303"
            }
        });

        let peer: PeerEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(peer.capabilities, vec!["eth/68", "snap/1"]);
        assert_eq!(peer.network.remote_address, "10.0.0.5:30303");
    }

    #[test]
    fn test_deserialize_txpool_content() {
        let raw = serde_json::json!({
            "pending": {
                "0xAbCd35cc6634c0532925a3b8d4c9db96c4b4d8b6": {
                    "5": {"from": "0xAbCd35cc6634c0532925a3b8d4c9db96c4b4d8b6", "nonce": "0x5", "hash": "0x11"}
                }
            },
            "queued": {}
        });

        let txpool: TxpoolContent = serde_json::from_value(raw).unwrap();
        let (addr, by_nonce) = txpool.pending.iter().next().unwrap();
        assert!(addr.starts_with("0xAbCd"));
        assert_eq!(by_nonce["5"].nonce, "0x5");
    }

    #[test]
    fn test_normalize_lowercases_addresses() {
        let raw = serde_json::json!({
            "pending": {
                "0xAbCd35cc6634c0532925a3b8d4c9db96c4b4d8b6": {
                    "5": {"from": "0xAbCd35cc6634c0532925a3b8d4c9db96c4b4d8b6", "nonce": "0x5", "hash": "0x11"}
                }
            }
        });

        let txpool: TxpoolContent = serde_json::from_value::<TxpoolContent>(raw)
            .unwrap()
            .normalize();
        let addr = "0xabcd35cc6634c0532925a3b8d4c9db96c4b4d8b6";
        assert!(txpool.pending.contains_key(addr));
        assert_eq!(txpool.pending[addr]["5"].from, addr);
        assert!(txpool.queued.is_empty());
    }
}
