use crate::shared::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 20-byte account address.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| MonitorError::InvalidAddress(s.to_string()))?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Decode a nonce from its wire form into a u64.
///
/// The txpool reports nonces as `0x`-prefixed base-16 strings; the prefix is
/// stripped and the remainder parsed as hexadecimal.
pub fn parse_nonce(s: &str) -> Result<u64, MonitorError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|_| MonitorError::InvalidNonce(s.to_string()))
}

/// Re-encode a nonce as the decimal string used to key the per-address
/// `pending`/`queued` maps.
pub fn nonce_key(nonce: u64) -> String {
    nonce.to_string()
}
