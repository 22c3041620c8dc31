//! Difficulty targets as handed out by `getworkaux` and `getauxblock`.
//!
//! Both daemons encode the 256 bit target as hex of its little-endian bytes, so the first
//! hex pair is the least significant byte. Ordering the hex strings directly is wrong.
use primitive_types::U256;
use std::cmp::Ordering;

use crate::error::{ProxyError, ProxyResult};

pub const TARGET_LEN: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// Little-endian, zero padded up to [`TARGET_LEN`].
    bytes: [u8; TARGET_LEN],
}

impl Target {
    pub fn from_le_bytes(le_bytes: &[u8]) -> ProxyResult<Self> {
        if le_bytes.is_empty() || le_bytes.len() > TARGET_LEN {
            return Err(ProxyError::InvalidTarget(format!(
                "expected 1 to {TARGET_LEN} bytes, got {}",
                le_bytes.len()
            )));
        }
        let mut bytes = [0u8; TARGET_LEN];
        bytes[..le_bytes.len()].copy_from_slice(le_bytes);
        Ok(Self { bytes })
    }

    pub fn from_hex(target: &str) -> ProxyResult<Self> {
        let le_bytes = hex::decode(target)
            .map_err(|e| ProxyError::InvalidTarget(format!("`{target}`: {e}")))?;
        Self::from_le_bytes(&le_bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn value(&self) -> U256 {
        U256::from_little_endian(&self.bytes)
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value().cmp(&other.value())
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Picks the harder (numerically lower) of two hex targets and returns it unchanged.
/// On a tie the parent target wins.
pub fn harder_target<'a>(parent: &'a str, aux: &'a str) -> ProxyResult<&'a str> {
    if Target::from_hex(aux)? < Target::from_hex(parent)? {
        Ok(aux)
    } else {
        Ok(parent)
    }
}
