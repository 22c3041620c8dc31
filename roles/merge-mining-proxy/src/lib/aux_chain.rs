//! Auxiliary chain side of merge mining.
//!
//! The parent block commits to the auxiliary chains through an aux commitment: the root of a
//! merkle tree over the auxiliary block hashes, followed by the tree size and a nonce used to
//! place each chain in the tree. Both trailing fields are `u32` little-endian.
//!
//! With one auxiliary chain the tree is a single leaf, so the root is the auxiliary block hash
//! itself, the size is 1 and the nonce 0.
use rpc_mm::RpcApi;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ProxyError, ProxyResult};

pub const SINGLE_CHAIN_MERKLE_SIZE: u32 = 1;
pub const SINGLE_CHAIN_MERKLE_NONCE: u32 = 0;

/// Bytes taken by the merkle size and nonce at the end of an encoded commitment.
pub const COMMITMENT_SUFFIX_LEN: usize = 8;

/// Answer of `getauxblock` called without arguments. Extra members such as `chainid` are
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuxBlockHandle {
    pub hash: String,
    pub target: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxCommitment {
    merkle_root: Vec<u8>,
    merkle_size: u32,
    merkle_nonce: u32,
}

impl AuxCommitment {
    /// Commitment to a single auxiliary block.
    pub fn single(aux_hash: Vec<u8>) -> Self {
        Self {
            merkle_root: aux_hash,
            merkle_size: SINGLE_CHAIN_MERKLE_SIZE,
            merkle_nonce: SINGLE_CHAIN_MERKLE_NONCE,
        }
    }

    pub fn merkle_root(&self) -> &[u8] {
        &self.merkle_root
    }

    pub fn merkle_size(&self) -> u32 {
        self.merkle_size
    }

    pub fn merkle_nonce(&self) -> u32 {
        self.merkle_nonce
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(self.merkle_root.len() + COMMITMENT_SUFFIX_LEN);
        encoded.extend_from_slice(&self.merkle_root);
        encoded.extend_from_slice(&self.merkle_size.to_le_bytes());
        encoded.extend_from_slice(&self.merkle_nonce.to_le_bytes());
        encoded
    }

    pub fn decode(encoded: &[u8]) -> ProxyResult<Self> {
        if encoded.len() <= COMMITMENT_SUFFIX_LEN {
            return Err(ProxyError::MalformedProof(format!(
                "aux commitment of {} bytes is too short",
                encoded.len()
            )));
        }
        let (root, suffix) = encoded.split_at(encoded.len() - COMMITMENT_SUFFIX_LEN);
        let (size, nonce) = suffix.split_at(4);
        Ok(Self {
            merkle_root: root.to_vec(),
            merkle_size: u32::from_le_bytes([size[0], size[1], size[2], size[3]]),
            merkle_nonce: u32::from_le_bytes([nonce[0], nonce[1], nonce[2], nonce[3]]),
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn from_hex(encoded: &str) -> ProxyResult<Self> {
        Self::decode(&hex::decode(encoded)?)
    }
}

/// Auxiliary block hash carried by an encoded commitment: the commitment text without its
/// size and nonce suffix, returned as received.
pub fn aux_hash_of(commitment_hex: &str) -> ProxyResult<&str> {
    AuxCommitment::from_hex(commitment_hex)?;
    Ok(&commitment_hex[..commitment_hex.len() - 2 * COMMITMENT_SUFFIX_LEN])
}

/// The configured auxiliary chains.
///
/// Holds the clients and builds the aux commitment placed in the parent template. Only the
/// single chain case is implemented; a multi chain version would fetch one handle per chain,
/// place each hash with the merkle nonce and commit to the tree root here.
pub struct AuxChains {
    chain: Arc<dyn RpcApi>,
}

impl AuxChains {
    pub fn new(mut chains: Vec<Arc<dyn RpcApi>>) -> ProxyResult<Self> {
        if chains.len() != 1 {
            return Err(ProxyError::UnsupportedAuxCount(chains.len()));
        }
        let chain = chains.remove(0);
        Ok(Self { chain })
    }

    pub fn chain(&self) -> &dyn RpcApi {
        self.chain.as_ref()
    }

    pub fn commit(&self, handle: &AuxBlockHandle) -> ProxyResult<AuxCommitment> {
        let aux_hash = hex::decode(&handle.hash).map_err(|e| {
            ProxyError::MalformedAuxBlock(format!("hash `{}`: {}", handle.hash, e))
        })?;
        if aux_hash.is_empty() {
            return Err(ProxyError::MalformedAuxBlock("empty hash".to_string()));
        }
        Ok(AuxCommitment::single(aux_hash))
    }
}
