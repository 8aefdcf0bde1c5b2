//! Test doubles and chain builders shared by unit and integration tests.

mod network;
mod oracle;

pub use network::{MockNetwork, RecordedRequest};
pub use oracle::StaticOracle;

use crate::header::BlockHeader;
use crate::types::{BlockHash, CompactTarget, MerkleRoot};

/// Regtest-style easy bits used by generated headers.
pub const TEST_BITS: CompactTarget = CompactTarget::from_consensus(0x207fffff);

/// Builds a header on top of `prev`. `seed` distinguishes competing forks.
pub fn header_after(prev: BlockHash, height: u32, seed: u32) -> BlockHeader {
    BlockHeader {
        version: 0x20000000,
        prev_blockhash: prev,
        merkle_root: MerkleRoot::from_byte_array([seed as u8; 32]),
        time: 1_600_000_000 + height * 150,
        bits: TEST_BITS,
        nonce: seed.wrapping_mul(1_000_003).wrapping_add(height),
    }
}

/// Builds `count` linked headers for heights `start..start + count` on top
/// of `prev`.
pub fn build_chain(prev: BlockHash, start: u32, count: u32, seed: u32) -> Vec<BlockHeader> {
    let mut prev = prev;
    (start..start + count)
        .map(|height| {
            let header = header_after(prev, height, seed);
            prev = header.block_hash();
            header
        })
        .collect()
}

/// Builds a chain from genesis: heights `0..count`.
pub fn build_genesis_chain(count: u32, seed: u32) -> Vec<BlockHeader> {
    build_chain(BlockHash::all_zeros(), 0, count, seed)
}

/// Concatenated encoding of `headers`.
pub fn encode_headers(headers: &[BlockHeader]) -> Vec<u8> {
    headers.iter().flat_map(|header| header.encode()).collect()
}
