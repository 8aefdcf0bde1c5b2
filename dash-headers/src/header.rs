//! Fixed-width header encoding.
//!
//! A header is always exactly 80 bytes on disk and on the wire:
//!
//! | field          | bytes | encoding                 |
//! |----------------|-------|--------------------------|
//! | version        | 4     | little-endian            |
//! | prev_blockhash | 32    | internal (reversed) order|
//! | merkle_root    | 32    | internal (reversed) order|
//! | time           | 4     | little-endian            |
//! | bits           | 4     | little-endian            |
//! | nonce          | 4     | little-endian            |

use crate::error::{ValidationError, ValidationResult};
use crate::hashes;
use crate::types::{BlockHash, CompactTarget, MerkleRoot, PowHash, Target};

/// Block header. The height is contextual and never part of the encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_blockhash: BlockHash,
    pub merkle_root: MerkleRoot,
    pub time: u32,
    pub bits: CompactTarget,
    pub nonce: u32,
}

impl BlockHeader {
    /// Size of one encoded header record.
    pub const SIZE: usize = 80;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_blockhash.as_byte_array());
        out[36..68].copy_from_slice(self.merkle_root.as_byte_array());
        out[68..72].copy_from_slice(&self.time.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_consensus().to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> ValidationResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(ValidationError::MalformedHeader {
                length: bytes.len(),
            });
        }

        Ok(Self {
            version: read_u32(&bytes[0..4]),
            prev_blockhash: BlockHash::from_byte_array(read_hash(&bytes[4..36])),
            merkle_root: MerkleRoot::from_byte_array(read_hash(&bytes[36..68])),
            time: read_u32(&bytes[68..72]),
            bits: CompactTarget::from_consensus(read_u32(&bytes[72..76])),
            nonce: read_u32(&bytes[76..80]),
        })
    }

    /// Decodes a buffer of back-to-back records.
    pub fn decode_many(bytes: &[u8]) -> ValidationResult<Vec<Self>> {
        if bytes.len() % Self::SIZE != 0 {
            return Err(ValidationError::MalformedHeader {
                length: bytes.len() % Self::SIZE,
            });
        }
        bytes.chunks_exact(Self::SIZE).map(Self::decode).collect()
    }

    /// Identity of the block, referenced by the next header's `prev_blockhash`.
    pub fn block_hash(&self) -> BlockHash {
        BlockHash::from_byte_array(hashes::x11(&self.encode()))
    }

    /// Hash compared against the target. Same digest as the block hash on
    /// Dash, kept separate because callers use it for a different purpose.
    pub fn pow_hash(&self) -> PowHash {
        PowHash::from_byte_array(hashes::x11(&self.encode()))
    }

    /// Target declared by the header's own `bits`.
    pub fn target(&self) -> Target {
        Target::from_compact(self.bits)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_hash(bytes: &[u8]) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf.copy_from_slice(bytes);
    buf
}
