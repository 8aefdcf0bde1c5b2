//! Common value types shared by the codec, verifiers, and sync engine.

use std::fmt;
use std::str::FromStr;

use crate::header::BlockHeader;

macro_rules! hash_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        ///
        /// Bytes are held in internal order; `Display` and `FromStr` use the
        /// byte-reversed hex form shown by block explorers.
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const fn from_byte_array(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub const fn to_byte_array(self) -> [u8; 32] {
                self.0
            }

            pub const fn as_byte_array(&self) -> &[u8; 32] {
                &self.0
            }

            pub const fn all_zeros() -> Self {
                Self([0u8; 32])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut reversed = self.0;
                reversed.reverse();
                f.write_str(&hex::encode(reversed))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes)?;
                bytes.reverse();
                Ok(Self(bytes))
            }
        }
    };
}

hash_newtype!(BlockHash, "Identity of a block header (its X11 digest).");
hash_newtype!(MerkleRoot, "Merkle root of a block's transactions.");
hash_newtype!(PowHash, "X11 digest of a header, compared against its target.");

/// Compact ("nBits") encoding of a difficulty target.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompactTarget(u32);

impl CompactTarget {
    pub const fn from_consensus(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn to_consensus(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompactTarget({:#010x})", self.0)
    }
}

/// 256-bit unsigned proof-of-work threshold, stored big-endian so the derived
/// ordering is numeric ordering.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target([u8; 32]);

impl Target {
    /// No hash is below this target.
    pub const ZERO: Target = Target([0u8; 32]);

    /// Every hash except all-ones is below this target.
    pub const MAX: Target = Target([0xff; 32]);

    pub const fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn to_be_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Expands a compact target. Negative or zero mantissas decode to
    /// [`Target::ZERO`]; values that overflow 256 bits saturate to
    /// [`Target::MAX`].
    pub fn from_compact(bits: CompactTarget) -> Self {
        let bits = bits.to_consensus();
        let exponent = (bits >> 24) as usize;
        let mantissa = bits & 0x007f_ffff;

        if mantissa == 0 || bits & 0x0080_0000 != 0 {
            return Target::ZERO;
        }

        let mut bytes = [0u8; 32];
        if exponent <= 3 {
            let value = mantissa >> (8 * (3 - exponent));
            bytes[28..].copy_from_slice(&value.to_be_bytes());
            return Target(bytes);
        }

        let shift = exponent - 3;
        for i in 0..3 {
            let byte = ((mantissa >> (8 * i)) & 0xff) as u8;
            let pos_from_end = shift + i;
            if pos_from_end < 32 {
                bytes[31 - pos_from_end] = byte;
            } else if byte != 0 {
                return Target::MAX;
            }
        }
        Target(bytes)
    }

    /// True when `hash`, read as a little-endian 256-bit integer, is strictly
    /// below this target.
    pub fn is_met_by(&self, hash: PowHash) -> bool {
        let mut be = hash.to_byte_array();
        be.reverse();
        be < self.0
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", hex::encode(self.0))
    }
}

/// Opaque identifier of the peer an announcement or request belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// A contiguous run of headers proposed by a peer, not yet persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    start_height: u32,
    headers: Vec<BlockHeader>,
}

impl Chain {
    pub fn new(start_height: u32, headers: Vec<BlockHeader>) -> Self {
        Self {
            start_height,
            headers,
        }
    }

    /// Height of the first header.
    pub fn start_height(&self) -> u32 {
        self.start_height
    }

    /// Height of the last header, `None` for an empty chain.
    pub fn tip_height(&self) -> Option<u32> {
        let last = self.headers.len().checked_sub(1)?;
        Some(self.start_height + last as u32)
    }

    pub fn headers(&self) -> &[BlockHeader] {
        &self.headers
    }

    pub fn first(&self) -> Option<&BlockHeader> {
        self.headers.first()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Headers paired with their heights, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &BlockHeader)> + '_ {
        self.headers.iter().enumerate().map(move |(i, header)| (self.start_height + i as u32, header))
    }

    /// Prepends the predecessor of the current first header. The chain must
    /// not already start at height 0.
    pub(crate) fn push_front(&mut self, header: BlockHeader) {
        debug_assert!(self.start_height > 0, "cannot extend a chain below height 0");
        self.start_height = self.start_height.saturating_sub(1);
        self.headers.insert(0, header);
    }

    pub fn into_headers(self) -> Vec<BlockHeader> {
        self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hash_display_is_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        bytes[31] = 0x01;
        let hash = BlockHash::from_byte_array(bytes);
        let shown = hash.to_string();
        assert!(shown.starts_with("01"));
        assert!(shown.ends_with("ab"));
        assert_eq!(shown.parse::<BlockHash>().unwrap(), hash);
    }

    #[test]
    fn test_block_hash_from_str_rejects_short_input() {
        assert!("abcd".parse::<BlockHash>().is_err());
    }

    #[test]
    fn test_target_from_compact_genesis_bits() {
        // 0x1e0ffff0 -> 0x00000ffff0 followed by 25 zero bytes
        let target = Target::from_compact(CompactTarget::from_consensus(0x1e0ffff0));
        let bytes = target.to_be_bytes();
        assert_eq!(&bytes[..5], &[0x00, 0x00, 0x0f, 0xff, 0xf0]);
        assert!(bytes[5..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_target_from_compact_small_exponent() {
        let target = Target::from_compact(CompactTarget::from_consensus(0x0312_3456));
        assert_eq!(&target.to_be_bytes()[29..], &[0x12, 0x34, 0x56]);

        let target = Target::from_compact(CompactTarget::from_consensus(0x0112_3456));
        assert_eq!(target.to_be_bytes()[31], 0x12);
        assert!(target.to_be_bytes()[..31].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_target_from_compact_edge_cases() {
        assert_eq!(Target::from_compact(CompactTarget::from_consensus(0)), Target::ZERO);
        // Sign bit set
        assert_eq!(Target::from_compact(CompactTarget::from_consensus(0x04923456)), Target::ZERO);
        // Overflow saturates
        assert_eq!(Target::from_compact(CompactTarget::from_consensus(0x2301_0000)), Target::MAX);

        let regtest = Target::from_compact(CompactTarget::from_consensus(0x207fffff));
        assert_eq!(&regtest.to_be_bytes()[..3], &[0x7f, 0xff, 0xff]);
    }

    #[test]
    fn test_target_is_met_by() {
        let zero_hash = PowHash::all_zeros();
        assert!(Target::MAX.is_met_by(zero_hash));
        assert!(!Target::ZERO.is_met_by(zero_hash));
        assert!(!Target::MAX.is_met_by(PowHash::from_byte_array([0xff; 32])));

        // The most significant byte of the hash is the last internal byte.
        let mut bytes = [0u8; 32];
        bytes[31] = 0x01;
        let high = PowHash::from_byte_array(bytes);
        let target = Target::from_compact(CompactTarget::from_consensus(0x207fffff));
        assert!(target.is_met_by(high));

        bytes[31] = 0x80;
        assert!(!target.is_met_by(PowHash::from_byte_array(bytes)));
    }

    #[test]
    fn test_chain_heights() {
        let header = BlockHeader::default();
        let mut chain = Chain::new(12, vec![header]);
        assert_eq!(chain.tip_height(), Some(12));

        chain.push_front(header);
        assert_eq!(chain.start_height(), 11);
        assert_eq!(chain.tip_height(), Some(12));
        let heights: Vec<u32> = chain.iter().map(|(h, _)| h).collect();
        assert_eq!(heights, vec![11, 12]);

        assert_eq!(Chain::new(5, vec![]).tip_height(), None);
        assert_eq!(Chain::new(u32::MAX, vec![header]).tip_height(), Some(u32::MAX));
    }
}
