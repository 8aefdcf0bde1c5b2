//! Difficulty oracle seam.

use std::sync::Arc;

use crate::header::BlockHeader;
use crate::types::{Chain, CompactTarget, Target};

/// Computes the expected `(bits, target)` for every header of a candidate
/// chain from the headers that precede it.
///
/// Implementations must be pure functions of their inputs and return one
/// pair per header of `chain`, in order.
pub trait DifficultyOracle: Send + Sync {
    fn retarget(&self, preceding: &[BlockHeader], chain: &Chain) -> Vec<(CompactTarget, Target)>;
}

impl<T: DifficultyOracle + ?Sized> DifficultyOracle for Arc<T> {
    fn retarget(&self, preceding: &[BlockHeader], chain: &Chain) -> Vec<(CompactTarget, Target)> {
        (**self).retarget(preceding, chain)
    }
}

impl<T: DifficultyOracle + ?Sized> DifficultyOracle for Box<T> {
    fn retarget(&self, preceding: &[BlockHeader], chain: &Chain) -> Vec<(CompactTarget, Target)> {
        (**self).retarget(preceding, chain)
    }
}

/// Oracle that accepts each header's own `bits` and expands them.
///
/// This only checks that a header's proof of work matches what it claims;
/// it does not enforce any retarget rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderBitsOracle;

impl DifficultyOracle for HeaderBitsOracle {
    fn retarget(&self, _preceding: &[BlockHeader], chain: &Chain) -> Vec<(CompactTarget, Target)> {
        chain.headers().iter().map(|header| (header.bits, header.target())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bits_oracle_echoes_bits() {
        let header = BlockHeader {
            bits: CompactTarget::from_consensus(0x1e0ffff0),
            ..BlockHeader::default()
        };
        let chain = Chain::new(3, vec![header, header]);
        let expected = HeaderBitsOracle.retarget(&[], &chain);
        assert_eq!(expected.len(), 2);
        assert_eq!(expected[0].0, header.bits);
        assert_eq!(expected[0].1, Target::from_compact(header.bits));
    }
}
