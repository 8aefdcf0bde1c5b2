use std::time::Instant;

use crate::error::{ValidationError, ValidationResult};
use crate::header::BlockHeader;
use crate::types::{BlockHash, Chain};
use crate::validation::{DifficultyOracle, Validator};

/// A candidate chain together with the stored headers right below it.
#[derive(Debug, Clone, Copy)]
pub struct ChainInput<'a> {
    /// Up to `cache_kgw_size` stored headers ending at `chain.start_height() - 1`.
    pub preceding: &'a [BlockHeader],
    pub chain: &'a Chain,
}

/// Decides whether a peer's chain may extend or replace the local store.
///
/// Linkage and bits are checked for every header. Raw proof of work is only
/// compared against the oracle's target at or below `pow_checkpoint_height`.
pub struct ChainVerifier<O> {
    oracle: O,
    pow_checkpoint_height: u32,
}

impl<O: DifficultyOracle> ChainVerifier<O> {
    pub fn new(oracle: O, pow_checkpoint_height: u32) -> Self {
        Self {
            oracle,
            pow_checkpoint_height,
        }
    }

    pub fn pow_checkpoint_height(&self) -> u32 {
        self.pow_checkpoint_height
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Verifies `chain` on top of `preceding`, stopping at the first failure.
    pub fn verify(&self, preceding: &[BlockHeader], chain: &Chain) -> ValidationResult<()> {
        self.validate(ChainInput {
            preceding,
            chain,
        })
    }
}

impl<O: DifficultyOracle> Validator<ChainInput<'_>> for ChainVerifier<O> {
    fn validate(&self, input: ChainInput<'_>) -> ValidationResult<()> {
        let ChainInput {
            preceding,
            chain,
        } = input;
        let start = Instant::now();

        let expected = self.oracle.retarget(preceding, chain);
        let mut prev_hash = preceding.last().map_or_else(BlockHash::all_zeros, BlockHeader::block_hash);

        for (i, (height, header)) in chain.iter().enumerate() {
            if header.prev_blockhash != prev_hash {
                return Err(ValidationError::LinkageMismatch {
                    height,
                });
            }

            let Some(&(bits, target)) = expected.get(i) else {
                return Err(ValidationError::MissingTarget {
                    height,
                });
            };

            if header.bits != bits {
                return Err(ValidationError::BitsMismatch {
                    height,
                    expected: bits.to_consensus(),
                    found: header.bits.to_consensus(),
                });
            }

            if height <= self.pow_checkpoint_height && !target.is_met_by(header.pow_hash()) {
                return Err(ValidationError::InsufficientWork {
                    height,
                });
            }

            prev_hash = header.block_hash();
        }

        tracing::trace!(
            "Chain of {} headers from height {} verified in {:?}",
            chain.len(),
            chain.start_height(),
            start.elapsed()
        );

        Ok(())
    }
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod chain_test;
