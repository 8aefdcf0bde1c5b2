use std::collections::HashMap;

use crate::header::BlockHeader;
use crate::types::{Chain, CompactTarget, Target};
use crate::validation::DifficultyOracle;

/// Oracle that expects each header's own bits with a maximal target, unless
/// overridden for a specific height.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    bits: HashMap<u32, CompactTarget>,
    targets: HashMap<u32, Target>,
    truncate_to: Option<usize>,
}

impl StaticOracle {
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Expect `bits` at `height` regardless of what the header says.
    pub fn with_bits(mut self, height: u32, bits: CompactTarget) -> Self {
        self.bits.insert(height, bits);
        self
    }

    /// Use `target` at `height`. [`Target::ZERO`] makes any proof of work fail.
    pub fn with_target(mut self, height: u32, target: Target) -> Self {
        self.targets.insert(height, target);
        self
    }

    /// Return at most `len` pairs, violating the oracle contract.
    pub fn truncated(mut self, len: usize) -> Self {
        self.truncate_to = Some(len);
        self
    }
}

impl DifficultyOracle for StaticOracle {
    fn retarget(&self, _preceding: &[BlockHeader], chain: &Chain) -> Vec<(CompactTarget, Target)> {
        let mut expected: Vec<_> = chain
            .iter()
            .map(|(height, header)| {
                let bits = self.bits.get(&height).copied().unwrap_or(header.bits);
                let target = self.targets.get(&height).copied().unwrap_or(Target::MAX);
                (bits, target)
            })
            .collect();
        if let Some(len) = self.truncate_to {
            expected.truncate(len);
        }
        expected
    }
}
