//! Unit tests for chain verification.

#[cfg(test)]
mod tests {
    use crate::error::ValidationError;
    use crate::test_utils::{build_chain, build_genesis_chain, StaticOracle, TEST_BITS};
    use crate::types::{BlockHash, Chain, CompactTarget, Target};
    use crate::validation::{ChainVerifier, HeaderBitsOracle};

    const CHECKPOINT: u32 = 1_000;

    fn split(headers: Vec<crate::header::BlockHeader>, at: usize) -> (Vec<crate::header::BlockHeader>, Chain) {
        let preceding = headers[..at].to_vec();
        let chain = Chain::new(at as u32, headers[at..].to_vec());
        (preceding, chain)
    }

    #[test]
    fn test_valid_chain_is_accepted() {
        let (preceding, chain) = split(build_genesis_chain(20, 1), 10);
        let verifier = ChainVerifier::new(StaticOracle::permissive(), CHECKPOINT);
        assert_eq!(verifier.verify(&preceding, &chain), Ok(()));
    }

    #[test]
    fn test_empty_chain_is_accepted() {
        let verifier = ChainVerifier::new(StaticOracle::permissive(), CHECKPOINT);
        assert_eq!(verifier.verify(&[], &Chain::new(0, vec![])), Ok(()));
    }

    #[test]
    fn test_genesis_must_have_zero_prev_hash() {
        let verifier = ChainVerifier::new(StaticOracle::permissive(), CHECKPOINT);

        let chain = Chain::new(0, build_genesis_chain(3, 1));
        assert_eq!(verifier.verify(&[], &chain), Ok(()));

        let orphan = Chain::new(0, build_chain(BlockHash::from_byte_array([1; 32]), 0, 3, 1));
        assert_eq!(
            verifier.verify(&[], &orphan),
            Err(ValidationError::LinkageMismatch {
                height: 0
            })
        );
    }

    #[test]
    fn test_first_header_must_link_to_preceding_window() {
        let (preceding, _) = split(build_genesis_chain(10, 1), 10);
        let foreign = Chain::new(10, build_chain(BlockHash::from_byte_array([9; 32]), 10, 2, 2));

        let verifier = ChainVerifier::new(StaticOracle::permissive(), CHECKPOINT);
        assert_eq!(
            verifier.verify(&preceding, &foreign),
            Err(ValidationError::LinkageMismatch {
                height: 10
            })
        );
    }

    #[test]
    fn test_broken_linkage_mid_chain() {
        let mut headers = build_genesis_chain(8, 1);
        headers[6].prev_blockhash = BlockHash::all_zeros();
        let (preceding, chain) = split(headers, 4);

        let verifier = ChainVerifier::new(StaticOracle::permissive(), CHECKPOINT);
        assert_eq!(
            verifier.verify(&preceding, &chain),
            Err(ValidationError::LinkageMismatch {
                height: 6
            })
        );
    }

    #[test]
    fn test_bits_mismatch_at_relative_index_two() {
        let (preceding, chain) = split(build_genesis_chain(15, 1), 10);
        let oracle = StaticOracle::permissive().with_bits(12, CompactTarget::from_consensus(0x1b04864c));

        let verifier = ChainVerifier::new(oracle, CHECKPOINT);
        assert_eq!(
            verifier.verify(&preceding, &chain),
            Err(ValidationError::BitsMismatch {
                height: 12,
                expected: 0x1b04864c,
                found: TEST_BITS.to_consensus(),
            })
        );
    }

    #[test]
    fn test_insufficient_work_below_checkpoint() {
        let (preceding, chain) = split(build_genesis_chain(6, 1), 3);
        let oracle = StaticOracle::permissive().with_target(4, Target::ZERO);

        let verifier = ChainVerifier::new(oracle, CHECKPOINT);
        assert_eq!(
            verifier.verify(&preceding, &chain),
            Err(ValidationError::InsufficientWork {
                height: 4
            })
        );
    }

    #[test]
    fn test_pow_not_enforced_above_checkpoint() {
        let (preceding, chain) = split(build_genesis_chain(6, 1), 3);
        let oracle = StaticOracle::permissive().with_target(4, Target::ZERO).with_target(5, Target::ZERO);

        // Checkpoint at 3: heights 4 and 5 only get linkage and bits checks.
        let verifier = ChainVerifier::new(oracle.clone(), 3);
        assert_eq!(verifier.verify(&preceding, &chain), Ok(()));

        // Checkpoint exactly at 4 is inclusive.
        let verifier = ChainVerifier::new(oracle, 4);
        assert_eq!(
            verifier.verify(&preceding, &chain),
            Err(ValidationError::InsufficientWork {
                height: 4
            })
        );
    }

    #[test]
    fn test_bits_still_checked_above_checkpoint() {
        let (preceding, chain) = split(build_genesis_chain(6, 1), 3);
        let oracle = StaticOracle::permissive().with_bits(5, CompactTarget::from_consensus(0x1d00ffff));

        let verifier = ChainVerifier::new(oracle, 0);
        assert!(matches!(
            verifier.verify(&preceding, &chain),
            Err(ValidationError::BitsMismatch {
                height: 5,
                ..
            })
        ));
    }

    #[test]
    fn test_first_failure_wins() {
        let (preceding, chain) = split(build_genesis_chain(10, 1), 5);
        let oracle = StaticOracle::permissive()
            .with_target(6, Target::ZERO)
            .with_bits(8, CompactTarget::from_consensus(1));

        let verifier = ChainVerifier::new(oracle, CHECKPOINT);
        assert_eq!(
            verifier.verify(&preceding, &chain),
            Err(ValidationError::InsufficientWork {
                height: 6
            })
        );
    }

    #[test]
    fn test_short_oracle_answer_is_rejected() {
        let (preceding, chain) = split(build_genesis_chain(10, 1), 5);
        let verifier = ChainVerifier::new(StaticOracle::permissive().truncated(2), CHECKPOINT);
        assert_eq!(
            verifier.verify(&preceding, &chain),
            Err(ValidationError::MissingTarget {
                height: 7
            })
        );
    }

    #[test]
    fn test_header_bits_oracle_rejects_unmined_header() {
        // Generated headers are not mined; a hard target defeats them.
        let mut headers = build_genesis_chain(1, 1);
        headers[0].bits = CompactTarget::from_consensus(0x1b04864c);
        let chain = Chain::new(0, headers);

        let verifier = ChainVerifier::new(HeaderBitsOracle, CHECKPOINT);
        assert_eq!(
            verifier.verify(&[], &chain),
            Err(ValidationError::InsufficientWork {
                height: 0
            })
        );
    }
}
