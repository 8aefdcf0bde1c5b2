use crate::error::{SyncError, SyncResult, ValidationError};
use crate::header::BlockHeader;
use crate::storage::HeaderStorage;
use crate::types::Chain;
use crate::validation::{ChainVerifier, DifficultyOracle};

/// Verifies and stores a whole batch of headers delivered as one unit.
#[derive(Debug, Clone, Copy)]
pub struct ChunkVerifier {
    chunk_size: u32,
    window: usize,
}

impl ChunkVerifier {
    /// `window` is how many stored headers before the chunk are handed to the
    /// difficulty oracle.
    pub fn new(chunk_size: u32, window: usize) -> Self {
        Self {
            chunk_size,
            window,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Decodes and verifies chunk `index` without touching the store's
    /// contents.
    pub fn verify<S, O>(
        &self,
        verifier: &ChainVerifier<O>,
        store: &mut S,
        index: u32,
        raw: &[u8],
    ) -> SyncResult<Chain>
    where
        S: HeaderStorage + ?Sized,
        O: DifficultyOracle,
    {
        let failed = |source: ValidationError| SyncError::ChunkVerificationFailed {
            index,
            source,
        };

        if raw.is_empty() || raw.len() > self.chunk_size as usize * BlockHeader::SIZE {
            return Err(failed(ValidationError::MalformedHeader {
                length: raw.len(),
            }));
        }
        let headers = BlockHeader::decode_many(raw).map_err(failed)?;

        // Every height up to the chunk's last header must fit in a u32.
        let start = index
            .checked_mul(self.chunk_size)
            .filter(|start| start.checked_add(headers.len() as u32 - 1).is_some())
            .ok_or_else(|| failed(ValidationError::HeightOverflow))?;
        let chain = Chain::new(start, headers);
        let preceding = match preceding_window(store, start, self.window) {
            Ok(window) => window,
            Err(SyncError::Validation(source)) => return Err(failed(source)),
            Err(e) => return Err(e),
        };

        verifier.verify(&preceding, &chain).map_err(failed)?;
        Ok(chain)
    }

    /// Verifies chunk `index` and, only if it passes, writes it to `store`.
    /// Returns the height of the last header written.
    ///
    /// Stored headers above a short chunk are dropped when they do not build
    /// on the chunk's last header.
    pub fn accept<S, O>(
        &self,
        verifier: &ChainVerifier<O>,
        store: &mut S,
        index: u32,
        raw: &[u8],
    ) -> SyncResult<u32>
    where
        S: HeaderStorage + ?Sized,
        O: DifficultyOracle,
    {
        let chain = self.verify(verifier, store, index, raw)?;
        store.write_chunk(index, raw)?;

        let tip = chain.tip_height().unwrap_or(chain.start_height());
        tracing::info!("Accepted chunk {} (heights {}..={})", index, chain.start_height(), tip);

        let last_hash = chain.headers().last().map(BlockHeader::block_hash);
        if let Some(above) = tip.checked_add(1) {
            if let Some(stale) = store.read(above)? {
                if Some(stale.prev_blockhash) != last_hash {
                    tracing::info!(
                        "Chunk {} forks below local height {}, dropping headers above {}",
                        index,
                        store.local_height_i64(),
                        tip
                    );
                    store.truncate_to(Some(tip))?;
                }
            }
        }
        Ok(tip)
    }
}

/// Reads up to `size` stored headers ending at `start - 1`.
///
/// Fails with `LinkageMismatch` at `start` when the header right below
/// `start` is not stored, since nothing could link to it.
pub(crate) fn preceding_window<S: HeaderStorage + ?Sized>(
    store: &mut S,
    start: u32,
    size: usize,
) -> SyncResult<Vec<BlockHeader>> {
    let from = start.saturating_sub(size as u32);
    let window = store.read_range(from..start)?;
    if window.len() as u32 != start - from {
        return Err(ValidationError::LinkageMismatch {
            height: start,
        }
        .into());
    }
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{find_linkage_break, MemoryStore};
    use crate::test_utils::{build_chain, build_genesis_chain, encode_headers, StaticOracle};
    use crate::types::{BlockHash, Target};

    const CHUNK: u32 = 8;

    fn verifier(oracle: StaticOracle) -> ChainVerifier<StaticOracle> {
        ChainVerifier::new(oracle, u32::MAX)
    }

    #[test]
    fn test_accepts_first_chunk_into_empty_store() {
        let headers = build_genesis_chain(CHUNK, 1);
        let mut store = MemoryStore::new(CHUNK);

        let tip = ChunkVerifier::new(CHUNK, 4)
            .accept(&verifier(StaticOracle::permissive()), &mut store, 0, &encode_headers(&headers))
            .unwrap();

        assert_eq!(tip, CHUNK - 1);
        assert_eq!(store.local_height(), Some(CHUNK - 1));
        assert_eq!(store.read(3).unwrap(), Some(headers[3]));
    }

    #[test]
    fn test_second_chunk_links_to_stored_tail() {
        let headers = build_genesis_chain(CHUNK * 2, 1);
        let mut store = MemoryStore::with_headers(CHUNK, headers[..CHUNK as usize].to_vec());
        let chunk = ChunkVerifier::new(CHUNK, 4);

        let tip = chunk
            .accept(
                &verifier(StaticOracle::permissive()),
                &mut store,
                1,
                &encode_headers(&headers[CHUNK as usize..]),
            )
            .unwrap();
        assert_eq!(tip, 2 * CHUNK - 1);
    }

    #[test]
    fn test_partial_tip_chunk_is_accepted() {
        let headers = build_genesis_chain(CHUNK + 3, 1);
        let mut store = MemoryStore::with_headers(CHUNK, headers[..CHUNK as usize].to_vec());

        let tip = ChunkVerifier::new(CHUNK, 4)
            .accept(
                &verifier(StaticOracle::permissive()),
                &mut store,
                1,
                &encode_headers(&headers[CHUNK as usize..]),
            )
            .unwrap();
        assert_eq!(tip, CHUNK + 2);
        assert_eq!(store.local_height(), Some(CHUNK + 2));
    }

    #[test]
    fn test_failed_chunk_writes_nothing() {
        let headers = build_genesis_chain(CHUNK, 1);
        let mut store = MemoryStore::new(CHUNK);
        let oracle = StaticOracle::permissive().with_target(5, Target::ZERO);

        let result =
            ChunkVerifier::new(CHUNK, 4).accept(&verifier(oracle), &mut store, 0, &encode_headers(&headers));

        assert!(matches!(
            result,
            Err(SyncError::ChunkVerificationFailed {
                index: 0,
                source: ValidationError::InsufficientWork {
                    height: 5
                }
            })
        ));
        assert_eq!(store.writes(), 0);
        assert_eq!(store.local_height(), None);
    }

    #[test]
    fn test_short_fork_chunk_drops_stale_headers_above() {
        let local = build_genesis_chain(CHUNK + 4, 1);
        let fork = build_chain(local[CHUNK as usize - 1].block_hash(), CHUNK, 3, 2);
        let mut store = MemoryStore::with_headers(CHUNK, local.clone());

        let tip = ChunkVerifier::new(CHUNK, 4)
            .accept(&verifier(StaticOracle::permissive()), &mut store, 1, &encode_headers(&fork))
            .unwrap();

        assert_eq!(tip, CHUNK + 2);
        assert_eq!(store.local_height(), Some(CHUNK + 2));
        assert_eq!(find_linkage_break(&mut store, 0..CHUNK + 4).unwrap(), None);
        assert_eq!(store.read(CHUNK).unwrap(), Some(fork[0]));
    }

    #[test]
    fn test_short_chunk_on_same_chain_keeps_headers_above() {
        let local = build_genesis_chain(CHUNK + 4, 1);
        let mut store = MemoryStore::with_headers(CHUNK, local.clone());

        ChunkVerifier::new(CHUNK, 4)
            .accept(
                &verifier(StaticOracle::permissive()),
                &mut store,
                1,
                &encode_headers(&local[CHUNK as usize..CHUNK as usize + 3]),
            )
            .unwrap();

        assert_eq!(store.local_height(), Some(CHUNK + 3));
        assert_eq!(store.to_bytes(), encode_headers(&local));
    }

    #[test]
    fn test_chunk_past_the_height_range_is_rejected() {
        let headers = build_genesis_chain(CHUNK, 1);
        let mut store = MemoryStore::new(CHUNK);
        let chunk = ChunkVerifier::new(CHUNK, 4);

        for index in [u32::MAX / CHUNK + 1, u32::MAX] {
            let result =
                chunk.verify(&verifier(StaticOracle::permissive()), &mut store, index, &encode_headers(&headers));
            assert!(matches!(
                result,
                Err(SyncError::ChunkVerificationFailed {
                    source: ValidationError::HeightOverflow,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_malformed_chunk_lengths() {
        let mut store = MemoryStore::new(CHUNK);
        let chunk = ChunkVerifier::new(CHUNK, 4);
        let verifier = verifier(StaticOracle::permissive());

        for raw in [vec![], vec![0u8; 81], vec![0u8; (CHUNK as usize + 1) * 80]] {
            let result = chunk.verify(&verifier, &mut store, 0, &raw);
            assert!(matches!(
                result,
                Err(SyncError::ChunkVerificationFailed {
                    index: 0,
                    source: ValidationError::MalformedHeader {
                        ..
                    }
                })
            ));
        }
    }

    #[test]
    fn test_chunk_without_stored_predecessor_fails() {
        let headers = build_genesis_chain(CHUNK * 2, 1);
        let mut store = MemoryStore::new(CHUNK);

        let result = ChunkVerifier::new(CHUNK, 4).verify(
            &verifier(StaticOracle::permissive()),
            &mut store,
            1,
            &encode_headers(&headers[CHUNK as usize..]),
        );
        assert!(matches!(
            result,
            Err(SyncError::ChunkVerificationFailed {
                index: 1,
                source: ValidationError::LinkageMismatch {
                    height: 8
                }
            })
        ));
    }

    #[test]
    fn test_preceding_window_bounds() {
        let headers = build_genesis_chain(10, 1);
        let mut store = MemoryStore::with_headers(CHUNK, headers.clone());

        assert!(preceding_window(&mut store, 0, 4).unwrap().is_empty());
        assert_eq!(preceding_window(&mut store, 2, 4).unwrap(), headers[..2].to_vec());
        assert_eq!(preceding_window(&mut store, 10, 4).unwrap(), headers[6..10].to_vec());
        assert!(preceding_window(&mut store, 12, 4).is_err());
        assert_ne!(headers[9].block_hash(), BlockHash::all_zeros());
    }
}
