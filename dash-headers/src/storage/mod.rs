//! Height-indexed header storage.
//!
//! The durable format is a flat file of 80-byte records with height 0 at
//! offset 0 and no metadata, so `tip = file_size / 80 - 1`. Stores are only
//! ever written by the sync worker.

mod bootstrap;
mod cache;
mod disk;
mod lockfile;
mod memory;

pub use bootstrap::{BootstrapLoader, FileBootstrap, NoBootstrap};
pub use cache::HeaderCache;
pub use disk::FlatFileStore;
pub use memory::MemoryStore;

use std::ops::Range;

use crate::error::{StorageError, StorageResult};
use crate::header::BlockHeader;
use crate::types::BlockHash;

/// Record size on disk.
pub const RECORD_SIZE: u64 = BlockHeader::SIZE as u64;

/// Height-indexed header storage owned by a single writer.
pub trait HeaderStorage: Send {
    /// Height of the last stored header, `None` when the store is empty.
    fn local_height(&self) -> Option<u32>;

    /// Number of headers per chunk for [`HeaderStorage::write_chunk`].
    fn chunk_size(&self) -> u32;

    /// Reads the header at `height`. Returns `None` above the tip.
    fn read(&mut self, height: u32) -> StorageResult<Option<BlockHeader>>;

    /// Writes a single header, either overwriting an existing height or
    /// appending directly after the tip.
    fn write_one(&mut self, header: &BlockHeader, height: u32) -> StorageResult<()>;

    /// Writes a non-empty batch of encoded headers starting at
    /// `index * chunk_size`. Records above the batch are left in place.
    fn write_chunk(&mut self, index: u32, raw: &[u8]) -> StorageResult<()>;

    /// Drops every header above `height`; `None` empties the store.
    fn truncate_to(&mut self, height: Option<u32>) -> StorageResult<()>;

    /// Signed tip height where −1 means "no headers".
    fn local_height_i64(&self) -> i64 {
        self.local_height().map_or(-1, i64::from)
    }

    /// Reads the contiguous headers available in `range`, stopping at the
    /// first missing height.
    fn read_range(&mut self, range: Range<u32>) -> StorageResult<Vec<BlockHeader>> {
        let mut headers = Vec::with_capacity(range.len());
        for height in range {
            match self.read(height)? {
                Some(header) => headers.push(header),
                None => break,
            }
        }
        Ok(headers)
    }
}

/// Scans `range` and returns the first height whose header does not link to
/// the header below it.
pub fn find_linkage_break<S: HeaderStorage + ?Sized>(
    store: &mut S,
    range: Range<u32>,
) -> StorageResult<Option<u32>> {
    let mut prev_hash = match range.start.checked_sub(1) {
        Some(below) => match store.read(below)? {
            Some(header) => header.block_hash(),
            None => return Ok(Some(range.start)),
        },
        None => BlockHash::all_zeros(),
    };

    for height in range {
        let Some(header) = store.read(height)? else {
            break;
        };
        if header.prev_blockhash != prev_hash {
            return Ok(Some(height));
        }
        prev_hash = header.block_hash();
    }

    Ok(None)
}

/// First and last height of chunk `index` when it holds `count` headers.
pub(crate) fn chunk_span(index: u32, chunk_size: u32, count: usize) -> StorageResult<(u32, u32)> {
    let span = index.checked_mul(chunk_size).and_then(|start| {
        let last = u32::try_from(count.checked_sub(1)?).ok()?;
        Some((start, start.checked_add(last)?))
    });
    span.ok_or(StorageError::ChunkOutOfRange {
        index,
    })
}

/// Rejects a write starting above the next free height.
pub(crate) fn ensure_contiguous(tip: Option<u32>, height: u32) -> StorageResult<()> {
    let next = match tip {
        None => 0,
        Some(tip) => match tip.checked_add(1) {
            Some(next) => next,
            None => return Ok(()),
        },
    };
    if height > next {
        return Err(StorageError::OutOfOrderWrite {
            height,
            next,
        });
    }
    Ok(())
}
