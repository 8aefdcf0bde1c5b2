//! In-memory header store for tests and ephemeral clients.

use crate::error::{StorageError, StorageResult};
use crate::header::BlockHeader;

use super::{chunk_span, ensure_contiguous, HeaderStorage};

/// Header store kept entirely in a `Vec`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    headers: Vec<BlockHeader>,
    chunk_size: u32,
    writes: usize,
}

impl MemoryStore {
    pub fn new(chunk_size: u32) -> Self {
        Self {
            headers: Vec::new(),
            chunk_size,
            writes: 0,
        }
    }

    /// Store pre-filled with `headers` at heights `0..headers.len()`.
    pub fn with_headers(chunk_size: u32, headers: Vec<BlockHeader>) -> Self {
        Self {
            headers,
            chunk_size,
            writes: 0,
        }
    }

    /// Number of successful `write_one`/`write_chunk` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Encoded contents, byte-identical to what a flat-file store would hold.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.headers.iter().flat_map(|header| header.encode()).collect()
    }

    fn put(&mut self, height: u32, header: BlockHeader) {
        let height = height as usize;
        if height == self.headers.len() {
            self.headers.push(header);
        } else {
            self.headers[height] = header;
        }
    }
}

impl HeaderStorage for MemoryStore {
    fn local_height(&self) -> Option<u32> {
        (self.headers.len() as u32).checked_sub(1)
    }

    fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    fn read(&mut self, height: u32) -> StorageResult<Option<BlockHeader>> {
        Ok(self.headers.get(height as usize).copied())
    }

    fn write_one(&mut self, header: &BlockHeader, height: u32) -> StorageResult<()> {
        ensure_contiguous(self.local_height(), height)?;
        self.put(height, *header);
        self.writes += 1;
        Ok(())
    }

    fn write_chunk(&mut self, index: u32, raw: &[u8]) -> StorageResult<()> {
        let headers = BlockHeader::decode_many(raw)
            .map_err(|e| StorageError::Corruption(format!("chunk {}: {}", index, e)))?;
        let (start, last) = chunk_span(index, self.chunk_size, headers.len())?;
        ensure_contiguous(self.local_height(), start)?;
        for (height, header) in (start..=last).zip(headers) {
            self.put(height, header);
        }
        self.writes += 1;
        Ok(())
    }

    fn truncate_to(&mut self, height: Option<u32>) -> StorageResult<()> {
        let keep = height.map_or(0, |h| h as usize + 1);
        self.headers.truncate(keep);
        Ok(())
    }
}
