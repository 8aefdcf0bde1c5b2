//! Flat-file header store.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncConfig;
use crate::error::{StorageError, StorageResult};
use crate::header::BlockHeader;

use super::bootstrap::BootstrapLoader;
use super::cache::HeaderCache;
use super::lockfile::LockFile;
use super::{chunk_span, ensure_contiguous, HeaderStorage, RECORD_SIZE};

/// Header store backed by a single file of concatenated 80-byte records.
///
/// The tip height is recomputed from the file length after every write, so
/// the file itself is the only source of truth; the cache only saves reads.
pub struct FlatFileStore {
    path: PathBuf,
    file: File,
    chunk_size: u32,
    local_height: Option<u32>,
    cache: HeaderCache,
    _lock: LockFile,
}

impl FlatFileStore {
    /// Opens (creating if absent) the store at `path`.
    pub fn open(path: impl AsRef<Path>, chunk_size: u32, cache_size: usize) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |source: io::Error| StorageError::Unavailable {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(unavailable)?;
            }
        }

        let lock = LockFile::acquire(path.with_extension("lock"))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(unavailable)?;

        let mut store = Self {
            path,
            file,
            chunk_size,
            local_height: None,
            cache: HeaderCache::new(cache_size),
            _lock: lock,
        };
        store.drop_partial_record()?;
        store.refresh_height()?;

        tracing::info!(
            "Opened header store {:?} at height {}",
            store.path,
            store.local_height_i64()
        );

        Ok(store)
    }

    /// Opens the store described by `config`.
    pub fn open_with_config(config: &SyncConfig) -> StorageResult<Self> {
        Self::open(config.headers_file(), config.chunk_size, config.cache_kgw_size)
    }

    /// Opens the store, first asking `loader` for a snapshot when the file
    /// does not exist yet. Loader failures are logged and leave an empty store.
    pub async fn open_with_bootstrap<L: BootstrapLoader + ?Sized>(
        config: &SyncConfig,
        loader: &L,
    ) -> StorageResult<Self> {
        let path = config.headers_file();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Unavailable {
                    path: path.clone(),
                    source,
                })?;
            }

            match loader.fetch(&path).await {
                Ok(()) => tracing::info!("Bootstrapped header store from {}", loader.describe()),
                Err(e) => {
                    tracing::warn!(
                        "Header bootstrap from {} failed, starting from an empty store: {}",
                        loader.describe(),
                        e
                    );
                    if path.exists() {
                        fs::remove_file(&path)?;
                    }
                }
            }
        }

        Self::open_with_config(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Trims a trailing partial record left by an interrupted append.
    fn drop_partial_record(&mut self) -> StorageResult<()> {
        let len = self.file.metadata()?.len();
        let excess = len % RECORD_SIZE;
        if excess != 0 {
            tracing::warn!(
                "Header store {:?} has {} trailing bytes, truncating to the last whole record",
                self.path,
                excess
            );
            self.file.set_len(len - excess)?;
        }
        Ok(())
    }

    fn refresh_height(&mut self) -> StorageResult<()> {
        let records = self.file.metadata()?.len() / RECORD_SIZE;
        self.local_height = match records {
            0 => None,
            n => Some(u32::try_from(n - 1).map_err(|_| {
                StorageError::Corruption(format!("{} records exceed the height range", n))
            })?),
        };
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> StorageResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.file.sync_data()?;
        Ok(())
    }
}

impl HeaderStorage for FlatFileStore {
    fn local_height(&self) -> Option<u32> {
        self.local_height
    }

    fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    fn read(&mut self, height: u32) -> StorageResult<Option<BlockHeader>> {
        match self.local_height {
            Some(tip) if height <= tip => {}
            _ => return Ok(None),
        }

        if let Some(header) = self.cache.get(height) {
            return Ok(Some(header));
        }

        let mut buf = [0u8; BlockHeader::SIZE];
        self.file.seek(SeekFrom::Start(u64::from(height) * RECORD_SIZE))?;
        match self.file.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let header = BlockHeader::decode(&buf)
            .map_err(|e| StorageError::Corruption(format!("height {}: {}", height, e)))?;
        self.cache.insert(height, header);
        Ok(Some(header))
    }

    fn write_one(&mut self, header: &BlockHeader, height: u32) -> StorageResult<()> {
        ensure_contiguous(self.local_height, height)?;
        self.write_at(u64::from(height) * RECORD_SIZE, &header.encode())?;
        self.cache.insert(height, *header);
        self.refresh_height()?;
        tracing::trace!("Stored header {} at height {}", header.block_hash(), height);
        Ok(())
    }

    fn write_chunk(&mut self, index: u32, raw: &[u8]) -> StorageResult<()> {
        if raw.len() as u64 % RECORD_SIZE != 0 {
            return Err(StorageError::Corruption(format!(
                "chunk {} is {} bytes, not a whole number of records",
                index,
                raw.len()
            )));
        }
        let count = raw.len() / BlockHeader::SIZE;
        let (start, last) = chunk_span(index, self.chunk_size, count)?;
        ensure_contiguous(self.local_height, start)?;

        self.write_at(u64::from(start) * RECORD_SIZE, raw)?;
        self.cache.invalidate(start..=last);
        self.refresh_height()?;
        tracing::debug!(
            "Stored chunk {} ({} headers), tip is now {}",
            index,
            count,
            self.local_height_i64()
        );
        Ok(())
    }

    fn truncate_to(&mut self, height: Option<u32>) -> StorageResult<()> {
        let keep = height.map_or(0, |h| u64::from(h) + 1);
        if keep * RECORD_SIZE >= self.file.metadata()?.len() {
            return Ok(());
        }
        self.file.set_len(keep * RECORD_SIZE)?;
        self.file.sync_data()?;
        self.cache.invalidate_from(keep as u32);
        self.refresh_height()?;
        tracing::info!("Truncated header store to height {}", self.local_height_i64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockHash;
    use tempfile::TempDir;

    fn linked_headers(count: u32) -> Vec<BlockHeader> {
        let mut prev = BlockHash::all_zeros();
        (0..count)
            .map(|nonce| {
                let header = BlockHeader {
                    prev_blockhash: prev,
                    nonce,
                    ..BlockHeader::default()
                };
                prev = header.block_hash();
                header
            })
            .collect()
    }

    fn open(dir: &TempDir) -> FlatFileStore {
        FlatFileStore::open(dir.path().join("blockchain_headers"), 4, 8).unwrap()
    }

    #[test]
    fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        assert_eq!(store.local_height(), None);
        assert_eq!(store.local_height_i64(), -1);
        assert!(store.read(0).unwrap().is_none());
        assert!(store.path().exists());
    }

    #[test]
    fn test_write_one_extends_height() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let headers = linked_headers(3);

        for (height, header) in headers.iter().enumerate() {
            store.write_one(header, height as u32).unwrap();
            assert_eq!(store.local_height(), Some(height as u32));
            assert_eq!(store.read(height as u32).unwrap(), Some(*header));
        }
        assert!(store.read(3).unwrap().is_none());
    }

    #[test]
    fn test_write_rejects_gap() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let header = BlockHeader::default();

        assert!(matches!(
            store.write_one(&header, 1),
            Err(StorageError::OutOfOrderWrite {
                height: 1,
                next: 0
            })
        ));
        assert_eq!(store.local_height(), None);
    }

    #[test]
    fn test_write_chunk_and_reopen() {
        let dir = TempDir::new().unwrap();
        let headers = linked_headers(8);
        let raw: Vec<u8> = headers.iter().flat_map(|h| h.encode()).collect();

        {
            let mut store = open(&dir);
            store.write_chunk(0, &raw[..4 * 80]).unwrap();
            store.write_chunk(1, &raw[4 * 80..]).unwrap();
            assert_eq!(store.local_height(), Some(7));
        }

        let mut store = open(&dir);
        assert_eq!(store.local_height(), Some(7));
        assert_eq!(store.read_range(0..8).unwrap(), headers);
        let file_len = fs::metadata(store.path()).unwrap().len();
        assert_eq!(file_len, 8 * RECORD_SIZE);
    }

    #[test]
    fn test_chunk_write_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        let original = linked_headers(4);
        for (height, header) in original.iter().enumerate() {
            store.write_one(header, height as u32).unwrap();
        }

        let mut replacement = original.clone();
        replacement[2].nonce = 1000;
        let raw: Vec<u8> = replacement.iter().flat_map(|h| h.encode()).collect();
        store.write_chunk(0, &raw).unwrap();

        assert_eq!(store.read(2).unwrap(), Some(replacement[2]));
    }

    #[test]
    fn test_partial_record_truncated_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blockchain_headers");
        let headers = linked_headers(2);
        let mut raw: Vec<u8> = headers.iter().flat_map(|h| h.encode()).collect();
        raw.extend_from_slice(&[0xaa; 17]);
        fs::write(&path, &raw).unwrap();

        let mut store = FlatFileStore::open(&path, 4, 8).unwrap();
        assert_eq!(store.local_height(), Some(1));
        assert_eq!(store.read(1).unwrap(), Some(headers[1]));
        assert_eq!(fs::metadata(&path).unwrap().len(), 2 * RECORD_SIZE);
    }

    #[test]
    fn test_truncate_to() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        for (height, header) in linked_headers(5).iter().enumerate() {
            store.write_one(header, height as u32).unwrap();
        }

        store.truncate_to(Some(2)).unwrap();
        assert_eq!(store.local_height(), Some(2));
        assert!(store.read(3).unwrap().is_none());

        store.truncate_to(None).unwrap();
        assert_eq!(store.local_height(), None);
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _store = open(&dir);
        let second = FlatFileStore::open(dir.path().join("blockchain_headers"), 4, 8);
        assert!(matches!(second, Err(StorageError::DirectoryLocked(_))));
    }
}
