use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{NetworkError, NetworkResult};
use crate::header::BlockHeader;
use crate::network::HeaderNetwork;
use crate::types::PeerId;

use super::encode_headers;

/// A request observed by [`MockNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedRequest {
    Header {
        peer: PeerId,
        height: u32,
    },
    Chunk {
        peer: PeerId,
        index: u32,
    },
}

/// Mock network serving each peer's view of the chain from memory.
pub struct MockNetwork {
    chunk_size: u32,
    chains: Mutex<HashMap<PeerId, Vec<BlockHeader>>>,
    chunk_overrides: Mutex<HashMap<(PeerId, u32), Vec<u8>>>,
    failures: Mutex<HashMap<PeerId, NetworkError>>,
    unresponsive: Mutex<HashSet<PeerId>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockNetwork {
    pub fn new(chunk_size: u32) -> Self {
        Self {
            chunk_size,
            chains: Mutex::new(HashMap::new()),
            chunk_overrides: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            unresponsive: Mutex::new(HashSet::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sets the headers `peer` serves, indexed by height from 0.
    pub fn set_chain(&self, peer: PeerId, headers: Vec<BlockHeader>) {
        self.chains.lock().unwrap().insert(peer, headers);
    }

    /// Serves `raw` instead of the peer's real chunk `index`.
    pub fn override_chunk(&self, peer: PeerId, index: u32, raw: Vec<u8>) {
        self.chunk_overrides.lock().unwrap().insert((peer, index), raw);
    }

    /// Every request to `peer` fails with `error`.
    pub fn fail_peer(&self, peer: PeerId, error: NetworkError) {
        self.failures.lock().unwrap().insert(peer, error);
    }

    /// Requests to `peer` never complete.
    pub fn silence_peer(&self, peer: PeerId) {
        self.unresponsive.lock().unwrap().insert(peer);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn header_requests(&self) -> Vec<u32> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                RecordedRequest::Header {
                    height,
                    ..
                } => Some(height),
                RecordedRequest::Chunk {
                    ..
                } => None,
            })
            .collect()
    }

    pub fn chunk_requests(&self) -> Vec<u32> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                RecordedRequest::Chunk {
                    index,
                    ..
                } => Some(index),
                RecordedRequest::Header {
                    ..
                } => None,
            })
            .collect()
    }

    async fn check_peer(&self, peer: PeerId) -> NetworkResult<()> {
        if let Some(error) = self.failures.lock().unwrap().get(&peer).cloned() {
            return Err(error);
        }
        let silent = self.unresponsive.lock().unwrap().contains(&peer);
        if silent {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl HeaderNetwork for MockNetwork {
    async fn request_header(&self, peer: PeerId, height: u32) -> NetworkResult<BlockHeader> {
        self.requests.lock().unwrap().push(RecordedRequest::Header {
            peer,
            height,
        });
        self.check_peer(peer).await?;

        let chains = self.chains.lock().unwrap();
        chains
            .get(&peer)
            .and_then(|chain| chain.get(height as usize))
            .copied()
            .ok_or_else(|| NetworkError::Protocol(format!("{} has no header at {}", peer, height)))
    }

    async fn request_chunk(&self, peer: PeerId, index: u32) -> NetworkResult<Vec<u8>> {
        self.requests.lock().unwrap().push(RecordedRequest::Chunk {
            peer,
            index,
        });
        self.check_peer(peer).await?;

        if let Some(raw) = self.chunk_overrides.lock().unwrap().get(&(peer, index)) {
            return Ok(raw.clone());
        }

        let chains = self.chains.lock().unwrap();
        let chain = chains
            .get(&peer)
            .ok_or_else(|| NetworkError::Protocol(format!("{} serves no chain", peer)))?;
        let start = (index * self.chunk_size) as usize;
        if start >= chain.len() {
            return Ok(Vec::new());
        }
        let end = (start + self.chunk_size as usize).min(chain.len());
        Ok(encode_headers(&chain[start..end]))
    }
}
