//! Peer request seam used by the sync worker.
//!
//! The wire protocol lives outside this crate. The worker only needs to ask a
//! specific peer for one header or one chunk and wait for the reply.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{NetworkError, NetworkResult};
use crate::header::BlockHeader;
use crate::types::PeerId;

/// Request/response access to connected peers.
#[async_trait]
pub trait HeaderNetwork: Send + Sync {
    /// Ask `peer` for its header at `height`.
    async fn request_header(&self, peer: PeerId, height: u32) -> NetworkResult<BlockHeader>;

    /// Ask `peer` for chunk `index` as raw concatenated 80-byte records.
    async fn request_chunk(&self, peer: PeerId, index: u32) -> NetworkResult<Vec<u8>>;
}

#[async_trait]
impl<T: HeaderNetwork + ?Sized> HeaderNetwork for Arc<T> {
    async fn request_header(&self, peer: PeerId, height: u32) -> NetworkResult<BlockHeader> {
        (**self).request_header(peer, height).await
    }

    async fn request_chunk(&self, peer: PeerId, index: u32) -> NetworkResult<Vec<u8>> {
        (**self).request_chunk(peer, index).await
    }
}

/// Awaits `request` for at most `timeout`, giving up early on shutdown.
pub(crate) async fn bounded_request<T>(
    request: impl Future<Output = NetworkResult<T>>,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> NetworkResult<T> {
    tokio::select! {
        biased;

        _ = shutdown.cancelled() => Err(NetworkError::Cancelled),
        result = tokio::time::timeout(timeout, request) => {
            result.unwrap_or(Err(NetworkError::Timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_request_passes_result_through() {
        let shutdown = CancellationToken::new();
        let result = bounded_request(async { Ok(7u32) }, Duration::from_secs(1), &shutdown).await;
        assert_eq!(result, Ok(7));

        let result: NetworkResult<u32> = bounded_request(
            async { Err(NetworkError::PeerDisconnected) },
            Duration::from_secs(1),
            &shutdown,
        )
        .await;
        assert_eq!(result, Err(NetworkError::PeerDisconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_request_times_out() {
        let shutdown = CancellationToken::new();
        let result: NetworkResult<u32> =
            bounded_request(std::future::pending(), Duration::from_secs(5), &shutdown).await;
        assert_eq!(result, Err(NetworkError::Timeout));
    }

    #[tokio::test]
    async fn test_bounded_request_observes_shutdown() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let result: NetworkResult<u32> =
            bounded_request(std::future::pending(), Duration::from_secs(3600), &shutdown).await;
        assert_eq!(result, Err(NetworkError::Cancelled));
    }
}
