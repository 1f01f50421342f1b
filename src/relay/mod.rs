//! Chunk relays and the download proxy.
//!
//! A relay accepts one encrypted chunk and hands back an opaque link. The
//! proxy turns a link back into bytes, or into a [`SubChunkManifest`] when
//! the stored chunk is too large for one response.

pub mod http;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{RelayError, TransferError};
use crate::{Locator, Provider};

/// One encrypted chunk as submitted to a relay. The same payload is reused
/// for every relay in a chain.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub index: usize,
    /// `nonce || ciphertext || tag`
    pub data: Vec<u8>,
    pub key_base64: String,
    pub file_name: String,
}

#[async_trait]
pub trait ChunkRelay: Send + Sync {
    fn name(&self) -> &str;
    fn provider(&self) -> &Provider;
    async fn upload_chunk(&self, payload: &ChunkPayload) -> Result<String, RelayError>;
}

/// Inclusive byte range, sent as `bytes=<start>-<end>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes={}-{}", self.start, self.end)
    }
}

impl Serialize for ByteRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchRequest {
    pub url: String,
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<ByteRange>,
}

/// Proxy reply when a stored chunk exceeds its single-response limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubChunkManifest {
    pub total_chunks: u32,
    pub max_chunk_size: u64,
    pub file_size: u64,
}

impl SubChunkManifest {
    /// Rejects zero fields and part counts that disagree with
    /// `ceil(file_size / max_chunk_size)`.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.total_chunks == 0 || self.max_chunk_size == 0 || self.file_size == 0 {
            return Err(RelayError::InvalidResponse(format!(
                "unusable sub-chunk manifest: {:?}",
                self
            )));
        }
        let expected = self.file_size.div_ceil(self.max_chunk_size);
        if expected != u64::from(self.total_chunks) {
            return Err(RelayError::InvalidResponse(format!(
                "sub-chunk manifest announces {} parts, {} bytes in {}-byte parts needs {}",
                self.total_chunks, self.file_size, self.max_chunk_size, expected
            )));
        }
        Ok(())
    }

    /// Inclusive ranges covering `file_size`. Only meaningful after
    /// [`validate`](Self::validate) succeeded.
    pub fn ranges(&self) -> impl Iterator<Item = ByteRange> + '_ {
        let last = self.file_size.saturating_sub(1);
        (0..u64::from(self.total_chunks))
            .map_while(move |j| j.checked_mul(self.max_chunk_size))
            .filter(move |start| *start <= last)
            .map(move |start| {
                let end = start
                    .checked_add(self.max_chunk_size - 1)
                    .map_or(last, |end| end.min(last));
                ByteRange { start, end }
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProxyResponse {
    Bytes(Vec<u8>),
    Chunked(SubChunkManifest),
}

#[async_trait]
pub trait RelayProxy: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<ProxyResponse, RelayError>;
}

/// Ordered relays tried one after another with the same payload.
#[derive(Clone)]
pub struct RelayChain {
    relays: Vec<Arc<dyn ChunkRelay>>,
    attempt_timeout: Duration,
}

impl RelayChain {
    pub fn new(relays: Vec<Arc<dyn ChunkRelay>>, attempt_timeout: Duration) -> Self {
        Self { relays, attempt_timeout }
    }

    /// The relay serving `provider` first, then every other relay in the
    /// order given.
    pub fn for_provider(
        provider: &Provider,
        relays: &[Arc<dyn ChunkRelay>],
        attempt_timeout: Duration,
    ) -> Self {
        let (mut ordered, rest): (Vec<_>, Vec<_>) = relays
            .iter()
            .cloned()
            .partition(|relay| relay.provider() == provider);
        ordered.extend(rest);
        Self::new(ordered, attempt_timeout)
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.relays.iter().map(|relay| relay.name()).collect()
    }

    /// Submit one chunk. The first relay to succeed wins; when all fail the
    /// first and last errors are reported.
    pub async fn submit(
        &self,
        record_provider: &Provider,
        payload: &ChunkPayload,
        cancel: &CancellationToken,
    ) -> Result<Locator, TransferError> {
        let mut errors: Vec<RelayError> = Vec::new();

        for (attempt, relay) in self.relays.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            if attempt > 0 {
                info!(chunk = payload.index, relay = relay.name(), "trying fallback relay");
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                outcome = timeout(self.attempt_timeout, relay.upload_chunk(payload)) => outcome,
            };

            match outcome {
                Ok(Ok(link)) => {
                    info!(chunk = payload.index, relay = relay.name(), "chunk stored");
                    let locator = if relay.provider() == record_provider {
                        Locator::new(link)
                    } else {
                        Locator::via(link, relay.provider().clone())
                    };
                    return Ok(locator);
                }
                Ok(Err(err)) => {
                    warn!(chunk = payload.index, relay = relay.name(), error = %err, "relay rejected chunk");
                    errors.push(err);
                }
                Err(_) => {
                    warn!(chunk = payload.index, relay = relay.name(), "relay timed out");
                    errors.push(RelayError::Timeout(self.attempt_timeout));
                }
            }
        }

        let mut errors = errors.into_iter();
        let primary = errors
            .next()
            .unwrap_or_else(|| RelayError::Transport("no relay configured".to_string()));
        let fallback = errors.last();
        Err(TransferError::ChunkUploadFailed {
            index: payload.index,
            primary,
            fallback,
        })
    }
}
