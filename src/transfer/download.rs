use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::progress::{ProgressStats, ProgressTracker};
use crate::crypto::{decrypt_chunk, NONCE_SIZE, TAG_SIZE};
use crate::error::{RelayError, TransferError};
use crate::relay::{FetchRequest, ProxyResponse, RelayProxy, SubChunkManifest};
use crate::FileRecord;

pub struct Downloader {
    proxy: Arc<dyn RelayProxy>,
}

impl Downloader {
    pub fn new(proxy: Arc<dyn RelayProxy>) -> Self {
        Self { proxy }
    }

    /// Fetch, reassemble and decrypt every chunk of `record`, writing the
    /// plaintext to `writer` in chunk order. Returns the number of bytes
    /// written. At most one chunk is held in memory at a time.
    ///
    /// Chunks that authenticated before a failure have already reached
    /// `writer`; callers writing to a destination the user sees must stage
    /// the output and discard it on error.
    pub async fn download<W>(
        &self,
        record: &FileRecord,
        writer: &mut W,
        mut on_progress: impl FnMut(&ProgressStats) + Send,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let key = record.encryption.key.as_ref().ok_or(TransferError::MissingKey)?;
        let locators = &record.encryption.chunk_locators;
        if locators.is_empty() {
            return Err(TransferError::InvalidRecord(format!("file {} has no chunks", record.id)));
        }

        info!(file = %record.name, id = %record.id, chunks = locators.len(), "starting download");

        let total = locators.len() as f64;
        let mut tracker = ProgressTracker::start(record.size);
        let mut written = 0u64;

        for (index, locator) in locators.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let request = FetchRequest {
                url: locator.link.clone(),
                provider: locator.provider(&record.encryption.provider).clone(),
                range: None,
            };

            let stored = match self.fetch(index, &request, cancel).await? {
                ProxyResponse::Bytes(bytes) => bytes,
                ProxyResponse::Chunked(manifest) => {
                    // No stored chunk can be larger than the whole file plus one seal.
                    let max_stored = record.size.saturating_add((NONCE_SIZE + TAG_SIZE) as u64);
                    check_manifest(index, &manifest, max_stored)?;
                    debug!(chunk = index, parts = manifest.total_chunks, "chunk needs ranged download");
                    let parts = manifest.total_chunks as f64;
                    let mut assembled = Vec::new();

                    for (part, range) in manifest.ranges().enumerate() {
                        if cancel.is_cancelled() {
                            return Err(TransferError::Cancelled);
                        }
                        let ranged = FetchRequest { range: Some(range), ..request.clone() };
                        match self.fetch(index, &ranged, cancel).await? {
                            ProxyResponse::Bytes(bytes) if bytes.len() as u64 == range.end - range.start + 1 => {
                                assembled.extend_from_slice(&bytes)
                            }
                            ProxyResponse::Bytes(bytes) => {
                                return Err(TransferError::ChunkFetchFailed {
                                    index,
                                    source: RelayError::InvalidResponse(format!(
                                        "ranged request {} answered with {} bytes",
                                        range,
                                        bytes.len()
                                    )),
                                });
                            }
                            ProxyResponse::Chunked(_) => {
                                return Err(TransferError::ChunkFetchFailed {
                                    index,
                                    source: RelayError::InvalidResponse(format!(
                                        "ranged request {} answered with another manifest",
                                        range
                                    )),
                                });
                            }
                        }
                        on_progress(tracker.update_fraction((index as f64 + (part + 1) as f64 / parts) / total));
                    }
                    assembled
                }
            };

            let plaintext = decrypt_chunk(key, index, &stored)?;
            drop(stored);
            writer.write_all(&plaintext).await?;
            written += plaintext.len() as u64;

            on_progress(tracker.update_fraction((index + 1) as f64 / total));
        }

        writer.flush().await?;

        if written != record.size {
            return Err(TransferError::SizeMismatch { expected: record.size, actual: written });
        }

        info!(file = %record.name, bytes = written, "download complete");
        Ok(written)
    }

    /// Convenience wrapper collecting the whole file in memory.
    pub async fn download_to_vec(
        &self,
        record: &FileRecord,
        on_progress: impl FnMut(&ProgressStats) + Send,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransferError> {
        let mut out = Vec::new();
        self.download(record, &mut out, on_progress, cancel).await?;
        Ok(out)
    }

    async fn fetch(
        &self,
        index: usize,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<ProxyResponse, TransferError> {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            outcome = self.proxy.fetch(request) => outcome,
        };
        outcome.map_err(|source| TransferError::ChunkFetchFailed { index, source })
    }
}

fn check_manifest(index: usize, manifest: &SubChunkManifest, max_stored: u64) -> Result<(), TransferError> {
    manifest
        .validate()
        .map_err(|source| TransferError::ChunkFetchFailed { index, source })?;
    if manifest.file_size > max_stored {
        return Err(TransferError::ChunkFetchFailed {
            index,
            source: RelayError::InvalidResponse(format!(
                "sub-chunk manifest announces {} bytes, a chunk of this file holds at most {}",
                manifest.file_size, max_stored
            )),
        });
    }
    Ok(())
}
