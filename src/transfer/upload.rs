use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::progress::{ProgressStats, ProgressTracker};
use super::validation::validate_record;
use crate::chunk::ChunkPlanner;
use crate::crypto::{encrypt_chunk, FileKey};
use crate::error::TransferError;
use crate::relay::{ChunkPayload, ChunkRelay, RelayChain};
use crate::{Category, EncryptionEnvelope, FileRecord, Provider, FALLBACK_MIME};

pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub max_file_size: u64,
    /// Pause between successful chunks, never after the last one.
    pub chunk_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            chunk_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub mime: Option<String>,
    pub size: u64,
    pub provider: Provider,
    pub folder_ref: Option<Uuid>,
}

pub struct Uploader {
    relays: Vec<Arc<dyn ChunkRelay>>,
    planner: ChunkPlanner,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(relays: Vec<Arc<dyn ChunkRelay>>, planner: ChunkPlanner, options: UploadOptions) -> Self {
        Self { relays, planner, options }
    }

    pub fn planner(&self) -> &ChunkPlanner {
        &self.planner
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Encrypt `reader` chunk by chunk and push every chunk through the relay
    /// chain. Nothing is persisted here; the caller stores the returned record.
    pub async fn upload<R>(
        &self,
        request: UploadRequest,
        reader: &mut R,
        mut on_progress: impl FnMut(&ProgressStats) + Send,
        cancel: &CancellationToken,
    ) -> Result<FileRecord, TransferError>
    where
        R: AsyncRead + Unpin + Send,
    {
        if request.size > self.options.max_file_size {
            return Err(TransferError::FileTooLarge {
                size: request.size,
                max: self.options.max_file_size,
            });
        }
        if request.size == 0 {
            return Err(TransferError::EmptyFile);
        }

        let key = FileKey::generate();
        let key_base64 = key.to_base64();
        let plan = self.planner.plan(request.size, &request.provider);
        let chain = RelayChain::for_provider(&request.provider, &self.relays, self.options.attempt_timeout);

        info!(
            file = %request.name,
            size = request.size,
            provider = %request.provider,
            chunk_size = plan.chunk_size,
            chunks = plan.chunk_count,
            relays = ?chain.names(),
            "starting upload"
        );

        let mut tracker = ProgressTracker::start(request.size);
        let mut locators = Vec::with_capacity(plan.chunk_count as usize);
        let last_index = plan.chunk_count as usize - 1;

        for range in plan.ranges() {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let mut plaintext = vec![0u8; range.len as usize];
            reader.read_exact(&mut plaintext).await?;

            let payload = ChunkPayload {
                index: range.index,
                data: encrypt_chunk(&key, &plaintext)?,
                key_base64: key_base64.clone(),
                file_name: request.name.clone(),
            };
            drop(plaintext);
            debug!(chunk = range.index, plain = range.len, stored = payload.data.len(), "chunk encrypted");

            let locator = chain.submit(&request.provider, &payload, cancel).await?;
            locators.push(locator);

            on_progress(tracker.update(range.offset + range.len));

            if range.index < last_index {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                    _ = sleep(self.options.chunk_delay) => {}
                }
            }
        }

        let mime = request
            .mime
            .filter(|mime| !mime.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        let record = FileRecord {
            id: Uuid::new_v4(),
            name: request.name,
            size: request.size,
            category: Category::from_mime(&mime),
            mime,
            created_at: Utc::now(),
            folder_ref: request.folder_ref,
            encryption: EncryptionEnvelope {
                key: Some(key),
                provider: request.provider,
                chunk_locators: locators,
            },
            share_id: None,
            is_public: false,
        };
        validate_record(&record, &self.planner)?;

        info!(file = %record.name, id = %record.id, "upload complete");
        Ok(record)
    }
}
