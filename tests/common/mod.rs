#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_drive::chunk::{ChunkPlanner, ChunkSizes};
use relay_drive::relay::{
    ChunkPayload, ChunkRelay, FetchRequest, ProxyResponse, RelayProxy, SubChunkManifest,
};
use relay_drive::store::{Catalog, LocalStore};
use relay_drive::transfer::{Downloader, UploadOptions, Uploader};
use relay_drive::{DriveSession, Provider, RelayError};
use tokio::sync::Mutex;

/// Stored chunk bytes keyed by link, shared between relays and the proxy.
pub type Blobs = Arc<Mutex<HashMap<String, Vec<u8>>>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    Succeed,
    Fail(u16),
    /// Succeed for the first `n` chunks, then fail.
    FailAfter(u32),
    Hang,
}

pub struct MockRelay {
    name: String,
    provider: Provider,
    behavior: Behavior,
    blobs: Blobs,
    pub attempts: Arc<Mutex<u32>>,
    pub payloads: Arc<Mutex<Vec<ChunkPayload>>>,
}

impl MockRelay {
    pub fn new(provider: Provider, behavior: Behavior, blobs: &Blobs) -> Self {
        Self {
            name: provider.to_string(),
            provider,
            behavior,
            blobs: Arc::clone(blobs),
            attempts: Arc::new(Mutex::new(0)),
            payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn get_attempts(&self) -> u32 {
        *self.attempts.lock().await
    }
}

#[async_trait]
impl ChunkRelay for MockRelay {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &Provider {
        &self.provider
    }

    async fn upload_chunk(&self, payload: &ChunkPayload) -> Result<String, RelayError> {
        let attempt = {
            let mut attempts = self.attempts.lock().await;
            *attempts += 1;
            *attempts
        };

        let fail = match self.behavior {
            Behavior::Succeed => None,
            Behavior::Fail(status) => Some(status),
            Behavior::FailAfter(n) if attempt > n => Some(500),
            Behavior::FailAfter(_) => None,
            Behavior::Hang => {
                std::future::pending::<()>().await;
                None
            }
        };
        if let Some(status) = fail {
            return Err(RelayError::Http {
                status,
                body: format!("{} refused chunk {} (attempt {})", self.name, payload.index, attempt),
            });
        }

        self.payloads.lock().await.push(payload.clone());
        let link = format!("{}://{}/{}", self.name, payload.file_name, attempt);
        self.blobs.lock().await.insert(link.clone(), payload.data.clone());
        Ok(link)
    }
}

/// Serves stored blobs; anything larger than `max_response` is answered
/// with a sub-chunk manifest, like the real proxy.
pub struct MockProxy {
    blobs: Blobs,
    max_response: Option<u64>,
    pub requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl MockProxy {
    pub fn new(blobs: &Blobs, max_response: Option<u64>) -> Self {
        Self {
            blobs: Arc::clone(blobs),
            max_response,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn recorded(&self) -> Vec<FetchRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl RelayProxy for MockProxy {
    async fn fetch(&self, request: &FetchRequest) -> Result<ProxyResponse, RelayError> {
        self.requests.lock().await.push(request.clone());

        let blobs = self.blobs.lock().await;
        let data = blobs.get(&request.url).ok_or_else(|| RelayError::Http {
            status: 500,
            body: format!("Remote server error: 404 for {}", request.url),
        })?;

        if let Some(range) = request.range {
            let end = (range.end as usize).min(data.len() - 1);
            return Ok(ProxyResponse::Bytes(data[range.start as usize..=end].to_vec()));
        }

        match self.max_response {
            Some(max) if data.len() as u64 > max => Ok(ProxyResponse::Chunked(SubChunkManifest {
                total_chunks: (data.len() as u64).div_ceil(max) as u32,
                max_chunk_size: max,
                file_size: data.len() as u64,
            })),
            _ => Ok(ProxyResponse::Bytes(data.clone())),
        }
    }
}

pub fn blobs() -> Blobs {
    Arc::new(Mutex::new(HashMap::new()))
}

pub fn small_chunks(size: u64) -> ChunkPlanner {
    ChunkPlanner::new(ChunkSizes { discord: size, telegram: size, default: size })
}

pub fn options() -> UploadOptions {
    UploadOptions {
        chunk_delay: Duration::from_millis(500),
        attempt_timeout: Duration::from_secs(5),
        ..UploadOptions::default()
    }
}

pub fn uploader(relays: Vec<Arc<MockRelay>>, planner: ChunkPlanner, options: UploadOptions) -> Uploader {
    let relays = relays.into_iter().map(|r| r as Arc<dyn ChunkRelay>).collect();
    Uploader::new(relays, planner, options)
}

/// Deterministic, non-repeating test content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + i / 251) as u8).collect()
}

pub struct Harness {
    pub blobs: Blobs,
    pub discord: Arc<MockRelay>,
    pub telegram: Arc<MockRelay>,
    pub proxy: Arc<MockProxy>,
    pub local: Arc<LocalStore>,
}

impl Harness {
    pub fn new(discord: Behavior, telegram: Behavior) -> Self {
        let blobs = blobs();
        Self {
            discord: Arc::new(MockRelay::new(Provider::Discord, discord, &blobs)),
            telegram: Arc::new(MockRelay::new(Provider::Telegram, telegram, &blobs)),
            proxy: Arc::new(MockProxy::new(&blobs, None)),
            local: Arc::new(LocalStore::in_memory()),
            blobs,
        }
    }

    pub fn session(&self, chunk_size: u64) -> DriveSession {
        DriveSession::new(
            Catalog::local_only(Arc::clone(&self.local)),
            uploader(
                vec![Arc::clone(&self.discord), Arc::clone(&self.telegram)],
                small_chunks(chunk_size),
                options(),
            ),
            Downloader::new(Arc::clone(&self.proxy) as Arc<dyn RelayProxy>),
            Provider::Discord,
        )
    }
}
