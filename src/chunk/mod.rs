use serde::{Deserialize, Serialize};

use crate::Provider;

pub const MIB: u64 = 1024 * 1024;
pub const DISCORD_CHUNK_SIZE: u64 = 8 * MIB;
pub const TELEGRAM_CHUNK_SIZE: u64 = 50 * MIB;
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * MIB;

/// Per-provider chunk sizes, each within that relay's attachment limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSizes {
    pub discord: u64,
    pub telegram: u64,
    pub default: u64,
}

impl Default for ChunkSizes {
    fn default() -> Self {
        Self {
            discord: DISCORD_CHUNK_SIZE,
            telegram: TELEGRAM_CHUNK_SIZE,
            default: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkSizes {
    pub fn for_provider(&self, provider: &Provider) -> u64 {
        let size = match provider {
            Provider::Discord => self.discord,
            Provider::Telegram => self.telegram,
            Provider::Other(_) => self.default,
        };
        size.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: usize,
    pub offset: u64,
    pub len: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunk_size: u64,
    pub chunk_count: u32,
}

impl ChunkPlan {
    /// Contiguous ranges covering the file, in order.
    pub fn ranges(&self) -> impl Iterator<Item = ChunkRange> + '_ {
        (0..self.chunk_count as usize).map(move |index| {
            let offset = index as u64 * self.chunk_size;
            let end = (offset + self.chunk_size).min(self.file_size);
            ChunkRange { index, offset, len: end - offset }
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkPlanner {
    sizes: ChunkSizes,
}

impl ChunkPlanner {
    pub fn new(sizes: ChunkSizes) -> Self {
        Self { sizes }
    }

    pub fn sizes(&self) -> &ChunkSizes {
        &self.sizes
    }

    /// A zero-byte file plans zero chunks; callers reject it before uploading.
    pub fn plan(&self, file_size: u64, provider: &Provider) -> ChunkPlan {
        let chunk_size = self.sizes.for_provider(provider);
        ChunkPlan {
            file_size,
            chunk_size,
            chunk_count: file_size.div_ceil(chunk_size) as u32,
        }
    }
}
