use std::time::Duration;

use thiserror::Error;

/// Failure of a single round trip to a relay endpoint or the relay proxy.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("relay returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("relay request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid relay response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("file is too large: {size} bytes (maximum {max})")]
    FileTooLarge { size: u64, max: u64 },
    #[error("refusing to upload an empty file")]
    EmptyFile,
    #[error("chunk {index} failed on every relay (primary: {primary}; fallback: {})", describe(.fallback))]
    ChunkUploadFailed {
        index: usize,
        primary: RelayError,
        fallback: Option<RelayError>,
    },
    #[error("file record has no encryption key; the record is corrupted")]
    MissingKey,
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("chunk {index} is too small ({len} bytes), expected at least 12 (nonce)")]
    ChunkTooSmall { index: usize, len: usize },
    #[error("chunk {index} failed authentication")]
    DecryptionFailed { index: usize },
    #[error("chunk {index} could not be fetched: {source}")]
    ChunkFetchFailed {
        index: usize,
        #[source]
        source: RelayError,
    },
    #[error("encryption error: {0}")]
    Encryption(String),
    #[error("file record is inconsistent: {0}")]
    InvalidRecord(String),
    #[error("restored {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("transfer cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe(fallback: &Option<RelayError>) -> String {
    match fallback {
        Some(err) => err.to_string(),
        None => "none configured".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store transport error: {0}")]
    Transport(String),
    #[error("store returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("folder {0} is part of a parent cycle")]
    FolderCycle(uuid::Uuid),
    #[error("malformed row: {0}")]
    MalformedRow(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
