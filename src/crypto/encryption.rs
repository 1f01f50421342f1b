//! Per-chunk AES-256-GCM.
//!
//! Wire format of one stored chunk:
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//! One key per file, a fresh nonce per chunk.

use std::fmt;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TransferError;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

/// Symmetric key shared by every chunk of one file.
#[derive(Clone, PartialEq, Eq)]
pub struct FileKey([u8; KEY_SIZE]);

impl FileKey {
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(key.as_slice());
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, TransferError> {
        let decoded = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| TransferError::InvalidKey(e.to_string()))?;
        let bytes: [u8; KEY_SIZE] = decoded.as_slice().try_into().map_err(|_| {
            TransferError::InvalidKey(format!("expected {} bytes, got {}", KEY_SIZE, decoded.len()))
        })?;
        Ok(Self(bytes))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(..)")
    }
}

impl Serialize for FileKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for FileKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        FileKey::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Encrypt one plaintext chunk under a fresh random nonce.
///
/// Returns `nonce || ciphertext || tag`.
pub fn encrypt_chunk(key: &FileKey, plaintext: &[u8]) -> Result<Vec<u8>, TransferError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext)
        .map_err(|e| TransferError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt one stored chunk. `index` only labels the error.
pub fn decrypt_chunk(key: &FileKey, index: usize, stored: &[u8]) -> Result<Vec<u8>, TransferError> {
    if stored.len() < NONCE_SIZE {
        return Err(TransferError::ChunkTooSmall { index, len: stored.len() });
    }

    let (nonce, ciphertext) = stored.split_at(NONCE_SIZE);
    key.cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| TransferError::DecryptionFailed { index })
}
