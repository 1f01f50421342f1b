use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Category, Locator, Provider};
use crate::crypto::FileKey;

/// Everything needed to fetch and decrypt a file's chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionEnvelope {
    pub key: Option<FileKey>,
    pub provider: Provider,
    pub chunk_locators: Vec<Locator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub category: Category,
    pub mime: String,
    pub created_at: DateTime<Utc>,
    pub folder_ref: Option<Uuid>,
    pub encryption: EncryptionEnvelope,
    #[serde(default)]
    pub share_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

impl FileRecord {
    pub fn is_shared(&self) -> bool {
        self.is_public && self.share_id.is_some()
    }
}
