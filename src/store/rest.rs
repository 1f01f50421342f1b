//! Hosted relational store reached through a PostgREST-style HTTP API.
//!
//! `files` rows flatten the encryption envelope into `meta_key` (base64),
//! `meta_links` (JSON array) and `meta_provider`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{FileQuery, FolderFilter, MetadataStore};
use crate::crypto::FileKey;
use crate::error::StoreError;
use crate::{Category, EncryptionEnvelope, FileRecord, Folder, Locator, Provider};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRow {
    id: String,
    name: String,
    size: i64,
    #[serde(rename = "type")]
    category: String,
    mime: Option<String>,
    created_at: DateTime<Utc>,
    folder_id: Option<String>,
    meta_key: Option<String>,
    meta_links: Option<String>,
    meta_provider: Option<String>,
    #[serde(default)]
    is_public: Option<bool>,
    #[serde(default)]
    share_id: Option<String>,
}

impl FileRow {
    fn from_record(record: &FileRecord) -> Result<Self, StoreError> {
        Ok(Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            size: i64::try_from(record.size)
                .map_err(|_| StoreError::InvalidInput(format!("size {} out of range", record.size)))?,
            category: record.category.as_str().to_string(),
            mime: Some(record.mime.clone()),
            created_at: record.created_at,
            folder_id: record.folder_ref.map(|id| id.to_string()),
            meta_key: record.encryption.key.as_ref().map(FileKey::to_base64),
            meta_links: Some(serde_json::to_string(&record.encryption.chunk_locators)?),
            meta_provider: Some(record.encryption.provider.to_string()),
            is_public: Some(record.is_public),
            share_id: record.share_id.clone(),
        })
    }

    fn into_record(self) -> Result<FileRecord, StoreError> {
        let malformed = |what: &str| StoreError::MalformedRow(format!("file {}: {}", self.id, what));

        let id = Uuid::parse_str(&self.id).map_err(|_| malformed("id is not a uuid"))?;
        let size = u64::try_from(self.size).map_err(|_| malformed("negative size"))?;
        let folder_ref = match &self.folder_id {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| malformed("folder id is not a uuid"))?),
            None => None,
        };
        let key = match self.meta_key.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => {
                Some(FileKey::from_base64(encoded).map_err(|e| malformed(&e.to_string()))?)
            }
            _ => None,
        };
        let chunk_locators: Vec<Locator> = match self.meta_links.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(raw).map_err(|e| malformed(&e.to_string()))?
            }
            _ => Vec::new(),
        };
        let category = Category::parse(&self.category).ok_or_else(|| malformed("unknown type"))?;

        Ok(FileRecord {
            id,
            name: self.name,
            size,
            category,
            mime: self.mime.unwrap_or_default(),
            created_at: self.created_at,
            folder_ref,
            encryption: EncryptionEnvelope {
                key,
                provider: Provider::from(self.meta_provider.as_deref().unwrap_or_default()),
                chunk_locators,
            },
            share_id: self.share_id,
            is_public: self.is_public.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FolderRow {
    id: String,
    name: String,
    parent_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl FolderRow {
    fn from_folder(folder: &Folder) -> Self {
        Self {
            id: folder.id.to_string(),
            name: folder.name.clone(),
            parent_id: folder.parent_ref.map(|id| id.to_string()),
            created_at: folder.created_at,
        }
    }

    fn into_folder(self) -> Result<Folder, StoreError> {
        let malformed = |what: &str| StoreError::MalformedRow(format!("folder {}: {}", self.id, what));
        let id = Uuid::parse_str(&self.id).map_err(|_| malformed("id is not a uuid"))?;
        let parent_ref = match &self.parent_id {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| malformed("parent id is not a uuid"))?),
            None => None,
        };
        Ok(Folder { id, name: self.name, parent_ref, created_at: self.created_at })
    }
}

#[derive(Serialize)]
struct SharePatch<'a> {
    share_id: &'a str,
    is_public: bool,
}

#[derive(Serialize)]
struct FolderPatch {
    folder_id: Option<String>,
}

/// Rows that fail to parse are skipped with a warning instead of failing the
/// whole listing.
fn parse_rows<R, T>(rows: Vec<R>, parse: impl Fn(R) -> Result<T, StoreError>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match parse(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "skipping unreadable row");
                None
            }
        })
        .collect()
}

pub struct RestStore {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, name)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Http { status: status.as_u16(), body })
    }

    async fn fetch_files(&self, params: &[(&str, String)]) -> Result<Vec<FileRecord>, StoreError> {
        let response = self
            .send(self.request(Method::GET, "files").query(&[("select", "*")]).query(params))
            .await?;
        let rows: Vec<FileRow> = response.json().await?;
        Ok(parse_rows(rows, FileRow::into_record))
    }
}

#[async_trait]
impl MetadataStore for RestStore {
    async fn list_files(&self, query: &FileQuery) -> Result<Vec<FileRecord>, StoreError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        match query.folder {
            FolderFilter::Any => {}
            FolderFilter::Root => params.push(("folder_id", "is.null".to_string())),
            FolderFilter::In(id) => params.push(("folder_id", format!("eq.{}", id))),
        }
        if let Some(category) = query.category {
            params.push(("type", format!("eq.{}", category.as_str())));
        }
        params.push(("order", "created_at.desc".to_string()));
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let files = self.fetch_files(&params).await?;
        debug!(count = files.len(), "files loaded from hosted store");
        Ok(files)
    }

    async fn list_folders(&self) -> Result<Vec<Folder>, StoreError> {
        let response = self
            .send(
                self.request(Method::GET, "folders")
                    .query(&[("select", "*"), ("order", "created_at.desc")]),
            )
            .await?;
        let rows: Vec<FolderRow> = response.json().await?;
        Ok(parse_rows(rows, FolderRow::into_folder))
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        let params = [("id", format!("eq.{}", id)), ("limit", "1".to_string())];
        Ok(self.fetch_files(&params).await?.into_iter().next())
    }

    async fn get_shared_file(&self, share_id: &str) -> Result<Option<FileRecord>, StoreError> {
        let params = [
            ("share_id", format!("eq.{}", share_id)),
            ("is_public", "eq.true".to_string()),
            ("limit", "1".to_string()),
        ];
        Ok(self.fetch_files(&params).await?.into_iter().next())
    }

    async fn insert_file(&self, record: &FileRecord) -> Result<(), StoreError> {
        let row = FileRow::from_record(record)?;
        self.send(
            self.request(Method::POST, "files")
                .header("Prefer", "resolution=merge-duplicates")
                .json(&row),
        )
        .await?;
        Ok(())
    }

    async fn update_share(&self, id: Uuid, share_id: &str, is_public: bool) -> Result<(), StoreError> {
        self.send(
            self.request(Method::PATCH, "files")
                .query(&[("id", format!("eq.{}", id))])
                .json(&SharePatch { share_id, is_public }),
        )
        .await?;
        Ok(())
    }

    async fn update_file_folder(&self, id: Uuid, folder: Option<Uuid>) -> Result<(), StoreError> {
        self.send(
            self.request(Method::PATCH, "files")
                .query(&[("id", format!("eq.{}", id))])
                .json(&FolderPatch { folder_id: folder.map(|f| f.to_string()) }),
        )
        .await?;
        Ok(())
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), StoreError> {
        self.send(self.request(Method::DELETE, "files").query(&[("id", format!("eq.{}", id))]))
            .await?;
        Ok(())
    }

    async fn insert_folder(&self, folder: &Folder) -> Result<(), StoreError> {
        self.send(
            self.request(Method::POST, "folders")
                .header("Prefer", "resolution=merge-duplicates")
                .json(&FolderRow::from_folder(folder)),
        )
        .await?;
        Ok(())
    }

    async fn delete_folder(&self, id: Uuid) -> Result<(), StoreError> {
        self.send(self.request(Method::DELETE, "folders").query(&[("id", format!("eq.{}", id))]))
            .await?;
        Ok(())
    }
}
