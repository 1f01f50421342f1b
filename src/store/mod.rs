//! File and folder metadata.
//!
//! [`MetadataStore`] is implemented by the hosted REST store and by the
//! local snapshot store; [`Catalog`] combines the two.

pub mod catalog;
pub mod local;
pub mod rest;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::{Category, FileRecord, Folder};

pub use catalog::{Catalog, Removed};
pub use local::LocalStore;
pub use rest::RestStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderFilter {
    #[default]
    Any,
    Root,
    In(Uuid),
}

/// File listing filter. Results are ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileQuery {
    pub folder: FolderFilter,
    pub category: Option<Category>,
    pub limit: Option<usize>,
}

impl FileQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_folder(folder: Option<Uuid>) -> Self {
        Self {
            folder: match folder {
                Some(id) => FolderFilter::In(id),
                None => FolderFilter::Root,
            },
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        let folder_ok = match self.folder {
            FolderFilter::Any => true,
            FolderFilter::Root => record.folder_ref.is_none(),
            FolderFilter::In(id) => record.folder_ref == Some(id),
        };
        folder_ok && self.category.map_or(true, |c| record.category == c)
    }

    /// Filter, order and limit an in-memory listing.
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a FileRecord>) -> Vec<FileRecord> {
        let mut matched: Vec<FileRecord> = records
            .into_iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn list_files(&self, query: &FileQuery) -> Result<Vec<FileRecord>, StoreError>;
    /// All folders, newest first.
    async fn list_folders(&self) -> Result<Vec<Folder>, StoreError>;
    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError>;
    /// Only records whose share id matches and which are marked public.
    async fn get_shared_file(&self, share_id: &str) -> Result<Option<FileRecord>, StoreError>;
    /// Insert or replace by id.
    async fn insert_file(&self, record: &FileRecord) -> Result<(), StoreError>;
    async fn update_share(&self, id: Uuid, share_id: &str, is_public: bool) -> Result<(), StoreError>;
    async fn update_file_folder(&self, id: Uuid, folder: Option<Uuid>) -> Result<(), StoreError>;
    async fn delete_file(&self, id: Uuid) -> Result<(), StoreError>;
    async fn insert_folder(&self, folder: &Folder) -> Result<(), StoreError>;
    async fn delete_folder(&self, id: Uuid) -> Result<(), StoreError>;
}
