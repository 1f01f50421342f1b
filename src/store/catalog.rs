use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use super::{FileQuery, LocalStore, MetadataStore};
use crate::error::StoreError;
use crate::{FileRecord, Folder};

/// What a cascading folder delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Removed {
    pub files: usize,
    pub folders: usize,
}

/// Hosted store with a local snapshot behind it.
///
/// Reads fall back to the snapshot when the hosted store fails. Writes go
/// to the hosted store and are mirrored locally; if the hosted write fails
/// the change is kept in the snapshot only.
pub struct Catalog {
    primary: Option<Arc<dyn MetadataStore>>,
    local: Arc<LocalStore>,
}

impl Catalog {
    pub fn new(primary: Option<Arc<dyn MetadataStore>>, local: Arc<LocalStore>) -> Self {
        Self { primary, local }
    }

    pub fn local_only(local: Arc<LocalStore>) -> Self {
        Self::new(None, local)
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    fn local(&self) -> Arc<dyn MetadataStore> {
        self.local.clone()
    }

    async fn read<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, StoreError>
    where
        F: Fn(Arc<dyn MetadataStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if let Some(primary) = &self.primary {
            match op(Arc::clone(primary)).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(operation, error = %e, "metadata store unavailable, reading local snapshot")
                }
            }
        }
        op(self.local()).await
    }

    async fn write<F, Fut>(&self, operation: &str, op: F) -> Result<(), StoreError>
    where
        F: Fn(Arc<dyn MetadataStore>) -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
    {
        let Some(primary) = &self.primary else {
            return op(self.local()).await;
        };

        match op(Arc::clone(primary)).await {
            Ok(()) => {
                if let Err(e) = op(self.local()).await {
                    warn!(operation, error = %e, "could not mirror change into local snapshot");
                }
                Ok(())
            }
            Err(e) => {
                error!(
                    operation,
                    error = %e,
                    "metadata store write failed, change kept in local snapshot only"
                );
                op(self.local()).await
            }
        }
    }

    pub async fn list_files(&self, query: &FileQuery) -> Result<Vec<FileRecord>, StoreError> {
        self.read("list_files", |store| {
            let query = query.clone();
            async move { store.list_files(&query).await }
        })
        .await
    }

    pub async fn list_folders(&self) -> Result<Vec<Folder>, StoreError> {
        self.read("list_folders", |store| async move { store.list_folders().await })
            .await
    }

    pub async fn get_file(&self, id: Uuid) -> Result<FileRecord, StoreError> {
        self.read("get_file", |store| async move { store.get_file(id).await })
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("file {}", id)))
    }

    pub async fn get_folder(&self, id: Uuid) -> Result<Folder, StoreError> {
        self.list_folders()
            .await?
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("folder {}", id)))
    }

    pub async fn insert_file(&self, record: &FileRecord) -> Result<(), StoreError> {
        self.write("insert_file", |store| {
            let record = record.clone();
            async move { store.insert_file(&record).await }
        })
        .await
    }

    pub async fn delete_file(&self, id: Uuid) -> Result<(), StoreError> {
        self.write("delete_file", |store| async move { store.delete_file(id).await })
            .await
    }

    pub async fn move_file(&self, id: Uuid, folder: Option<Uuid>) -> Result<(), StoreError> {
        if let Some(folder_id) = folder {
            self.get_folder(folder_id).await?;
        }
        self.get_file(id).await?;
        self.write("move_file", |store| async move { store.update_file_folder(id, folder).await })
            .await
    }

    /// Returns the record's share id, creating it on first use. An existing
    /// id is never replaced.
    pub async fn create_share(&self, id: Uuid) -> Result<String, StoreError> {
        let record = self.get_file(id).await?;
        if let Some(existing) = record.share_id {
            if !record.is_public {
                self.set_share(id, &existing).await?;
            }
            return Ok(existing);
        }

        let share_id = format!("share_{}", Uuid::new_v4().simple());
        self.set_share(id, &share_id).await?;
        info!(file = %id, share_id = %share_id, "file shared");
        Ok(share_id)
    }

    async fn set_share(&self, id: Uuid, share_id: &str) -> Result<(), StoreError> {
        self.write("update_share", |store| {
            let share_id = share_id.to_string();
            async move { store.update_share(id, &share_id, true).await }
        })
        .await
    }

    pub async fn resolve_share(&self, share_id: &str) -> Result<FileRecord, StoreError> {
        self.read("resolve_share", |store| {
            let share_id = share_id.to_string();
            async move { store.get_shared_file(&share_id).await }
        })
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("share {}", share_id)))
    }

    /// Create a folder under `parent`. The parent must exist and its ancestor
    /// chain must end at the root.
    pub async fn create_folder(&self, name: &str, parent: Option<Uuid>) -> Result<Folder, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("folder name is empty".to_string()));
        }

        if let Some(parent_id) = parent {
            let folders = self.list_folders().await?;
            ancestry(&folders, parent_id)?;
        }

        let folder = Folder::new(name, parent);
        self.write("insert_folder", |store| {
            let folder = folder.clone();
            async move { store.insert_folder(&folder).await }
        })
        .await?;
        Ok(folder)
    }

    /// Delete a folder, every folder below it and every file inside any of them.
    pub async fn delete_folder(&self, id: Uuid) -> Result<Removed, StoreError> {
        let folders = self.list_folders().await?;
        if !folders.iter().any(|f| f.id == id) {
            return Err(StoreError::NotFound(format!("folder {}", id)));
        }
        let subtree = descendants(&folders, id);

        let files = self.list_files(&FileQuery::all()).await?;
        let mut removed = Removed::default();
        for file in files.iter().filter(|f| f.folder_ref.is_some_and(|r| subtree.contains(&r))) {
            self.delete_file(file.id).await?;
            removed.files += 1;
        }
        for folder_id in &subtree {
            let folder_id = *folder_id;
            self.write("delete_folder", |store| async move { store.delete_folder(folder_id).await })
                .await?;
            removed.folders += 1;
        }

        info!(folder = %id, files = removed.files, folders = removed.folders, "folder deleted");
        Ok(removed)
    }

    /// Folders from the root down to `id`, inclusive.
    pub async fn breadcrumb(&self, id: Uuid) -> Result<Vec<Folder>, StoreError> {
        let folders = self.list_folders().await?;
        let mut path = ancestry(&folders, id)?;
        path.reverse();
        Ok(path)
    }

    pub async fn used_space(&self) -> Result<u64, StoreError> {
        let files = self.list_files(&FileQuery::all()).await?;
        Ok(files.iter().map(|f| f.size).sum())
    }

    /// Replace the local snapshot with everything the hosted store holds.
    pub async fn refresh(&self) -> Result<Removed, StoreError> {
        let Some(primary) = &self.primary else {
            return Ok(Removed::default());
        };
        let files = primary.list_files(&FileQuery::all()).await?;
        let folders = primary.list_folders().await?;
        let counts = Removed { files: files.len(), folders: folders.len() };
        self.local.replace_all(files, folders).await?;
        info!(files = counts.files, folders = counts.folders, "local snapshot refreshed");
        Ok(counts)
    }
}

/// `id` followed by its ancestors up to the root.
fn ancestry(folders: &[Folder], id: Uuid) -> Result<Vec<Folder>, StoreError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(id);

    while let Some(folder_id) = current {
        if !seen.insert(folder_id) {
            return Err(StoreError::FolderCycle(folder_id));
        }
        let folder = folders
            .iter()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| StoreError::NotFound(format!("folder {}", folder_id)))?;
        chain.push(folder.clone());
        current = folder.parent_ref;
    }

    Ok(chain)
}

/// `root` and every folder below it.
fn descendants(folders: &[Folder], root: Uuid) -> HashSet<Uuid> {
    let mut found = HashSet::from([root]);
    let mut pending = vec![root];

    while let Some(parent) = pending.pop() {
        for child in folders.iter().filter(|f| f.parent_ref == Some(parent)) {
            if found.insert(child.id) {
                pending.push(child.id);
            }
        }
    }

    found
}
