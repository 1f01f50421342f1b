use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{FileQuery, MetadataStore};
use crate::error::StoreError;
use crate::{FileRecord, Folder};

const FILES_SNAPSHOT: &str = "files.json";
const FOLDERS_SNAPSHOT: &str = "folders.json";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    files: Vec<FileRecord>,
    folders: Vec<Folder>,
}

/// Whole-array snapshots of files and folders, rewritten on every change.
/// Without a directory the snapshot lives only in memory.
pub struct LocalStore {
    dir: Option<PathBuf>,
    state: Mutex<Snapshot>,
}

impl LocalStore {
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_owned();
        fs::create_dir_all(&dir).await?;

        let files = read_snapshot(&dir.join(FILES_SNAPSHOT)).await?;
        let folders = read_snapshot(&dir.join(FOLDERS_SNAPSHOT)).await?;
        debug!(dir = %dir.display(), files = files.len(), folders = folders.len(), "local snapshot loaded");

        Ok(Self {
            dir: Some(dir),
            state: Mutex::new(Snapshot { files, folders }),
        })
    }

    pub fn in_memory() -> Self {
        Self { dir: None, state: Mutex::new(Snapshot::default()) }
    }

    /// Swap both arrays for a fresh copy pulled from the hosted store.
    pub async fn replace_all(&self, files: Vec<FileRecord>, folders: Vec<Folder>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        *state = Snapshot { files, folders };
        self.persist(&state).await
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        fs::write(dir.join(FILES_SNAPSHOT), serde_json::to_vec(&snapshot.files)?).await?;
        fs::write(dir.join(FOLDERS_SNAPSHOT), serde_json::to_vec(&snapshot.folders)?).await?;
        Ok(())
    }
}

async fn read_snapshot<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !fs::try_exists(path).await? {
        return Ok(Vec::new());
    }
    let content = fs::read(path).await?;
    if content.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&content)?)
}

#[async_trait]
impl MetadataStore for LocalStore {
    async fn list_files(&self, query: &FileQuery) -> Result<Vec<FileRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(query.apply(&state.files))
    }

    async fn list_folders(&self) -> Result<Vec<Folder>, StoreError> {
        let state = self.state.lock().await;
        let mut folders = state.folders.clone();
        folders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(folders)
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.files.iter().find(|f| f.id == id).cloned())
    }

    async fn get_shared_file(&self, share_id: &str) -> Result<Option<FileRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .files
            .iter()
            .find(|f| f.is_public && f.share_id.as_deref() == Some(share_id))
            .cloned())
    }

    async fn insert_file(&self, record: &FileRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.files.retain(|f| f.id != record.id);
        state.files.insert(0, record.clone());
        self.persist(&state).await
    }

    async fn update_share(&self, id: Uuid, share_id: &str, is_public: bool) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record = state
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.share_id = Some(share_id.to_string());
        record.is_public = is_public;
        self.persist(&state).await
    }

    async fn update_file_folder(&self, id: Uuid, folder: Option<Uuid>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record = state
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.folder_ref = folder;
        self.persist(&state).await
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.files.retain(|f| f.id != id);
        self.persist(&state).await
    }

    async fn insert_folder(&self, folder: &Folder) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.folders.retain(|f| f.id != folder.id);
        state.folders.push(folder.clone());
        self.persist(&state).await
    }

    async fn delete_folder(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.folders.retain(|f| f.id != id);
        self.persist(&state).await
    }
}
