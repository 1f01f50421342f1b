//! Per-user drive context: the catalog, both pipelines, the folder being
//! browsed and the provider selected for new uploads.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::chunk::ChunkPlanner;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::relay::http::{build_client, HttpChunkRelay, HttpRelayProxy};
use crate::relay::ChunkRelay;
use crate::store::{Catalog, FileQuery, LocalStore, MetadataStore, Removed, RestStore};
use crate::transfer::{Downloader, ProgressStats, UploadRequest, Uploader};
use crate::{detect_mime, Category, FileRecord, Folder, Provider};

const SNIFF_LEN: usize = 8192;

/// File listings offered by the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Files in the current folder (the root when none is open).
    All,
    /// Newest 20 files anywhere.
    Recent,
    /// Newest 50 files anywhere.
    Dashboard,
    Category(Category),
}

impl View {
    fn query(&self, current_folder: Option<Uuid>) -> FileQuery {
        match self {
            View::All => FileQuery::in_folder(current_folder),
            View::Recent => FileQuery::all().with_limit(20),
            View::Dashboard => FileQuery::all().with_limit(50),
            View::Category(category) => FileQuery::all().with_category(*category),
        }
    }
}

/// Public link for a share id, e.g. `https://drive.example/share.html?id=share_..`.
pub fn share_url(origin: &str, share_id: &str) -> String {
    format!("{}/share.html?id={}", origin.trim_end_matches('/'), share_id)
}

pub struct DriveSession {
    catalog: Catalog,
    uploader: Uploader,
    downloader: Downloader,
    current_folder: Option<Uuid>,
    provider: Provider,
}

impl DriveSession {
    pub fn new(catalog: Catalog, uploader: Uploader, downloader: Downloader, provider: Provider) -> Self {
        Self {
            catalog,
            uploader,
            downloader,
            current_folder: None,
            provider,
        }
    }

    /// Wire the HTTP relays, the relay proxy and the stores described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(config.transfer.request_timeout())?;

        let relays: Vec<Arc<dyn ChunkRelay>> = config
            .relays
            .iter()
            .map(|relay| {
                Arc::new(HttpChunkRelay::new(relay.provider.clone(), &relay.upload_url, client.clone()))
                    as Arc<dyn ChunkRelay>
            })
            .collect();
        if relays.is_empty() {
            return Err(AppError::Config("at least one relay must be configured".to_string()));
        }

        let local = Arc::new(LocalStore::open(&config.store.local_dir).await?);
        let primary = config.hosted_store().map(|(url, key)| {
            Arc::new(RestStore::new(url, key, client.clone())) as Arc<dyn MetadataStore>
        });
        if primary.is_none() {
            info!("no hosted store configured, using local snapshot only");
        }

        let planner = ChunkPlanner::new(config.chunk_sizes.clone());
        Ok(Self::new(
            Catalog::new(primary, local),
            Uploader::new(relays, planner, config.transfer.upload_options()),
            Downloader::new(Arc::new(HttpRelayProxy::new(&config.download_url, client))),
            config.provider.clone(),
        ))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn current_folder(&self) -> Option<Uuid> {
        self.current_folder
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn set_provider(&mut self, provider: Provider) {
        self.provider = provider;
    }

    pub async fn open_folder(&mut self, id: Uuid) -> Result<Folder> {
        let folder = self.catalog.get_folder(id).await?;
        self.current_folder = Some(id);
        Ok(folder)
    }

    pub fn navigate_to_root(&mut self) {
        self.current_folder = None;
    }

    pub async fn breadcrumb(&self) -> Result<Vec<Folder>> {
        match self.current_folder {
            Some(id) => Ok(self.catalog.breadcrumb(id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn list(&self, view: View) -> Result<Vec<FileRecord>> {
        Ok(self.catalog.list_files(&view.query(self.current_folder)).await?)
    }

    /// Folders directly inside the current folder.
    pub async fn subfolders(&self) -> Result<Vec<Folder>> {
        let folders = self.catalog.list_folders().await?;
        Ok(folders
            .into_iter()
            .filter(|f| f.parent_ref == self.current_folder)
            .collect())
    }

    pub async fn used_space(&self) -> Result<u64> {
        Ok(self.catalog.used_space().await?)
    }

    /// Upload from any reader into the current folder and persist the record.
    pub async fn upload_reader<R>(
        &self,
        name: &str,
        mime: Option<String>,
        size: u64,
        reader: &mut R,
        on_progress: impl FnMut(&ProgressStats) + Send,
        cancel: &CancellationToken,
    ) -> Result<FileRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let request = UploadRequest {
            name: name.to_string(),
            mime,
            size,
            provider: self.provider.clone(),
            folder_ref: self.current_folder,
        };
        let record = self.uploader.upload(request, reader, on_progress, cancel).await?;
        self.catalog.insert_file(&record).await?;
        Ok(record)
    }

    /// Upload a local file, sniffing its MIME type from the leading bytes.
    pub async fn upload_file(
        &self,
        path: &Path,
        on_progress: impl FnMut(&ProgressStats) + Send,
        cancel: &CancellationToken,
    ) -> Result<FileRecord> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::NotFound(format!("invalid file name: {}", path.display())))?
            .to_string();

        let mut file = File::open(path).await?;
        let size = file.metadata().await?.len();

        let mut head = vec![0u8; SNIFF_LEN.min(size as usize)];
        file.read_exact(&mut head).await?;
        file.seek(SeekFrom::Start(0)).await?;
        let mime = detect_mime(&head).map(str::to_string);

        self.upload_reader(&name, mime, size, &mut file, on_progress, cancel).await
    }

    pub async fn download_file<W>(
        &self,
        id: Uuid,
        writer: &mut W,
        on_progress: impl FnMut(&ProgressStats) + Send,
        cancel: &CancellationToken,
    ) -> Result<FileRecord>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let record = self.catalog.get_file(id).await?;
        self.downloader.download(&record, writer, on_progress, cancel).await?;
        Ok(record)
    }

    pub async fn share_file(&self, id: Uuid) -> Result<String> {
        Ok(self.catalog.create_share(id).await?)
    }

    /// Download through a public share id; needs no knowledge of folders or ids.
    pub async fn download_shared<W>(
        &self,
        share_id: &str,
        writer: &mut W,
        on_progress: impl FnMut(&ProgressStats) + Send,
        cancel: &CancellationToken,
    ) -> Result<FileRecord>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let record = self.catalog.resolve_share(share_id).await?;
        self.download_record(&record, writer, on_progress, cancel).await?;
        Ok(record)
    }

    /// Download a record the caller already holds, e.g. one returned by
    /// [`Catalog::resolve_share`].
    pub async fn download_record<W>(
        &self,
        record: &FileRecord,
        writer: &mut W,
        on_progress: impl FnMut(&ProgressStats) + Send,
        cancel: &CancellationToken,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        Ok(self.downloader.download(record, writer, on_progress, cancel).await?)
    }

    pub async fn create_folder(&self, name: &str) -> Result<Folder> {
        Ok(self.catalog.create_folder(name, self.current_folder).await?)
    }

    pub async fn delete_folder(&mut self, id: Uuid) -> Result<Removed> {
        let inside_deleted = match self.current_folder {
            Some(current) => self
                .catalog
                .breadcrumb(current)
                .await
                .map(|path| path.iter().any(|f| f.id == id))
                .unwrap_or(false),
            None => false,
        };

        let removed = self.catalog.delete_folder(id).await?;
        if inside_deleted {
            self.navigate_to_root();
        }
        Ok(removed)
    }

    pub async fn delete_file(&self, id: Uuid) -> Result<()> {
        Ok(self.catalog.delete_file(id).await?)
    }

    pub async fn move_file(&self, id: Uuid, folder: Option<Uuid>) -> Result<()> {
        Ok(self.catalog.move_file(id, folder).await?)
    }

    pub async fn refresh(&self) -> Result<Removed> {
        Ok(self.catalog.refresh().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_url_joins_origin() {
        assert_eq!(
            share_url("https://drive.example/", "share_1"),
            "https://drive.example/share.html?id=share_1"
        );
    }

    #[test]
    fn views_map_to_queries() {
        let folder = Uuid::new_v4();
        assert_eq!(View::All.query(Some(folder)), FileQuery::in_folder(Some(folder)));
        assert_eq!(View::Recent.query(Some(folder)).limit, Some(20));
        assert_eq!(View::Dashboard.query(None).limit, Some(50));
        assert_eq!(
            View::Category(Category::Audio).query(None).category,
            Some(Category::Audio)
        );
    }
}
