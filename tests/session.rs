mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::common::*;
    use async_trait::async_trait;
    use relay_drive::store::{Catalog, FileQuery, LocalStore, MetadataStore, Removed};
    use relay_drive::{AppError, Category, FileRecord, Folder, StoreError, View};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    /// Hosted store that is down for every call.
    struct DownStore;

    fn down() -> StoreError {
        StoreError::Http { status: 503, body: "service unavailable".to_string() }
    }

    #[async_trait]
    impl MetadataStore for DownStore {
        async fn list_files(&self, _: &FileQuery) -> Result<Vec<FileRecord>, StoreError> {
            Err(down())
        }
        async fn list_folders(&self) -> Result<Vec<Folder>, StoreError> {
            Err(down())
        }
        async fn get_file(&self, _: Uuid) -> Result<Option<FileRecord>, StoreError> {
            Err(down())
        }
        async fn get_shared_file(&self, _: &str) -> Result<Option<FileRecord>, StoreError> {
            Err(down())
        }
        async fn insert_file(&self, _: &FileRecord) -> Result<(), StoreError> {
            Err(down())
        }
        async fn update_share(&self, _: Uuid, _: &str, _: bool) -> Result<(), StoreError> {
            Err(down())
        }
        async fn update_file_folder(&self, _: Uuid, _: Option<Uuid>) -> Result<(), StoreError> {
            Err(down())
        }
        async fn delete_file(&self, _: Uuid) -> Result<(), StoreError> {
            Err(down())
        }
        async fn insert_folder(&self, _: &Folder) -> Result<(), StoreError> {
            Err(down())
        }
        async fn delete_folder(&self, _: Uuid) -> Result<(), StoreError> {
            Err(down())
        }
    }

    async fn put(session: &relay_drive::DriveSession, name: &str, data: &[u8]) -> FileRecord {
        session
            .upload_reader(name, None, data.len() as u64, &mut &data[..], |_| {}, &CancellationToken::new())
            .await
            .expect("Failed to upload")
    }

    /// An uploaded file lands in the folder being browsed
    #[tokio::test(start_paused = true)]
    async fn test_upload_into_current_folder() {
        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let mut session = h.session(64);

        let photos = session.create_folder("Photos").await.unwrap();
        session.open_folder(photos.id).await.unwrap();
        let record = put(&session, "beach.bin", &pattern(200)).await;

        assert_eq!(record.folder_ref, Some(photos.id));
        assert_eq!(record.mime, "application/octet-stream");
        assert_eq!(record.category, Category::Other);

        let listed = session.list(View::All).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, record.id);

        session.navigate_to_root();
        assert!(session.list(View::All).await.unwrap().is_empty());
        assert_eq!(session.used_space().await.unwrap(), 200);
    }

    /// A failed upload persists nothing
    #[tokio::test(start_paused = true)]
    async fn test_failed_upload_not_persisted() {
        let h = Harness::new(Behavior::Fail(500), Behavior::Fail(502));
        let session = h.session(64);

        let result = session
            .upload_reader("x.bin", None, 10, &mut &[7u8; 10][..], |_| {}, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(AppError::Transfer(_))));
        assert!(session.list(View::Dashboard).await.unwrap().is_empty());
    }

    /// Sharing twice returns the same id, and anyone holding it can download
    #[tokio::test(start_paused = true)]
    async fn test_share_and_download_shared() {
        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let session = h.session(64);
        let data = pattern(300);
        let record = put(&session, "report.pdf", &data).await;

        let first = session.share_file(record.id).await.unwrap();
        let second = session.share_file(record.id).await.unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("share_"));

        let mut restored = Vec::new();
        let shared = session
            .download_shared(&first, &mut restored, |_| {}, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(shared.id, record.id);
        assert!(shared.is_public);
        assert_eq!(restored, data);
    }

    /// A share resolved once can be downloaded without a second lookup
    #[tokio::test(start_paused = true)]
    async fn test_download_resolved_share() {
        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let session = h.session(64);
        let data = pattern(130);
        let record = put(&session, "notes.txt", &data).await;
        let share_id = session.share_file(record.id).await.unwrap();

        let shared = session.catalog().resolve_share(&share_id).await.unwrap();
        let mut restored = Vec::new();
        let written = session
            .download_record(&shared, &mut restored, |_| {}, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(written, 130);
        assert_eq!(restored, data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_share_not_found() {
        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let session = h.session(64);
        put(&session, "private.txt", b"secret").await;

        let mut sink = Vec::new();
        let error = session
            .download_shared("share_missing", &mut sink, |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Store(StoreError::NotFound(_))));
        assert!(sink.is_empty());
    }

    /// A record carrying a share id but not marked public stays private
    #[tokio::test]
    async fn test_private_record_not_resolvable() {
        let local = Arc::new(LocalStore::in_memory());
        let catalog = Catalog::local_only(Arc::clone(&local));

        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let mut record = uploader(vec![h.discord.clone()], small_chunks(64), options())
            .upload(
                relay_drive::transfer::UploadRequest {
                    name: "a.txt".to_string(),
                    mime: Some("text/plain".to_string()),
                    size: 4,
                    provider: relay_drive::Provider::Discord,
                    folder_ref: None,
                },
                &mut &b"data"[..],
                |_| {},
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        record.share_id = Some("share_hidden".to_string());
        record.is_public = false;
        catalog.insert_file(&record).await.unwrap();

        let error = catalog.resolve_share("share_hidden").await.unwrap_err();
        assert!(matches!(error, StoreError::NotFound(_)));

        // Sharing keeps the existing id and makes it public.
        assert_eq!(catalog.create_share(record.id).await.unwrap(), "share_hidden");
        assert_eq!(catalog.resolve_share("share_hidden").await.unwrap().id, record.id);
    }

    /// Deleting a folder removes its subfolders and every file beneath it,
    /// and a session browsing inside it returns to the root
    #[tokio::test(start_paused = true)]
    async fn test_cascade_folder_delete() {
        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let mut session = h.session(64);

        let kept = put(&session, "root.txt", b"root file").await;
        let work = session.create_folder("Work").await.unwrap();
        session.open_folder(work.id).await.unwrap();
        put(&session, "plan.txt", b"plan").await;
        let archive = session.create_folder("Archive").await.unwrap();
        session.open_folder(archive.id).await.unwrap();
        put(&session, "old.txt", b"old").await;

        let crumbs: Vec<String> = session.breadcrumb().await.unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(crumbs, vec!["Work", "Archive"]);

        let removed = session.delete_folder(work.id).await.unwrap();
        assert_eq!(removed, Removed { files: 2, folders: 2 });
        assert_eq!(session.current_folder(), None);

        let remaining = session.list(View::Dashboard).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);
        assert!(session.subfolders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_folder_needs_existing_parent() {
        let catalog = Catalog::local_only(Arc::new(LocalStore::in_memory()));

        let error = catalog.create_folder("orphan", Some(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(error, StoreError::NotFound(_)));

        let error = catalog.create_folder("   ", None).await.unwrap_err();
        assert!(matches!(error, StoreError::InvalidInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_file_between_folders() {
        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let mut session = h.session(64);
        let record = put(&session, "song.bin", &pattern(80)).await;
        let music = session.create_folder("Music").await.unwrap();

        session.move_file(record.id, Some(music.id)).await.unwrap();
        assert!(session.list(View::All).await.unwrap().is_empty());

        session.open_folder(music.id).await.unwrap();
        assert_eq!(session.list(View::All).await.unwrap()[0].id, record.id);

        let error = session.move_file(record.id, Some(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(error, AppError::Store(StoreError::NotFound(_))));
    }

    /// Hosted store down: writes land in the local snapshot and reads come
    /// back from it
    #[tokio::test(start_paused = true)]
    async fn test_store_outage_falls_back_to_snapshot() {
        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let catalog = Catalog::new(Some(Arc::new(DownStore) as Arc<dyn MetadataStore>), Arc::clone(&h.local));
        let session = relay_drive::DriveSession::new(
            catalog,
            uploader(vec![h.discord.clone()], small_chunks(64), options()),
            relay_drive::transfer::Downloader::new(h.proxy.clone()),
            relay_drive::Provider::Discord,
        );

        let data = pattern(150);
        let record = put(&session, "offline.bin", &data).await;
        let folder = session.create_folder("Offline").await.unwrap();

        assert_eq!(session.list(View::All).await.unwrap()[0].id, record.id);
        assert_eq!(session.subfolders().await.unwrap()[0].id, folder.id);
        assert!(h.local.get_file(record.id).await.unwrap().is_some());

        let mut restored = Vec::new();
        session
            .download_file(record.id, &mut restored, |_| {}, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(restored, data);

        // Refresh needs the hosted store.
        assert!(session.refresh().await.is_err());
    }

    /// Refresh replaces the snapshot with the hosted contents
    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let hosted = Arc::new(LocalStore::in_memory());
        let shared = Folder::new("From elsewhere", None);
        hosted.insert_folder(&shared).await.unwrap();

        let local = Arc::new(LocalStore::in_memory());
        local.insert_folder(&Folder::new("Stale", None)).await.unwrap();

        let catalog = Catalog::new(Some(hosted as Arc<dyn MetadataStore>), Arc::clone(&local));
        let counts = catalog.refresh().await.unwrap();
        assert_eq!(counts, Removed { files: 0, folders: 1 });

        let folders = local.list_folders().await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].id, shared.id);
    }

    /// The on-disk snapshot survives reopening
    #[tokio::test]
    async fn test_snapshot_persists_on_disk() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let folder = {
            let catalog = Catalog::local_only(Arc::new(LocalStore::open(dir.path()).await.unwrap()));
            catalog.create_folder("Kept", None).await.unwrap()
        };

        let reopened = Catalog::local_only(Arc::new(LocalStore::open(dir.path()).await.unwrap()));
        assert_eq!(reopened.get_folder(folder.id).await.unwrap().name, "Kept");
        assert!(dir.path().join("folders.json").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_category_and_recent_views() {
        let h = Harness::new(Behavior::Succeed, Behavior::Succeed);
        let session = h.session(1024);

        session
            .upload_reader("clip.mp4", Some("video/mp4".to_string()), 3, &mut &b"abc"[..], |_| {}, &CancellationToken::new())
            .await
            .unwrap();
        for i in 0..22 {
            put(&session, &format!("note{}.txt", i), b"n").await;
        }

        let videos = session.list(View::Category(Category::Video)).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].name, "clip.mp4");
        assert_eq!(session.list(View::Recent).await.unwrap().len(), 20);
        assert_eq!(session.list(View::Dashboard).await.unwrap().len(), 23);
    }
}
