use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::videos;
use crate::services::identity::Identity;
use crate::services::media::{AspectClassifier, FastStartRemuxer, ProcessRunner};
use crate::services::staging::{StagedArtifact, StagingManager};
use crate::services::storage::StorageService;
use crate::services::storage_key::build_key;
use crate::services::video_store::VideoStore;
use crate::utils::validation::{VIDEO_MP4, parse_video_id, validate_video_content_type};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Request-scoped video publishing pipeline:
/// stage → remux → classify → key → upload → record URL.
///
/// Staged files are released on every exit path. The video record is only
/// touched after the object store has acknowledged the upload.
pub struct IngestService {
    videos: Arc<dyn VideoStore>,
    storage: Arc<dyn StorageService>,
    staging: StagingManager,
    remuxer: FastStartRemuxer,
    classifier: AspectClassifier,
    config: AppConfig,
}

impl IngestService {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        storage: Arc<dyn StorageService>,
        runner: Arc<dyn ProcessRunner>,
        config: AppConfig,
    ) -> Self {
        Self {
            videos,
            storage,
            staging: StagingManager::new(config.temp_dir.clone(), config.max_upload_size),
            remuxer: FastStartRemuxer::new(runner.clone(), config.ffmpeg_path.clone()),
            classifier: AspectClassifier::new(runner, config.ffprobe_path.clone()),
            config,
        }
    }

    /// Resolve `raw_video_id` to a record owned by `identity`
    pub async fn authorize_upload(
        &self,
        identity: &Identity,
        raw_video_id: &str,
    ) -> Result<videos::Model, AppError> {
        let video_id = parse_video_id(raw_video_id).map_err(|e| {
            tracing::debug!("{}", e);
            AppError::BadRequest("Invalid video ID".to_string())
        })?;

        let video = self
            .videos
            .get(&video_id.to_string())
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

        if video.user_id != identity.user_id {
            tracing::warn!(
                "User {} attempted to upload to video {} owned by {}",
                identity.user_id,
                video.id,
                video.user_id
            );
            return Err(AppError::Unauthorized(
                "Not authorized to modify this video".to_string(),
            ));
        }

        Ok(video)
    }

    /// Publish the uploaded stream for `video` and return its public URL
    pub async fn publish<R>(
        &self,
        video: &videos::Model,
        content_type: Option<&str>,
        reader: R,
        cancel: &CancellationToken,
    ) -> Result<String, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_video_content_type(content_type)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let raw = self.staging.stage(reader).await?;
        // Tracked before it exists so a half-written remux output is cleaned too
        let remuxed = self
            .staging
            .track(FastStartRemuxer::output_path_for(raw.path()));

        let result = self.publish_staged(video, &raw, cancel).await;

        self.staging.release(&remuxed).await;
        self.staging.release(&raw).await;

        result
    }

    async fn publish_staged(
        &self,
        video: &videos::Model,
        raw: &StagedArtifact,
        cancel: &CancellationToken,
    ) -> Result<String, AppError> {
        let remuxed_path = self.remuxer.remux(raw.path(), cancel).await?;

        // Classify the remuxed file: remuxing can reorder reported streams
        let label = self.classifier.classify(&remuxed_path, cancel).await?;

        let key = build_key(label);

        self.storage
            .upload_file(&key, VIDEO_MP4, &remuxed_path, cancel)
            .await
            .map_err(|e| AppError::Storage(format!("Upload of {} failed: {:#}", key, e)))?;

        let video_url = self.config.public_url(&key);

        // TODO: delete the uploaded object when this update fails; it is orphaned otherwise
        self.videos
            .set_published_url(&video.id, &video_url)
            .await
            .map_err(|e| {
                AppError::Persistence(format!(
                    "Failed to record URL for video {} (object {} is orphaned): {}",
                    video.id, key, e
                ))
            })?;

        info!(
            "🎬 Published video {} as {} ({})",
            video.id, key, label
        );
        Ok(video_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::media::testing::FakeRunner;
    use async_trait::async_trait;
    use chrono::Utc;
    use sea_orm::DbErr;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct MockVideoStore {
        videos: Mutex<HashMap<String, videos::Model>>,
        updates: AtomicUsize,
        fail_updates: bool,
    }

    impl MockVideoStore {
        fn with_video(owner: &str) -> (Self, videos::Model) {
            let now = Utc::now();
            let video = videos::Model {
                id: Uuid::new_v4().to_string(),
                user_id: owner.to_string(),
                title: "clip".to_string(),
                description: None,
                video_url: None,
                created_at: now,
                updated_at: now,
            };
            let store = Self::default();
            store
                .videos
                .lock()
                .unwrap()
                .insert(video.id.clone(), video.clone());
            (store, video)
        }

        fn url_of(&self, id: &str) -> Option<String> {
            self.videos.lock().unwrap()[id].video_url.clone()
        }
    }

    #[async_trait]
    impl VideoStore for MockVideoStore {
        async fn create(
            &self,
            _user_id: &str,
            _title: &str,
            _description: Option<&str>,
        ) -> Result<videos::Model, DbErr> {
            unimplemented!()
        }

        async fn get(&self, video_id: &str) -> Result<Option<videos::Model>, DbErr> {
            Ok(self.videos.lock().unwrap().get(video_id).cloned())
        }

        async fn set_published_url(&self, video_id: &str, url: &str) -> Result<(), DbErr> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_updates {
                return Err(DbErr::Custom("database is locked".to_string()));
            }
            let mut videos = self.videos.lock().unwrap();
            let video = videos
                .get_mut(video_id)
                .ok_or_else(|| DbErr::RecordNotFound(video_id.to_string()))?;
            video.video_url = Some(url.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockStorage {
        uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl StorageService for MockStorage {
        async fn upload_file(
            &self,
            key: &str,
            content_type: &str,
            path: &Path,
            _cancel: &CancellationToken,
        ) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("connection reset"));
            }
            let data = tokio::fs::read(path).await?;
            self.uploads
                .lock()
                .unwrap()
                .push((key.to_string(), content_type.to_string(), data));
            Ok(())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct Harness {
        service: IngestService,
        store: Arc<MockVideoStore>,
        storage: Arc<MockStorage>,
        runner: Arc<FakeRunner>,
        video: videos::Model,
        dir: tempfile::TempDir,
    }

    fn harness(store: MockVideoStore, video: videos::Model, storage: MockStorage, runner: FakeRunner) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            temp_dir: dir.path().to_path_buf(),
            public_origin: "https://cdn.example.com".to_string(),
            ..AppConfig::default()
        };
        let store = Arc::new(store);
        let storage = Arc::new(storage);
        let runner = Arc::new(runner);
        let service = IngestService::new(store.clone(), storage.clone(), runner.clone(), config);
        Harness {
            service,
            store,
            storage,
            runner,
            video,
            dir,
        }
    }

    /// Remux that writes its output and then waits for cancellation
    #[derive(Default)]
    struct StallingRemux {
        started: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ProcessRunner for StallingRemux {
        async fn run(
            &self,
            tool: &str,
            args: &[std::ffi::OsString],
            cancel: &CancellationToken,
        ) -> Result<crate::services::media::ProcessOutput, crate::services::media::MediaError> {
            std::fs::write(args.last().unwrap(), b"partial remux").unwrap();
            self.started.store(true, Ordering::SeqCst);
            cancel.cancelled().await;
            Err(crate::services::media::MediaError::Cancelled {
                tool: tool.to_string(),
            })
        }
    }

    fn stalling_service(dir: &Path, runner: Arc<StallingRemux>) -> (IngestService, videos::Model) {
        let (store, video) = MockVideoStore::with_video("owner");
        let config = AppConfig {
            temp_dir: dir.to_path_buf(),
            ..AppConfig::default()
        };
        let service = IngestService::new(
            Arc::new(store),
            Arc::new(MockStorage::default()),
            runner,
            config,
        );
        (service, video)
    }

    fn staged_files(h: &Harness) -> usize {
        std::fs::read_dir(h.dir.path()).unwrap().count()
    }

    fn owner() -> Identity {
        Identity {
            user_id: "owner".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_landscape_video() {
        let (store, video) = MockVideoStore::with_video("owner");
        let h = harness(store, video, MockStorage::default(), FakeRunner::with_dimensions(1280, 720));

        let url = h
            .service
            .publish(&h.video, Some("video/mp4"), &b"mp4 bytes"[..], &CancellationToken::new())
            .await
            .unwrap();

        let key = url.strip_prefix("https://cdn.example.com/").unwrap();
        assert!(key.starts_with("landscape/"));
        assert!(key.ends_with(".mp4"));
        assert_eq!(h.store.url_of(&h.video.id).as_deref(), Some(url.as_str()));

        let uploads = h.storage.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, key);
        assert_eq!(uploads[0].1, "video/mp4");
        assert_eq!(uploads[0].2, b"mp4 bytes");

        assert_eq!(staged_files(&h), 0);
    }

    #[tokio::test]
    async fn test_classifier_runs_on_remuxed_artifact() {
        let (store, video) = MockVideoStore::with_video("owner");
        let h = harness(store, video, MockStorage::default(), FakeRunner::with_dimensions(720, 1280));

        let url = h
            .service
            .publish(&h.video, Some("video/mp4"), &b"mp4"[..], &CancellationToken::new())
            .await
            .unwrap();
        assert!(url.contains("/portrait/"));

        let probes = h.runner.calls_to("ffprobe");
        assert_eq!(probes.len(), 1);
        let probed = probes[0].last().unwrap().to_string_lossy().into_owned();
        assert!(probed.ends_with(".faststart.mp4"), "probed {}", probed);
    }

    #[tokio::test]
    async fn test_wrong_content_type_touches_nothing() {
        let (store, video) = MockVideoStore::with_video("owner");
        let h = harness(store, video, MockStorage::default(), FakeRunner::with_dimensions(1280, 720));

        let err = h
            .service
            .publish(&h.video, Some("video/avi"), &b"avi"[..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(staged_files(&h), 0);
        assert!(h.runner.calls.lock().unwrap().is_empty());
        assert!(h.storage.uploads.lock().unwrap().is_empty());
        assert_eq!(h.store.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remux_failure_cleans_up() {
        let (store, video) = MockVideoStore::with_video("owner");
        let h = harness(store, video, MockStorage::default(), FakeRunner::failing_remux("moov atom not found"));

        let err = h
            .service
            .publish(&h.video, Some("video/mp4"), &b"broken"[..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Processing(_)));
        assert!(err.to_string().contains("moov atom not found"));
        assert_eq!(staged_files(&h), 0);
        assert!(h.storage.uploads.lock().unwrap().is_empty());
        assert!(h.store.url_of(&h.video.id).is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_record_untouched() {
        let (store, video) = MockVideoStore::with_video("owner");
        let storage = MockStorage {
            fail: true,
            ..Default::default()
        };
        let h = harness(store, video, storage, FakeRunner::with_dimensions(1280, 720));

        let err = h
            .service
            .publish(&h.video, Some("video/mp4"), &b"mp4"[..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(h.store.updates.load(Ordering::SeqCst), 0);
        assert_eq!(staged_files(&h), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_reported() {
        let (mut store, video) = MockVideoStore::with_video("owner");
        store.fail_updates = true;
        let h = harness(store, video, MockStorage::default(), FakeRunner::with_dimensions(1280, 720));

        let err = h
            .service
            .publish(&h.video, Some("video/mp4"), &b"mp4"[..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(h.storage.uploads.lock().unwrap().len(), 1);
        assert_eq!(staged_files(&h), 0);
    }

    #[tokio::test]
    async fn test_oversize_stream_is_validation_error() {
        let (store, video) = MockVideoStore::with_video("owner");
        let mut h = harness(store, video, MockStorage::default(), FakeRunner::with_dimensions(1280, 720));
        h.service.staging = StagingManager::new(h.dir.path().to_path_buf(), 8);

        let err = h
            .service
            .publish(&h.video, Some("video/mp4"), &[0u8; 64][..], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert_eq!(staged_files(&h), 0);
        assert!(h.runner.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_uploads_get_distinct_keys() {
        let (store, video) = MockVideoStore::with_video("owner");
        let h = harness(store, video, MockStorage::default(), FakeRunner::with_dimensions(1920, 1080));
        let cancel = CancellationToken::new();

        let first = h
            .service
            .publish(&h.video, Some("video/mp4"), &b"one"[..], &cancel)
            .await
            .unwrap();
        let second = h
            .service
            .publish(&h.video, Some("video/mp4"), &b"two"[..], &cancel)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(h.store.url_of(&h.video.id), Some(second));
    }

    #[tokio::test]
    async fn test_dropped_publish_mid_remux_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(StallingRemux::default());
        let (service, video) = stalling_service(dir.path(), runner.clone());
        let cancel = CancellationToken::new();

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            service.publish(&video, Some("video/mp4"), &b"mp4 bytes"[..], &cancel),
        )
        .await;

        assert!(outcome.is_err(), "publish should still be remuxing");
        assert!(runner.started.load(Ordering::SeqCst));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_publish_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(StallingRemux::default());
        let (service, video) = stalling_service(dir.path(), runner.clone());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = service
            .publish(&video, Some("video/mp4"), &b"mp4 bytes"[..], &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Processing(_)));
        assert!(runner.started.load(Ordering::SeqCst));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_authorize_upload() {
        let (store, video) = MockVideoStore::with_video("owner");
        let h = harness(store, video, MockStorage::default(), FakeRunner::with_dimensions(1280, 720));

        let found = h.service.authorize_upload(&owner(), &h.video.id).await.unwrap();
        assert_eq!(found.id, h.video.id);

        let err = h.service.authorize_upload(&owner(), "nope").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = h
            .service
            .authorize_upload(&owner(), &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let stranger = Identity {
            user_id: "stranger".to_string(),
        };
        let err = h
            .service
            .authorize_upload(&stranger, &h.video.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert_eq!(h.store.updates.load(Ordering::SeqCst), 0);
    }
}
