//! Crop sessions: one file, one crop, one upload.
//!
//! A [`PhotoUploader`] owns the configuration, the image backend, the
//! collaborators and the preview registry. Each photo change runs inside a
//! [`PhotoSession`]:
//!
//! ```text
//! open_session ─▶ load ─▶ (edit via editor_mut) ─▶ confirm ─▶ PhotoResult
//!                                             └──▶ cancel
//! ```
//!
//! Only one session per uploader exists at a time. `open_session` takes an
//! owned lock and fails with [`PipelineError::SessionBusy`] while another
//! session holds it; the lock goes away with the session value, whatever
//! terminal path it took.
//!
//! `confirm` runs the stages strictly in order: extraction, optimization,
//! upload, metadata sync. Every surfaced error is also sent to the notifier.
//! When the record write fails after a successful upload, the uploaded
//! object is deleted again (`sync.delete_orphans`).

use crate::config::PhotoConfig;
use crate::editor::{ConfirmedCrop, CropEditor};
use crate::error::PipelineError;
use crate::imaging::{ImageBackend, OutputFormat, extract_crop, optimize_image};
use crate::loader::load_image;
use crate::notify::{NotificationKind, Notifier, Topic};
use crate::preview::PreviewRegistry;
use crate::store::{DocumentStore, IdentityProvider, ObjectStore};
use crate::sync::sync_metadata;
use crate::types::{RemoteAsset, SelectedFile, TargetEntity};
use crate::upload::upload_asset;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// External services the pipeline writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub documents: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub notifier: Arc<dyn Notifier>,
}

/// Editor input for a non-interactive run.
#[derive(Debug, Clone, Default)]
pub struct CropRequest {
    /// Size the image is displayed at. `None` means natural size.
    pub display: Option<(u32, u32)>,
    /// Zoom scale applied before `selection`.
    pub zoom: Option<f64>,
    /// `(x, y, width)` in displayed pixels. `None` keeps the centered default.
    pub selection: Option<(u32, u32, u32)>,
}

/// Summary of a completed session.
#[derive(Debug, Clone)]
pub struct PhotoResult {
    pub target: TargetEntity,
    pub remote: RemoteAsset,
    /// Size of the extracted crop.
    pub extracted: (u32, u32),
    /// Size of the uploaded image.
    pub uploaded: (u32, u32),
    pub format: OutputFormat,
    pub byte_len: usize,
    /// The optimizer failed and the extracted crop was uploaded as-is.
    pub fell_back: bool,
    pub identity_synced: bool,
}

pub struct PhotoUploader {
    config: Arc<PhotoConfig>,
    backend: Arc<dyn ImageBackend>,
    services: Collaborators,
    previews: Arc<PreviewRegistry>,
    lock: Arc<Mutex<()>>,
}

impl PhotoUploader {
    pub fn new(
        config: PhotoConfig,
        backend: Arc<dyn ImageBackend>,
        services: Collaborators,
    ) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            services,
            previews: PreviewRegistry::new(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &PhotoConfig {
        &self.config
    }

    pub fn previews(&self) -> &Arc<PreviewRegistry> {
        &self.previews
    }

    /// Whether a session is currently open.
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    fn report(&self, err: &PipelineError) {
        warn!(error = %err, "photo session failed");
        self.services
            .notifier
            .notify(NotificationKind::Error, err.title(), Some(&err.to_string()));
    }

    /// Start a crop session for `target`.
    ///
    /// Reads the target record's current etag so the final write can detect
    /// a concurrent change.
    pub async fn open_session(
        &self,
        target: TargetEntity,
    ) -> Result<PhotoSession<'_>, PipelineError> {
        let guard = match Arc::clone(&self.lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                let err = PipelineError::SessionBusy;
                self.report(&err);
                return Err(err);
            }
        };

        let expected_etag = if self.config.sync.optimistic_concurrency {
            match self
                .services
                .documents
                .get_entity(target.collection(), target.record_id())
                .await
            {
                Ok(doc) => doc.map(|d| d.etag),
                Err(e) => {
                    let err = PipelineError::MetadataSyncFailed(e);
                    self.report(&err);
                    return Err(err);
                }
            }
        } else {
            None
        };

        info!(entity = %target, "photo session opened");
        Ok(PhotoSession {
            uploader: self,
            editor: CropEditor::new(&self.config.crop),
            target,
            expected_etag,
            _guard: guard,
        })
    }

    /// Open a session, load `file`, apply `request`, and confirm.
    pub async fn run(
        &self,
        target: TargetEntity,
        file: SelectedFile,
        request: &CropRequest,
    ) -> Result<PhotoResult, PipelineError> {
        let mut session = self.open_session(target).await?;
        session.load(file, request.display).await?;
        if let Err(err) = session.apply(request) {
            self.report(&err);
            return Err(err);
        }
        session.confirm().await
    }
}

/// One open crop session. Dropping it releases the source image and the
/// session lock.
pub struct PhotoSession<'a> {
    uploader: &'a PhotoUploader,
    editor: CropEditor,
    target: TargetEntity,
    expected_etag: Option<String>,
    _guard: OwnedMutexGuard<()>,
}

impl PhotoSession<'_> {
    pub fn target(&self) -> &TargetEntity {
        &self.target
    }

    pub fn editor(&self) -> &CropEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut CropEditor {
        &mut self.editor
    }

    /// Decode `file` and hand it to the editor.
    pub async fn load(
        &mut self,
        file: SelectedFile,
        display: Option<(u32, u32)>,
    ) -> Result<(), PipelineError> {
        let uploader = self.uploader;
        if let Err(err) = self.editor.begin_loading() {
            let err = PipelineError::from(err);
            uploader.report(&err);
            return Err(err);
        }
        uploader
            .services
            .notifier
            .announce(Topic::Status, "Loading image");

        let backend = Arc::clone(&uploader.backend);
        let previews = Arc::clone(&uploader.previews);
        let loaded = tokio::task::spawn_blocking(move || load_image(&*backend, &previews, file))
            .await
            .map_err(|e| PipelineError::DecodeFailed(e.to_string()))
            .and_then(|result| result);

        match loaded {
            Ok(source) => {
                self.editor.image_loaded(source, display)?;
                Ok(())
            }
            Err(err) => {
                self.editor.load_failed()?;
                uploader.report(&err);
                Err(err)
            }
        }
    }

    fn apply(&mut self, request: &CropRequest) -> Result<(), PipelineError> {
        if let Some(zoom) = request.zoom {
            self.editor.set_zoom(zoom)?;
        }
        if let Some((x, y, width)) = request.selection {
            self.editor.select_pixels(x, y, width)?;
        }
        Ok(())
    }

    /// Confirm the crop and run extraction, optimization, upload and sync.
    pub async fn confirm(mut self) -> Result<PhotoResult, PipelineError> {
        let result = self.process().await;
        let notifier = &self.uploader.services.notifier;
        match &result {
            Ok(done) => {
                info!(entity = %done.target, url = %done.remote.url, "photo updated");
                notifier.notify(
                    NotificationKind::Success,
                    "Photo updated",
                    Some(&done.remote.url),
                );
            }
            Err(err) => self.uploader.report(err),
        }
        result
    }

    async fn process(&mut self) -> Result<PhotoResult, PipelineError> {
        let uploader = self.uploader;
        let services = &uploader.services;
        let config = Arc::clone(&uploader.config);

        let ConfirmedCrop {
            source,
            crop,
            display,
        } = self.editor.confirm()?;
        services
            .notifier
            .notify(NotificationKind::Loading, "Uploading photo", None);
        services.notifier.announce(Topic::Status, "Processing image");

        let backend = Arc::clone(&uploader.backend);
        let previews = Arc::clone(&uploader.previews);
        let stage_config = Arc::clone(&config);
        let (extracted, asset) = tokio::task::spawn_blocking(move || {
            let mut source = source;
            let blob = extract_crop(&*backend, &source, crop, display, &stage_config.extract);
            source.release();
            blob.map(|blob| {
                let asset = optimize_image(&*backend, &previews, &blob, &stage_config.optimize);
                ((blob.width, blob.height), asset)
            })
        })
        .await
        .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))??;

        let remote = upload_asset(&*services.objects, &self.target, &asset, &config.storage).await?;

        let expected_etag = self
            .expected_etag
            .as_deref()
            .filter(|_| config.sync.optimistic_concurrency);
        let outcome = match sync_metadata(
            &*services.documents,
            &*services.identity,
            &self.target,
            &remote,
            expected_etag,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                if config.sync.delete_orphans {
                    self.compensate(&remote).await;
                }
                return Err(err);
            }
        };

        Ok(PhotoResult {
            target: self.target.clone(),
            extracted,
            uploaded: (asset.width, asset.height),
            format: asset.format,
            byte_len: asset.bytes.len(),
            fell_back: asset.fell_back,
            identity_synced: outcome.identity_synced,
            remote,
        })
    }

    async fn compensate(&self, remote: &RemoteAsset) {
        match self
            .uploader
            .services
            .objects
            .delete_object(&remote.path)
            .await
        {
            Ok(()) => info!(path = %remote.path, "deleted orphaned upload"),
            Err(err) => warn!(path = %remote.path, error = %err, "orphaned upload left behind"),
        }
    }

    /// Abort the session. The source image preview is released.
    pub fn cancel(mut self) -> Result<(), PipelineError> {
        self.editor.cancel()?;
        self.uploader
            .services
            .notifier
            .announce(Topic::Status, "Photo selection cancelled");
        info!(entity = %self.target, "photo session cancelled");
        Ok(())
    }
}
