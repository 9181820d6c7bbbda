//! The rotation session: one set of loaded files, their edits and exports.
//!
//! [`RotateSession`] ties the pieces together:
//!
//! ```text
//! add_files ──▶ intake::validate ──▶ load ──▶ EditStore ◀── rotate_* / selection
//!                                               │  ▲
//!                         thumbnails (per file) ┘  └ export (sequential batch)
//! ```
//!
//! Intake and loading run per file; a rejected file never reaches the store
//! and never affects its siblings. Each accepted file gets its own preview
//! task. Rotation and selection commands are synchronous snapshot
//! transitions and may be issued at any time, including while previews
//! render or an export runs.

use crate::config::RotateConfig;
use crate::error::RotateError;
use crate::pipeline::export::{self, ExportContext, ExportOutcome};
use crate::pipeline::intake::{self, IntakeFile};
use crate::pipeline::load;
use crate::pipeline::mutate::{DocumentMutator, LopdfMutator};
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::pipeline::thumbnails::{self, ThumbnailContext};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::state::{EditState, EditStore, ExportArtifact, FileId, PageId, RotationDelta};
use crate::status::{self, StatusReport};
use crate::usage::{NoopUsageReporter, UsageReporter};
use futures::Stream;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Builder for [`RotateSession`].
#[derive(Default)]
pub struct RotateSessionBuilder {
    config: Option<RotateConfig>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    mutator: Option<Arc<dyn DocumentMutator>>,
    usage: Option<Arc<dyn UsageReporter>>,
}

impl RotateSessionBuilder {
    pub fn config(mut self, config: RotateConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Preview backend. Default: [`PdfiumRasterizer::from_config`].
    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Export backend. Default: [`LopdfMutator`].
    pub fn mutator(mut self, mutator: Arc<dyn DocumentMutator>) -> Self {
        self.mutator = Some(mutator);
        self
    }

    /// Usage sink. Default: [`NoopUsageReporter`].
    pub fn usage_reporter(mut self, reporter: Arc<dyn UsageReporter>) -> Self {
        self.usage = Some(reporter);
        self
    }

    pub fn build(self) -> RotateSession {
        let config = self.config.unwrap_or_default();
        let rasterizer = self
            .rasterizer
            .unwrap_or_else(|| Arc::new(PdfiumRasterizer::from_config(&config)));
        let progress = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));
        let permits = Arc::new(Semaphore::new(config.max_concurrent_renders));

        RotateSession {
            store: EditStore::default(),
            rasterizer,
            mutator: self.mutator.unwrap_or_else(|| Arc::new(LopdfMutator)),
            usage: self.usage.unwrap_or_else(|| Arc::new(NoopUsageReporter)),
            progress,
            permits,
            tasks: Mutex::new(JoinSet::new()),
            export_lock: tokio::sync::Mutex::new(()),
            session_id: uuid::Uuid::new_v4().to_string(),
            config: Arc::new(config),
        }
    }
}

/// An interactive rotation session.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf_rotate::{IntakeFile, RotateSession, RotationDelta};
///
/// # async fn run(bytes: Vec<u8>) -> Result<(), edgequake_pdf_rotate::RotateError> {
/// let session = RotateSession::builder().build();
/// let id = session
///     .add_files(vec![IntakeFile::pdf("report.pdf", bytes)])
///     .await
///     .remove(0)?;
/// session.rotate_all_pages(&id, RotationDelta::Clockwise)?;
/// let artifact = session.export_file(&id).await?;
/// assert_eq!(artifact.file_name, "report_rotated.pdf");
/// # Ok(())
/// # }
/// ```
pub struct RotateSession {
    config: Arc<RotateConfig>,
    store: EditStore,
    rasterizer: Arc<dyn PageRasterizer>,
    mutator: Arc<dyn DocumentMutator>,
    usage: Arc<dyn UsageReporter>,
    progress: ProgressCallback,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    /// Held for the duration of an export so batches never overlap.
    export_lock: tokio::sync::Mutex<()>,
    session_id: String,
}

impl RotateSession {
    pub fn builder() -> RotateSessionBuilder {
        RotateSessionBuilder::default()
    }

    /// Session with default backends.
    pub fn new(config: RotateConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &RotateConfig {
        &self.config
    }

    /// Random identifier attached to usage events.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // ── Intake ───────────────────────────────────────────────────────────

    /// Validate, load and register each file, then start its previews.
    ///
    /// Results are returned in input order; a rejected file yields its error
    /// and is never added.
    pub async fn add_files(&self, files: Vec<IntakeFile>) -> Vec<Result<FileId, RotateError>> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.add_file(file).await);
        }
        results
    }

    /// Read files from disk (type declared from the extension) and add them.
    pub async fn add_paths(&self, paths: &[PathBuf]) -> Vec<Result<FileId, RotateError>> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let result = match IntakeFile::from_path(path, &self.config).await {
                Ok(file) => self.add_file(file).await,
                Err(e) => {
                    let name = path.display().to_string();
                    self.reject(&name, &e);
                    Err(e)
                }
            };
            results.push(result);
        }
        results
    }

    async fn add_file(&self, file: IntakeFile) -> Result<FileId, RotateError> {
        if let Err(e) = intake::validate(&file, &self.config) {
            self.reject(&file.name, &e);
            return Err(e);
        }
        let loaded = match load::load_document(&file, self.config.fallback_page_size).await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.reject(&file.name, &e);
                return Err(e);
            }
        };

        let id = FileId::generate();
        let name = file.name.clone();
        let total_pages = loaded.total_pages;
        let record = loaded.into_uploaded_file(id.clone(), file);
        self.store.apply(|s| Ok(s.with_file(record)))?;
        info!("Added {} ({} pages) as {}", name, total_pages, id);
        self.progress.on_file_added(&name, total_pages);

        if self.config.previews {
            let ctx = self.thumbnail_context();
            let task_id = id.clone();
            self.spawn_preview(async move { thumbnails::render_file(ctx, task_id).await });
        }
        Ok(id)
    }

    fn reject(&self, name: &str, error: &RotateError) {
        warn!("Rejected {}: {}", name, error);
        self.progress.on_file_rejected(name, &error.to_string());
    }

    /// Remove a file. In-flight preview or export work for it finishes but
    /// its results are discarded.
    pub fn remove_file(&self, id: &FileId) -> Result<(), RotateError> {
        self.store.apply(|s| s.without_file(id))?;
        info!("Removed {}", id);
        Ok(())
    }

    /// Drop every file and the selection.
    pub fn reset(&self) {
        self.store.replace(EditState::default());
        info!("Session reset");
    }

    // ── Commands ─────────────────────────────────────────────────────────

    pub fn rotate_page(
        &self,
        file: &FileId,
        page: &PageId,
        delta: RotationDelta,
    ) -> Result<(), RotateError> {
        self.store.apply(|s| s.rotate_page(file, page, delta))?;
        Ok(())
    }

    pub fn rotate_all_pages(&self, file: &FileId, delta: RotationDelta) -> Result<(), RotateError> {
        self.store.apply(|s| s.rotate_all_pages(file, delta))?;
        Ok(())
    }

    /// Rotate every selected page, across files. Returns how many pages turned.
    pub fn rotate_selected(&self, delta: RotationDelta) -> usize {
        self.store
            .apply_with(|s| {
                let count = s.selection().len();
                (count > 0).then(|| (s.rotate_selected(delta), count))
            })
            .unwrap_or(0)
    }

    pub fn toggle_selection(&self, page: &PageId) -> Result<(), RotateError> {
        self.store.apply(|s| s.toggle_selection(page))?;
        Ok(())
    }

    pub fn select_page(&self, page: &PageId) -> Result<(), RotateError> {
        self.store.apply(|s| s.select_page(page))?;
        Ok(())
    }

    pub fn select_all(&self) {
        self.store.apply_if(|s| Some(s.select_all()));
    }

    pub fn clear_selection(&self) {
        self.store.apply_if(|s| Some(s.clear_selection()));
    }

    // ── Previews ─────────────────────────────────────────────────────────

    /// Re-render one page's preview. Sibling pages are not touched.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn retry_thumbnail(&self, file: &FileId, page: &PageId) -> Result<(), RotateError> {
        let snapshot = self.store.snapshot();
        let f = snapshot.require_file(file)?;
        if f.page(page).is_none() {
            return Err(RotateError::PageNotFound {
                file: file.to_string(),
                page: page.to_string(),
            });
        }
        let ctx = self.thumbnail_context();
        let (file, page) = (file.clone(), page.clone());
        self.spawn_preview(async move {
            thumbnails::render_page(&ctx, &file, &page).await;
        });
        Ok(())
    }

    /// Wait until every preview task started so far (and any started while
    /// waiting) has finished.
    pub async fn wait_for_thumbnails(&self) {
        loop {
            let mut running = std::mem::take(&mut *self.lock_tasks());
            if running.is_empty() {
                return;
            }
            while let Some(joined) = running.join_next().await {
                if let Err(e) = joined {
                    warn!("Preview task failed: {}", e);
                }
            }
        }
    }

    // ── Export ───────────────────────────────────────────────────────────

    /// Export every file in `ready` status, one after another.
    pub async fn process_files(&self) -> Vec<ExportOutcome> {
        let _guard = self.export_lock.lock().await;
        export::export_ready(&self.export_context()).await
    }

    /// Export one file from `ready`, `completed` or `error`.
    pub async fn export_file(&self, id: &FileId) -> Result<ExportArtifact, RotateError> {
        let _guard = self.export_lock.lock().await;
        export::export_one(&self.export_context(), id).await
    }

    /// The file's export artifact, if it has completed.
    pub fn output(&self, id: &FileId) -> Option<ExportArtifact> {
        self.store.snapshot().file(id)?.output().cloned()
    }

    /// Write the file's artifact into `dir`; returns the written path.
    pub async fn write_output(&self, id: &FileId, dir: &Path) -> Result<PathBuf, RotateError> {
        let artifact = {
            let snapshot = self.store.snapshot();
            let file = snapshot.require_file(id)?;
            file.output().cloned().ok_or_else(|| RotateError::NotExported {
                name: file.name.clone(),
            })?
        };
        export::write_artifact(&artifact, dir).await
    }

    // ── Observation ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<EditState> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<EditState>> {
        self.store.subscribe()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::from_state(&self.store.snapshot())
    }

    pub fn status_stream(&self) -> impl Stream<Item = StatusReport> {
        status::status_stream(self.store.subscribe())
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn lock_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Track a preview task, first reaping the ones that already finished.
    fn spawn_preview(&self, task: impl Future<Output = ()> + Send + 'static) {
        let mut tasks = self.lock_tasks();
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                warn!("Preview task failed: {}", e);
            }
        }
        tasks.spawn(task);
    }

    fn thumbnail_context(&self) -> ThumbnailContext {
        ThumbnailContext {
            store: self.store.clone(),
            rasterizer: Arc::clone(&self.rasterizer),
            permits: Arc::clone(&self.permits),
            config: Arc::clone(&self.config),
            progress: Arc::clone(&self.progress),
        }
    }

    fn export_context(&self) -> ExportContext {
        ExportContext {
            store: self.store.clone(),
            mutator: Arc::clone(&self.mutator),
            config: Arc::clone(&self.config),
            progress: Arc::clone(&self.progress),
            usage: Arc::clone(&self.usage),
            session_id: self.session_id.clone(),
        }
    }
}
