//! Thumbnail driver: render every page of a file, one page at a time.
//!
//! Pages of one file are strictly sequential. Different files run on
//! different tasks and may interleave; the shared semaphore bounds how many
//! rasterisations are in flight across all of them.
//!
//! Each render is *armed* first (loading = true, error = false, epoch + 1)
//! and its result is applied only if the page still exists and no newer arm
//! happened since. A file removed mid-render therefore never reappears, and a
//! slow first render can never overwrite a later retry.

use super::encode::encode_thumbnail;
use super::render::PageRasterizer;
use crate::config::RotateConfig;
use crate::error::PageError;
use crate::progress::ProgressCallback;
use crate::state::{EditStore, FileId, PageId, Thumbnail};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Everything a render task needs; cheap to clone into a spawned task.
#[derive(Clone)]
pub(crate) struct ThumbnailContext {
    pub store: EditStore,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub permits: Arc<Semaphore>,
    pub config: Arc<RotateConfig>,
    pub progress: ProgressCallback,
}

/// Render all pages of `file` in page order.
pub(crate) async fn render_file(ctx: ThumbnailContext, file: FileId) {
    let pages: Vec<PageId> = match ctx.store.snapshot().file(&file) {
        Some(f) => f.pages.iter().map(|p| p.id.clone()).collect(),
        None => return,
    };
    let total = pages.len();

    let mut rendered = 0usize;
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(ctx.config.page_yield_delay()).await;
        }
        if render_page(&ctx, &file, page).await == Some(true) {
            rendered += 1;
        }
    }
    info!("Previews for {}: {}/{} rendered", file, rendered, total);
}

/// Arm, render and record one page.
///
/// Returns `None` if the result was not applied (page gone or superseded),
/// otherwise whether a thumbnail was produced.
pub(crate) async fn render_page(ctx: &ThumbnailContext, file: &FileId, page: &PageId) -> Option<bool> {
    let epoch = ctx.store.apply_with(|s| s.arm_thumbnail(file, page))?;

    let (name, bytes, page_number, total_pages) = {
        let snapshot = ctx.store.snapshot();
        let f = snapshot.file(file)?;
        let record = f.page(page)?;
        (f.name.clone(), Arc::clone(&f.bytes), record.page_number, f.total_pages)
    };
    ctx.progress
        .on_thumbnail_start(&name, page_number, total_pages);

    let outcome = rasterize_and_encode(ctx, bytes, page_number).await;

    let thumbnail = match outcome {
        Ok(thumb) => {
            debug!("{} page {}: preview {}x{}", name, page_number, thumb.width, thumb.height);
            Some(thumb)
        }
        Err(e) => {
            warn!("{}: {}", name, e);
            None
        }
    };
    let produced = thumbnail.is_some();

    let applied = ctx
        .store
        .apply_if(|s| s.finish_thumbnail(file, page, epoch, thumbnail));
    if !applied {
        debug!("{} page {}: stale preview result discarded", name, page_number);
        return None;
    }

    if produced {
        ctx.progress
            .on_thumbnail_complete(&name, page_number, total_pages);
    } else {
        ctx.progress
            .on_thumbnail_error(&name, page_number, "preview could not be rendered");
    }
    Some(produced)
}

async fn rasterize_and_encode(
    ctx: &ThumbnailContext,
    bytes: Arc<[u8]>,
    page_number: u32,
) -> Result<Thumbnail, PageError> {
    let _permit = Arc::clone(&ctx.permits)
        .acquire_owned()
        .await
        .map_err(|e| PageError::RenderFailed {
            page: page_number,
            detail: e.to_string(),
        })?;

    let rasterizer = Arc::clone(&ctx.rasterizer);
    let scale = ctx.config.preview_scale;
    let quality = ctx.config.thumbnail_quality;
    let handle = tokio::task::spawn_blocking(move || {
        let image = rasterizer.rasterize(&bytes, page_number, scale)?;
        encode_thumbnail(&image, page_number, quality)
    });

    let joined = match ctx.config.render_timeout() {
        Some(limit) => tokio::time::timeout(limit, handle)
            .await
            .map_err(|_| PageError::TimedOut {
                page: page_number,
                secs: limit.as_secs(),
            })?,
        None => handle.await,
    };
    joined.map_err(|e| PageError::RenderFailed {
        page: page_number,
        detail: format!("Render task panicked: {}", e),
    })?
}
