//! Progress-callback trait for intake, preview and export events.
//!
//! Inject an [`Arc<dyn RotationProgressCallback>`] via
//! [`crate::config::RotateConfigBuilder::progress_callback`] to receive events
//! as the session loads files, renders page previews and exports rotated
//! documents.
//!
//! Thumbnail tasks for different files run concurrently, so the thumbnail
//! methods may be called from several threads at once. Export methods are
//! called sequentially, one file at a time.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf_rotate::{RotationProgressCallback, RotateConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     exported: AtomicUsize,
//! }
//!
//! impl RotationProgressCallback for CountingCallback {
//!     fn on_export_complete(&self, file_name: &str, output_name: &str, bytes: usize) {
//!         self.exported.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{file_name} -> {output_name} ({bytes} bytes)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { exported: AtomicUsize::new(0) });
//!
//! let config = RotateConfig::builder()
//!     .progress_callback(counter as Arc<dyn RotationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by a [`crate::session::RotateSession`] as work progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait RotationProgressCallback: Send + Sync {
    /// A file passed validation and its page records were created.
    fn on_file_added(&self, file_name: &str, total_pages: u32) {
        let _ = (file_name, total_pages);
    }

    /// A file was refused at intake (wrong type, too large, unreadable).
    fn on_file_rejected(&self, file_name: &str, reason: &str) {
        let _ = (file_name, reason);
    }

    /// A page preview is about to be rendered.
    ///
    /// # Arguments
    /// * `page_num`    : 1-indexed page number
    /// * `total_pages` : pages in the file
    fn on_thumbnail_start(&self, file_name: &str, page_num: u32, total_pages: u32) {
        let _ = (file_name, page_num, total_pages);
    }

    fn on_thumbnail_complete(&self, file_name: &str, page_num: u32, total_pages: u32) {
        let _ = (file_name, page_num, total_pages);
    }

    /// Rendering or encoding a preview failed. The page stays rotatable.
    fn on_thumbnail_error(&self, file_name: &str, page_num: u32, error: &str) {
        let _ = (file_name, page_num, error);
    }

    fn on_export_start(&self, file_name: &str) {
        let _ = file_name;
    }

    /// Simulated export progress, 0–100.
    fn on_export_progress(&self, file_name: &str, progress: u8) {
        let _ = (file_name, progress);
    }

    /// # Arguments
    /// * `output_name` : suggested download name of the artifact
    /// * `bytes`       : artifact size
    fn on_export_complete(&self, file_name: &str, output_name: &str, bytes: usize) {
        let _ = (file_name, output_name, bytes);
    }

    fn on_export_error(&self, file_name: &str, error: &str) {
        let _ = (file_name, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl RotationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RotateConfig`].
pub type ProgressCallback = Arc<dyn RotationProgressCallback>;
