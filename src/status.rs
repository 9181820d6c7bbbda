//! Serialisable status reports for external display.
//!
//! A [`StatusReport`] is a flat, `serde`-friendly view of one
//! [`EditState`] snapshot. [`status_stream`] yields a fresh report every time
//! the session's state changes.

use crate::state::{EditState, FileId, PageRecord, UploadedFile};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Status of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatusReport {
    pub id: FileId,
    pub name: String,
    /// `ready`, `processing`, `completed` or `error`.
    pub status: &'static str,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_pages: u32,
    pub thumbnails_rendered: usize,
    pub thumbnails_failed: usize,
    pub thumbnails_loading: usize,
    pub rotated_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
    /// False when the file was edited after its last export, or never exported.
    pub output_current: bool,
}

impl From<&UploadedFile> for FileStatusReport {
    fn from(f: &UploadedFile) -> Self {
        let count = |pred: fn(&PageRecord) -> bool| f.pages.iter().filter(|p| pred(p)).count();
        Self {
            id: f.id.clone(),
            name: f.name.clone(),
            status: f.status.label(),
            progress: f.progress,
            error: f.status.error().map(str::to_string),
            total_pages: f.total_pages,
            thumbnails_rendered: count(|p| p.thumbnail.is_some()),
            thumbnails_failed: count(|p| p.thumbnail_error),
            thumbnails_loading: count(|p| p.thumbnail_loading),
            rotated_pages: count(|p| !p.rotation.is_identity()),
            output_name: f.output().map(|a| a.file_name.clone()),
            output_current: f.output_is_current(),
        }
    }
}

/// Status of the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub files: Vec<FileStatusReport>,
    pub selected_pages: usize,
    pub has_rotations: bool,
    pub is_processing: bool,
}

impl StatusReport {
    pub fn from_state(state: &EditState) -> Self {
        Self {
            files: state.files().iter().map(FileStatusReport::from).collect(),
            selected_pages: state.selection().len(),
            has_rotations: state.has_rotations(),
            is_processing: state.is_processing(),
        }
    }

    /// Files whose last export failed.
    pub fn failed(&self) -> impl Iterator<Item = &FileStatusReport> {
        self.files.iter().filter(|f| f.status == "error")
    }

    /// True once no file is processing and no preview is still loading.
    pub fn is_idle(&self) -> bool {
        !self.is_processing && self.files.iter().all(|f| f.thumbnails_loading == 0)
    }
}

/// Stream of reports: the current one first, then one per state change.
pub fn status_stream(rx: watch::Receiver<Arc<EditState>>) -> impl Stream<Item = StatusReport> {
    WatchStream::new(rx).map(|state| StatusReport::from_state(&state))
}
