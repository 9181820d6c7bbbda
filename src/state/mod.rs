//! In-memory edit model: loaded files, their page records and the
//! cross-file page selection.
//!
//! [`EditState`] is an immutable value. Rotation commands, thumbnail
//! completions and export status changes are all functions from the
//! current snapshot to a new one, and the shared [`EditStore`]
//! swaps snapshots atomically. Async completions therefore never write into a
//! stale reference: they re-read the current snapshot, check that their
//! target still exists, and either produce a successor or leave it alone.
//!
//! Two orthogonal axes live on each [`PageRecord`]:
//!
//! * the **rotation** axis, written only by [`rotation`] commands;
//! * the **preview** axis (`thumbnail*` fields), written only by the
//!   thumbnail pipeline.
//!
//! No transition writes both.

pub mod rotation;
pub mod selection;
pub mod store;

pub use rotation::{Rotation, RotationDelta};
pub use store::EditStore;

use crate::error::RotateError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ── Identifiers ──────────────────────────────────────────────────────────

/// Identifier of an [`UploadedFile`], unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a [`PageRecord`]: `<file id>-page-<n>`.
///
/// Derived from the file id and the 1-based page number, so it is stable for
/// the lifetime of the page slot (retries, rotations and exports never change it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn for_page(file: &FileId, page_number: u32) -> Self {
        Self(format!("{file}-page-{page_number}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Records ──────────────────────────────────────────────────────────────

/// A compressed page preview.
#[derive(Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

impl Thumbnail {
    /// `data:<mime>;base64,…` form, ready for an `<img src>` or a webview.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One physical page of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: PageId,
    /// 1-based, assigned at load time and never reassigned.
    pub page_number: u32,
    /// Accumulated user rotation, relative to the page's stored rotation.
    pub rotation: Rotation,
    /// Unscaled viewport width in points.
    pub width: f32,
    /// Unscaled viewport height in points.
    pub height: f32,
    pub thumbnail: Option<Thumbnail>,
    pub thumbnail_loading: bool,
    pub thumbnail_error: bool,
    /// Bumped every time a render is armed; results from older arms are dropped.
    pub(crate) render_epoch: u64,
}

impl PageRecord {
    pub(crate) fn new(file: &FileId, page_number: u32, width: f32, height: f32) -> Self {
        Self {
            id: PageId::for_page(file, page_number),
            page_number,
            rotation: Rotation::NONE,
            width,
            height,
            thumbnail: None,
            thumbnail_loading: false,
            thumbnail_error: false,
            render_epoch: 0,
        }
    }
}

/// The bytes produced by an export.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Suggested download name, e.g. `report_rotated.pdf`.
    pub file_name: String,
    pub bytes: Arc<[u8]>,
    /// True when no page was rotated and `bytes` is the original buffer.
    pub passthrough: bool,
    /// Per-page rotations (in page order) this artifact was produced from.
    pub applied: Vec<Rotation>,
}

impl fmt::Debug for ExportArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportArtifact")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("passthrough", &self.passthrough)
            .field("applied", &self.applied)
            .finish()
    }
}

/// Export lifecycle of a file: `Ready → Processing → {Completed | Error}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Ready,
    Processing,
    Completed(ExportArtifact),
    Error(String),
}

impl FileStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FileStatus::Ready => "ready",
            FileStatus::Processing => "processing",
            FileStatus::Completed(_) => "completed",
            FileStatus::Error(_) => "error",
        }
    }

    pub fn output(&self) -> Option<&ExportArtifact> {
        match self {
            FileStatus::Completed(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FileStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// One user-supplied document and its page records.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub id: FileId,
    pub name: String,
    /// Original bytes; kept for previews, pass-through and export retries.
    pub bytes: Arc<[u8]>,
    pub status: FileStatus,
    /// 0–100.
    pub progress: u8,
    pub pages: Vec<PageRecord>,
    /// Page count reported by the loader; always equals `pages.len()`.
    pub total_pages: u32,
}

impl UploadedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn page(&self, id: &PageId) -> Option<&PageRecord> {
        self.pages.iter().find(|p| &p.id == id)
    }

    pub fn page_by_number(&self, page_number: u32) -> Option<&PageRecord> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    pub fn has_rotations(&self) -> bool {
        self.pages.iter().any(|p| !p.rotation.is_identity())
    }

    /// Rotations in page order.
    pub fn rotations(&self) -> Vec<Rotation> {
        self.pages.iter().map(|p| p.rotation).collect()
    }

    pub fn output(&self) -> Option<&ExportArtifact> {
        self.status.output()
    }

    /// False when the file was edited after its last export.
    pub fn output_is_current(&self) -> bool {
        self.output()
            .map(|a| a.applied == self.rotations())
            .unwrap_or(false)
    }
}

// ── Snapshot ─────────────────────────────────────────────────────────────

/// Immutable snapshot of every loaded file plus the page selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditState {
    files: Vec<UploadedFile>,
    selection: BTreeSet<PageId>,
}

impl EditState {
    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn file(&self, id: &FileId) -> Option<&UploadedFile> {
        self.files.iter().find(|f| &f.id == id)
    }

    pub fn selection(&self) -> &BTreeSet<PageId> {
        &self.selection
    }

    pub fn is_selected(&self, page: &PageId) -> bool {
        self.selection.contains(page)
    }

    pub fn has_rotations(&self) -> bool {
        self.files.iter().any(UploadedFile::has_rotations)
    }

    pub fn is_processing(&self) -> bool {
        self.files
            .iter()
            .any(|f| f.status == FileStatus::Processing)
    }

    /// Append a newly loaded file.
    pub fn with_file(&self, file: UploadedFile) -> Self {
        let mut next = self.clone();
        next.files.push(file);
        next
    }

    /// Drop a file and prune its pages from the selection.
    pub fn without_file(&self, id: &FileId) -> Result<Self, RotateError> {
        let removed = self.require_file(id)?;
        let mut next = self.clone();
        for page in &removed.pages {
            next.selection.remove(&page.id);
        }
        next.files.retain(|f| &f.id != id);
        Ok(next)
    }

    pub(crate) fn require_file(&self, id: &FileId) -> Result<&UploadedFile, RotateError> {
        self.file(id).ok_or_else(|| RotateError::FileNotFound {
            id: id.to_string(),
        })
    }

    /// Replace one file through `f`; `None` if the file is gone or `f` declines.
    fn map_file(
        &self,
        id: &FileId,
        f: impl FnOnce(&UploadedFile) -> Option<UploadedFile>,
    ) -> Option<Self> {
        let index = self.files.iter().position(|file| &file.id == id)?;
        let replacement = f(&self.files[index])?;
        let mut next = self.clone();
        next.files[index] = replacement;
        Some(next)
    }

    /// Replace one page of one file through `f`; `None` if either is gone.
    fn map_page(
        &self,
        file: &FileId,
        page: &PageId,
        f: impl FnOnce(&PageRecord) -> Option<PageRecord>,
    ) -> Option<Self> {
        self.map_file(file, |current| {
            let index = current.pages.iter().position(|p| &p.id == page)?;
            let replacement = f(&current.pages[index])?;
            let mut updated = current.clone();
            updated.pages[index] = replacement;
            Some(updated)
        })
    }

    // ── Preview axis ─────────────────────────────────────────────────────

    /// Mark a page as rendering. Returns the new snapshot and the epoch the
    /// eventual result must carry, or `None` if the page no longer exists.
    pub(crate) fn arm_thumbnail(&self, file: &FileId, page: &PageId) -> Option<(Self, u64)> {
        let mut epoch = 0;
        let next = self.map_page(file, page, |p| {
            epoch = p.render_epoch + 1;
            Some(PageRecord {
                thumbnail_loading: true,
                thumbnail_error: false,
                render_epoch: epoch,
                ..p.clone()
            })
        })?;
        Some((next, epoch))
    }

    /// Record a render outcome. `None` when the page is gone or a newer
    /// render has been armed since `epoch`.
    pub(crate) fn finish_thumbnail(
        &self,
        file: &FileId,
        page: &PageId,
        epoch: u64,
        thumbnail: Option<Thumbnail>,
    ) -> Option<Self> {
        self.map_page(file, page, |p| {
            if p.render_epoch != epoch {
                return None;
            }
            Some(PageRecord {
                thumbnail_error: thumbnail.is_none(),
                thumbnail,
                thumbnail_loading: false,
                ..p.clone()
            })
        })
    }

    // ── Export status ────────────────────────────────────────────────────

    /// Enter `Processing` from any other status.
    pub(crate) fn begin_export(&self, id: &FileId, start_progress: u8) -> Result<Self, RotateError> {
        let file = self.require_file(id)?;
        if file.status == FileStatus::Processing {
            return Err(RotateError::AlreadyProcessing {
                name: file.name.clone(),
            });
        }
        self.map_file(id, |f| {
            Some(UploadedFile {
                status: FileStatus::Processing,
                progress: start_progress,
                ..f.clone()
            })
        })
        .ok_or_else(|| RotateError::FileNotFound { id: id.to_string() })
    }

    /// Bump progress of a processing file, saturating at `ceiling`.
    pub(crate) fn advance_export(&self, id: &FileId, step: u8, ceiling: u8) -> Option<Self> {
        self.map_file(id, |f| {
            if f.status != FileStatus::Processing || f.progress >= ceiling {
                return None;
            }
            Some(UploadedFile {
                progress: f.progress.saturating_add(step).min(ceiling),
                ..f.clone()
            })
        })
    }

    pub(crate) fn complete_export(&self, id: &FileId, artifact: ExportArtifact) -> Option<Self> {
        self.map_file(id, |f| {
            if f.status != FileStatus::Processing {
                return None;
            }
            Some(UploadedFile {
                status: FileStatus::Completed(artifact),
                progress: 100,
                ..f.clone()
            })
        })
    }

    pub(crate) fn fail_export(&self, id: &FileId, message: String) -> Option<Self> {
        self.map_file(id, |f| {
            if f.status != FileStatus::Processing {
                return None;
            }
            Some(UploadedFile {
                status: FileStatus::Error(message),
                progress: 0,
                ..f.clone()
            })
        })
    }
}
