//! Error types for the edgequake-pdf-rotate library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`RotateError`]: **Operation-level**: an intake, load, command or export
//!   call could not complete (file rejected, document unreadable, page tree
//!   could not be rewritten). Returned as `Err(RotateError)` from the
//!   [`crate::session::RotateSession`] API and stored as a message on the file
//!   when an export fails.
//!
//! * [`PageError`]: **Page-scoped**: a single preview could not be produced.
//!   It only ever flips the page's thumbnail-error flag; sibling pages, other
//!   files and export are unaffected, and the page can be retried.
//!
//! [`MutateError`] and [`UsageError`] belong to the two external capabilities
//! (the page-tree mutator and the usage sink) and are converted or logged at
//! the boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`RotateError`], matching how the error is
/// surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Wrong type or oversize; the file never entered the pipeline.
    Validation,
    /// Document could not be opened; no page records were created.
    DocumentOpen,
    /// Page-tree rewrite or serialisation failed; retry by exporting again.
    Export,
    /// A command referred to something that does not exist (any more).
    Command,
    /// Reading inputs or writing outputs failed.
    Io,
    /// Unexpected internal failure.
    Internal,
}

/// All operation-level errors returned by the edgequake-pdf-rotate library.
#[derive(Debug, Error)]
pub enum RotateError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Declared type is not an accepted PDF MIME type.
    #[error("{name} is not a PDF file (declared type '{mime_type}')")]
    UnsupportedType { name: String, mime_type: String },

    /// File exceeds the configured size limit.
    #[error("{name} exceeds the {limit_mb}MB limit ({size} bytes)")]
    FileTooLarge {
        name: String,
        size: u64,
        limit_mb: u64,
    },

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("Failed to load {name}: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF is encrypted; rotation needs an unencrypted page tree.
    #[error("Failed to load {name}: document is encrypted")]
    EncryptedPdf { name: String },

    /// The document parsed but contains no pages.
    #[error("Failed to load {name}: document has no pages")]
    EmptyDocument { name: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Opening, rewriting or serialising the page tree failed.
    #[error("Failed to rotate {name}: {detail}")]
    ExportFailed { name: String, detail: String },

    /// A blocking rasterise/export task exceeded its configured timeout.
    #[error("{task} timed out after {secs}s")]
    TaskTimedOut { task: String, secs: u64 },

    // ── Command errors ────────────────────────────────────────────────────
    /// No file with this identifier is loaded.
    #[error("File '{id}' is not loaded")]
    FileNotFound { id: String },

    /// The file has no page with this identifier.
    #[error("Page '{page}' does not exist in file '{file}'")]
    PageNotFound { file: String, page: String },

    /// Export was requested while the same file is still being exported.
    #[error("{name} is already being processed")]
    AlreadyProcessing { name: String },

    /// The file has no export artifact yet (never exported, or export failed).
    #[error("{name} has not been exported")]
    NotExported { name: String },

    /// A rotation delta other than ±90° was supplied.
    #[error("Invalid rotation {degrees}°: only +90 and -90 steps are supported")]
    InvalidRotation { degrees: i64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Input path does not exist.
    #[error("PDF file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the input.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RotateError {
    /// Classify this error for user-facing presentation.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RotateError::UnsupportedType { .. } | RotateError::FileTooLarge { .. } => {
                ErrorCategory::Validation
            }
            RotateError::CorruptPdf { .. }
            | RotateError::EncryptedPdf { .. }
            | RotateError::EmptyDocument { .. } => ErrorCategory::DocumentOpen,
            RotateError::ExportFailed { .. } | RotateError::TaskTimedOut { .. } => {
                ErrorCategory::Export
            }
            RotateError::FileNotFound { .. }
            | RotateError::PageNotFound { .. }
            | RotateError::AlreadyProcessing { .. }
            | RotateError::NotExported { .. }
            | RotateError::InvalidRotation { .. } => ErrorCategory::Command,
            RotateError::InputNotFound { .. }
            | RotateError::PermissionDenied { .. }
            | RotateError::OutputWriteFailed { .. } => ErrorCategory::Io,
            RotateError::InvalidConfig(_) | RotateError::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// A non-fatal error for a single page preview.
///
/// Recorded only as the page's thumbnail-error flag; the message is passed to
/// [`crate::progress::RotationProgressCallback::on_thumbnail_error`] and logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    /// pdfium could not open the document or render the page.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: u32, detail: String },

    /// The rendered bitmap could not be compressed.
    #[error("Page {page}: preview encoding failed: {detail}")]
    EncodeFailed { page: u32, detail: String },

    /// Rendering exceeded the configured timeout.
    #[error("Page {page}: rasterisation timed out after {secs}s")]
    TimedOut { page: u32, secs: u64 },
}

/// Errors raised by a [`crate::pipeline::mutate::DocumentMutator`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutateError {
    /// The document could not be opened for editing.
    #[error("cannot open document: {0}")]
    Open(String),

    /// A page object could not be read or updated.
    #[error("page {page}: {detail}")]
    Page { page: u32, detail: String },

    /// The edited document could not be serialised.
    #[error("cannot serialise document: {0}")]
    Save(String),
}

/// Errors raised by a [`crate::usage::UsageReporter`]. Never block the
/// export path: they are logged at `warn` and dropped.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("usage endpoint returned HTTP {0}")]
    Status(u16),

    #[error("usage request failed: {0}")]
    Transport(String),

    #[error("usage log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("usage event serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_mention_the_file() {
        let e = RotateError::FileTooLarge {
            name: "scan.pdf".into(),
            size: 200 * 1024 * 1024,
            limit_mb: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("scan.pdf"), "got: {msg}");
        assert!(msg.contains("100MB"), "got: {msg}");
        assert_eq!(e.category(), ErrorCategory::Validation);
    }

    #[test]
    fn corrupt_pdf_is_a_document_open_error() {
        let e = RotateError::CorruptPdf {
            name: "broken.pdf".into(),
            detail: "invalid file trailer".into(),
        };
        assert_eq!(e.category(), ErrorCategory::DocumentOpen);
        assert!(e.to_string().contains("invalid file trailer"));
    }

    #[test]
    fn export_and_timeout_share_a_category() {
        let failed = RotateError::ExportFailed {
            name: "a.pdf".into(),
            detail: "boom".into(),
        };
        let timed_out = RotateError::TaskTimedOut {
            task: "export of a.pdf".into(),
            secs: 30,
        };
        assert_eq!(failed.category(), ErrorCategory::Export);
        assert_eq!(timed_out.category(), ErrorCategory::Export);
        assert!(timed_out.to_string().contains("30s"));
    }

    #[test]
    fn page_error_display() {
        let e = PageError::RenderFailed {
            page: 3,
            detail: "bad xref".into(),
        };
        assert!(e.to_string().contains("Page 3"));
    }

    #[test]
    fn invalid_rotation_display() {
        let e = RotateError::InvalidRotation { degrees: 45 };
        assert!(e.to_string().contains("45"));
        assert_eq!(e.category(), ErrorCategory::Command);
    }
}
