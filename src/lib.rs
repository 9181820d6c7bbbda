//! # edgequake-pdf-rotate
//!
//! Rotate pages of one or more PDF documents, with live page previews and
//! lossless export.
//!
//! ## Why this crate?
//!
//! Fixing sideways scans is a metadata edit: a page's `/Rotate` entry, not its
//! content. This crate keeps it that way. Edits accumulate in memory as
//! quarter-turns per page, and export touches only the `/Rotate` entry of the
//! pages that changed. A file with no edits is passed through byte for byte.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Intake    declared type + size gate (≤ 100 MB, application/pdf)
//!  ├─ 2. Load      page count + per-page geometry via lopdf (spawn_blocking)
//!  ├─ 3. Preview   per-file sequential pdfium renders → JPEG thumbnails
//!  ├─ 4. Edit      rotate page / file / selection: pure snapshot transitions
//!  └─ 5. Export    set /Rotate on changed pages, re-serialise (or pass through)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_rotate::{IntakeFile, RotateConfig, RotateSession, RotationDelta};
//! use std::path::{Path, PathBuf};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = RotateSession::new(RotateConfig::default());
//!     let ids = session.add_paths(&[PathBuf::from("scan.pdf")]).await;
//!     let id = ids.into_iter().next().ok_or("no input")??;
//!
//!     let first_page = session.snapshot().file(&id).ok_or("gone")?.pages[0].id.clone();
//!     session.rotate_page(&id, &first_page, RotationDelta::Clockwise)?;
//!
//!     session.export_file(&id).await?;
//!     let written = session.write_output(&id, Path::new("out")).await?;
//!     eprintln!("wrote {}", written.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfrotate` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdf-rotate = { version = "0.1", default-features = false }
//! ```
//!
//! ## Native library
//!
//! Previews need the pdfium shared library (`PDFIUM_LIB_PATH` or the system
//! library). Loading, editing and export do not: without pdfium every preview
//! is flagged as failed and everything else works.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod state;
pub mod status;
pub mod usage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RotateConfig, RotateConfigBuilder};
pub use error::{ErrorCategory, MutateError, PageError, RotateError, UsageError};
pub use pipeline::export::{output_file_name, ExportOutcome};
pub use pipeline::intake::IntakeFile;
pub use pipeline::mutate::{DocumentMutator, LopdfMutator, MutableDocument};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use progress::{NoopProgressCallback, ProgressCallback, RotationProgressCallback};
pub use session::{RotateSession, RotateSessionBuilder};
pub use state::{
    EditState, ExportArtifact, FileId, FileStatus, PageId, PageRecord, Rotation, RotationDelta,
    Thumbnail, UploadedFile,
};
pub use status::{FileStatusReport, StatusReport};
pub use usage::{HttpUsageReporter, LocalUsageLog, NoopUsageReporter, UsageEvent, UsageReporter};
