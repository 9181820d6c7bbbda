//! Transform & export: turn accumulated page rotations into an output PDF.
//!
//! Per file the status goes `Ready → Processing → {Completed | Error}`.
//! Either terminal state can be re-entered by exporting again.
//!
//! * No page rotated: the artifact is the original buffer, byte for byte.
//! * Otherwise the page tree is rewritten through a [`DocumentMutator`] on a
//!   blocking thread. The mutator reports no progress, so progress is ticked
//!   from `progress_start` towards `progress_ceiling` while it runs, and jumps
//!   to 100 on completion.
//!
//! A failure marks only that file as errored (progress back to 0). The
//! original bytes stay on the record, so the export can simply be retried.

use super::mutate::{apply_rotations, DocumentMutator};
use crate::config::RotateConfig;
use crate::error::RotateError;
use crate::progress::ProgressCallback;
use crate::state::{EditStore, ExportArtifact, FileId, FileStatus, Rotation};
use crate::usage::{UsageEvent, UsageReporter};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

static RE_PDF_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.pdf$").unwrap());

/// `report.pdf` → `report_rotated.pdf`; `scan` → `scan_rotated.pdf`.
pub fn output_file_name(original: &str, suffix: &str) -> String {
    let replacement = format!("{suffix}.pdf");
    if RE_PDF_EXTENSION.is_match(original) {
        RE_PDF_EXTENSION
            .replace(original, regex::NoExpand(&replacement))
            .into_owned()
    } else {
        format!("{original}{replacement}")
    }
}

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct ExportOutcome {
    pub file: FileId,
    pub name: String,
    pub result: Result<ExportArtifact, RotateError>,
}

/// Everything the engine needs; owned by the session.
#[derive(Clone)]
pub(crate) struct ExportContext {
    pub store: EditStore,
    pub mutator: Arc<dyn DocumentMutator>,
    pub config: Arc<RotateConfig>,
    pub progress: ProgressCallback,
    pub usage: Arc<dyn UsageReporter>,
    pub session_id: String,
}

/// Export every `Ready` file, one at a time, in list order.
pub(crate) async fn export_ready(ctx: &ExportContext) -> Vec<ExportOutcome> {
    let ready: Vec<(FileId, String)> = ctx
        .store
        .snapshot()
        .files()
        .iter()
        .filter(|f| f.status == FileStatus::Ready)
        .map(|f| (f.id.clone(), f.name.clone()))
        .collect();
    info!("Exporting {} file(s)", ready.len());

    let mut outcomes = Vec::with_capacity(ready.len());
    for (file, name) in ready {
        let result = export_one(ctx, &file).await;
        outcomes.push(ExportOutcome { file, name, result });
    }
    outcomes
}

/// Export one file from any status except `Processing`.
pub(crate) async fn export_one(
    ctx: &ExportContext,
    file: &FileId,
) -> Result<ExportArtifact, RotateError> {
    let config = &ctx.config;
    let state = ctx
        .store
        .apply(|s| s.begin_export(file, config.progress_start))?;
    let (name, bytes, rotations) = {
        let f = state.require_file(file)?;
        (f.name.clone(), Arc::clone(&f.bytes), f.rotations())
    };
    ctx.progress.on_export_start(&name);
    ctx.progress.on_export_progress(&name, config.progress_start);

    let result = if rotations.iter().all(|r| r.is_identity()) {
        debug!("{}: no rotations, passing original bytes through", name);
        Ok(ExportArtifact {
            file_name: output_file_name(&name, &config.output_suffix),
            bytes: Arc::clone(&bytes),
            passthrough: true,
            applied: rotations,
        })
    } else {
        rewrite(ctx, file, &name, Arc::clone(&bytes), rotations.clone())
            .await
            .map(|out| ExportArtifact {
                file_name: output_file_name(&name, &config.output_suffix),
                bytes: Arc::from(out),
                passthrough: false,
                applied: rotations,
            })
    };

    match result {
        Ok(artifact) => {
            if !ctx
                .store
                .apply_if(|s| s.complete_export(file, artifact.clone()))
            {
                debug!("{}: removed during export, result discarded", name);
                return Err(RotateError::FileNotFound {
                    id: file.to_string(),
                });
            }
            info!(
                "Exported {} → {} ({} bytes)",
                name,
                artifact.file_name,
                artifact.bytes.len()
            );
            ctx.progress.on_export_progress(&name, 100);
            ctx.progress
                .on_export_complete(&name, &artifact.file_name, artifact.bytes.len());
            report_usage(ctx, bytes.len() as u64);
            Ok(artifact)
        }
        Err(e) => {
            warn!("{}", e);
            ctx.store.apply_if(|s| s.fail_export(file, e.to_string()));
            ctx.progress.on_export_error(&name, &e.to_string());
            Err(e)
        }
    }
}

/// Run the mutator off the runtime, ticking progress until it finishes.
async fn rewrite(
    ctx: &ExportContext,
    file: &FileId,
    name: &str,
    bytes: Arc<[u8]>,
    rotations: Vec<Rotation>,
) -> Result<Vec<u8>, RotateError> {
    let config = &ctx.config;
    let mutator = Arc::clone(&ctx.mutator);
    let mut handle =
        tokio::task::spawn_blocking(move || apply_rotations(mutator.as_ref(), &bytes, &rotations));

    let deadline = async {
        match config.export_timeout() {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval(config.progress_tick());
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            joined = &mut handle => {
                let mutated = joined
                    .map_err(|e| RotateError::Internal(format!("Export task panicked: {}", e)))?;
                return mutated.map_err(|e| RotateError::ExportFailed {
                    name: name.to_string(),
                    detail: e.to_string(),
                });
            }
            _ = ticker.tick() => {
                let advanced = ctx.store.apply_with(|s| {
                    let next = s.advance_export(file, config.progress_step, config.progress_ceiling)?;
                    let progress = next.file(file)?.progress;
                    Some((next, progress))
                });
                if let Some(progress) = advanced {
                    ctx.progress.on_export_progress(name, progress);
                }
            }
            _ = &mut deadline => {
                return Err(RotateError::TaskTimedOut {
                    task: format!("Export of {}", name),
                    secs: config.export_timeout_secs.unwrap_or_default(),
                });
            }
        }
    }
}

fn report_usage(ctx: &ExportContext, byte_size: u64) {
    let event = UsageEvent::single_file(&ctx.config.tool_id, &ctx.session_id, byte_size);
    let pending = ctx.usage.report(event);
    tokio::spawn(async move {
        if let Err(e) = pending.await {
            warn!("Usage report failed: {}", e);
        }
    });
}

/// Write `artifact` into `dir` under its suggested name.
///
/// Only the final component of the name is used, so the file always lands
/// in `dir`. Uses atomic write (temp file in the same directory + persist)
/// so a crash never leaves a truncated PDF behind.
pub async fn write_artifact(artifact: &ExportArtifact, dir: &Path) -> Result<PathBuf, RotateError> {
    let dir = dir.to_path_buf();
    let file_name = Path::new(&artifact.file_name)
        .file_name()
        .ok_or_else(|| RotateError::OutputWriteFailed {
            path: dir.join(&artifact.file_name),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "output name has no file name component",
            ),
        })?;
    let path = dir.join(file_name);
    let bytes = Arc::clone(&artifact.bytes);

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| RotateError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    let target = path.clone();
    tokio::task::spawn_blocking(move || -> Result<(), std::io::Error> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| RotateError::Internal(format!("Write task panicked: {}", e)))?
    .map_err(|e| RotateError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    })?;

    debug!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_replaces_pdf_extension() {
        assert_eq!(output_file_name("report.pdf", "_rotated"), "report_rotated.pdf");
        assert_eq!(output_file_name("Scan.PDF", "_rotated"), "Scan_rotated.pdf");
        assert_eq!(output_file_name("a.b.pdf", "_x"), "a.b_x.pdf");
    }

    #[test]
    fn names_without_extension_get_one() {
        assert_eq!(output_file_name("scan", "_rotated"), "scan_rotated.pdf");
        assert_eq!(output_file_name("notes.txt", "_rotated"), "notes.txt_rotated.pdf");
        assert_eq!(output_file_name("pdf", "_rotated"), "pdf_rotated.pdf");
    }

    #[test]
    fn suffix_with_dollar_is_literal() {
        assert_eq!(output_file_name("a.pdf", "_$1"), "a_$1.pdf");
    }

    #[tokio::test]
    async fn write_artifact_creates_dir_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested/out");
        let artifact = ExportArtifact {
            file_name: "a_rotated.pdf".into(),
            bytes: Arc::from(&b"%PDF-1.5 test"[..]),
            passthrough: false,
            applied: vec![Rotation::QUARTER],
        };
        let path = write_artifact(&artifact, &out_dir).await.unwrap();
        assert_eq!(path, out_dir.join("a_rotated.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5 test");
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn write_artifact_stays_inside_the_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let artifact = ExportArtifact {
            file_name: output_file_name("../../escape.pdf", "_rotated"),
            bytes: Arc::from(&b"%PDF-1.5 test"[..]),
            passthrough: true,
            applied: vec![Rotation::NONE],
        };
        let path = write_artifact(&artifact, &out_dir).await.unwrap();
        assert_eq!(path, out_dir.join("escape_rotated.pdf"));
        assert!(path.exists());
        assert!(!dir.path().join("escape_rotated.pdf").exists());
    }

    #[tokio::test]
    async fn write_artifact_rejects_name_without_file_component() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ExportArtifact {
            file_name: "..".into(),
            bytes: Arc::from(&b"%PDF-1.5 test"[..]),
            passthrough: true,
            applied: vec![],
        };
        let err = write_artifact(&artifact, dir.path()).await.unwrap_err();
        assert!(matches!(err, RotateError::OutputWriteFailed { .. }));
    }
}
