//! File intake: gate uploads by declared type and size.
//!
//! Only the declared MIME type and the byte size are checked here. Content
//! is not sniffed: a buffer that claims to be a PDF but is not one passes
//! intake and fails in [`super::load`] with a document-level error, which is
//! what the user needs to see ("could not be opened") rather than a type error.

use crate::config::RotateConfig;
use crate::error::RotateError;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A raw buffer as handed over by the caller, with its declared type.
#[derive(Clone)]
pub struct IntakeFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl std::fmt::Debug for IntakeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl IntakeFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Shorthand for a buffer declared as `application/pdf`.
    pub fn pdf(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(name, "application/pdf", bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Read a file from disk, declaring its type from the extension.
    ///
    /// Oversize files are rejected from metadata before any bytes are read.
    pub async fn from_path(path: &Path, config: &RotateConfig) -> Result<Self, RotateError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error(path, e))?;
        if !metadata.is_file() {
            return Err(RotateError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        check_size(&name, metadata.len(), config)?;

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
        debug!("Read {} ({} bytes, {})", path.display(), bytes.len(), mime_type);

        Ok(Self {
            name,
            mime_type,
            bytes: Arc::from(bytes),
        })
    }
}

fn io_error(path: &Path, e: std::io::Error) -> RotateError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => RotateError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => RotateError::InputNotFound {
            path: path.to_path_buf(),
        },
    }
}

fn check_size(name: &str, size: u64, config: &RotateConfig) -> Result<(), RotateError> {
    if size > config.max_file_size {
        return Err(RotateError::FileTooLarge {
            name: name.to_string(),
            size,
            limit_mb: config.max_file_size / (1024 * 1024),
        });
    }
    Ok(())
}

/// Accept or reject one file. Rejection never affects other files.
pub fn validate(file: &IntakeFile, config: &RotateConfig) -> Result<(), RotateError> {
    if !config.accepts_mime_type(&file.mime_type) {
        return Err(RotateError::UnsupportedType {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        });
    }
    check_size(&file.name, file.size(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn small_limit() -> RotateConfig {
        RotateConfig::builder().max_file_size(8).build().unwrap()
    }

    #[test]
    fn accepts_pdf_within_limit() {
        let file = IntakeFile::pdf("a.pdf", &b"%PDF-1.4"[..]);
        assert!(validate(&file, &small_limit()).is_ok());
    }

    #[test]
    fn exactly_at_limit_is_accepted() {
        let file = IntakeFile::pdf("a.pdf", vec![0u8; 8]);
        assert!(validate(&file, &small_limit()).is_ok());
    }

    #[test]
    fn rejects_oversize() {
        let file = IntakeFile::pdf("big.pdf", vec![0u8; 9]);
        let err = validate(&file, &small_limit()).unwrap_err();
        assert!(matches!(err, RotateError::FileTooLarge { size: 9, .. }));
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn rejects_wrong_type() {
        let file = IntakeFile::new("photo.png", "image/png", vec![0u8; 4]);
        let err = validate(&file, &RotateConfig::default()).unwrap_err();
        assert!(matches!(err, RotateError::UnsupportedType { .. }));
        assert!(err.to_string().contains("photo.png"));
    }

    #[test]
    fn corrupt_pdf_passes_intake() {
        let file = IntakeFile::pdf("broken.pdf", &b"not a pdf"[..]);
        assert!(validate(&file, &RotateConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn from_path_declares_type_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let file = IntakeFile::from_path(&path, &RotateConfig::default())
            .await
            .unwrap();
        assert_eq!(file.name, "doc.pdf");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.size(), 8);
    }

    #[tokio::test]
    async fn from_path_rejects_oversize_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.pdf");
        std::fs::write(&path, vec![0u8; 32]).unwrap();

        let err = IntakeFile::from_path(&path, &small_limit())
            .await
            .unwrap_err();
        assert!(matches!(err, RotateError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = IntakeFile::from_path(Path::new("/nonexistent/x.pdf"), &RotateConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RotateError::InputNotFound { .. }));
    }
}
