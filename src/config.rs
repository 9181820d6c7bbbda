//! Configuration types for a rotation session.
//!
//! Every knob lives in [`RotateConfig`], built via its [`RotateConfigBuilder`].
//! A session clones the config into an `Arc` once, so the thumbnail and export
//! tasks all read the same values for their whole lifetime.

use crate::error::RotateError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default upload limit: 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// ISO A4 in PDF points, used when a page's box cannot be read.
pub const A4_POINTS: (f32, f32) = (595.0, 842.0);

/// Configuration for a [`crate::session::RotateSession`].
///
/// # Example
/// ```rust
/// use edgequake_pdf_rotate::RotateConfig;
///
/// let config = RotateConfig::builder()
///     .preview_scale(0.5)
///     .max_concurrent_renders(4)
///     .output_suffix("_turned")
///     .build()
///     .unwrap();
/// assert_eq!(config.output_suffix, "_turned");
/// ```
#[derive(Clone)]
pub struct RotateConfig {
    /// Largest accepted input in bytes. Default: 100 MiB.
    pub max_file_size: u64,

    /// Declared MIME types accepted at intake. Default: `application/pdf`.
    pub accepted_mime_types: Vec<String>,

    /// Scale applied to the unscaled page viewport for previews. Range: 0.1–4.0. Default: 0.75.
    pub preview_scale: f32,

    /// Render page previews as soon as a file is loaded. Default: true.
    pub previews: bool,

    /// JPEG quality for previews. Range: 1–100. Default: 92.
    pub thumbnail_quality: u8,

    /// Pause between two page renders of the same file, in milliseconds. Default: 100.
    ///
    /// Keeps a large document from monopolising the render slots while other
    /// files and interactive commands are waiting.
    pub page_yield_delay_ms: u64,

    /// Upper bound on rasterisations in flight across all files. Default: 2.
    pub max_concurrent_renders: usize,

    /// Per-page rasterisation timeout. Default: none.
    pub render_timeout_secs: Option<u64>,

    /// Per-file export timeout. Default: none.
    pub export_timeout_secs: Option<u64>,

    /// Progress reported when an export starts. Default: 10.
    pub progress_start: u8,

    /// Progress added on every tick while the page tree is rewritten. Default: 15.
    pub progress_step: u8,

    /// Progress never exceeds this value until the export completes. Default: 85.
    pub progress_ceiling: u8,

    /// Interval between progress ticks, in milliseconds. Default: 500.
    pub progress_tick_ms: u64,

    /// Suffix inserted before `.pdf` in output names. Default: `_rotated`.
    pub output_suffix: String,

    /// Tool identifier sent with usage events. Default: `rotate-pdf`.
    pub tool_id: String,

    /// Page size used when a page's own box cannot be read. Default: A4.
    pub fallback_page_size: (f32, f32),

    /// Explicit libpdfium location. If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Receives intake, thumbnail and export events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_mime_types: vec!["application/pdf".to_string()],
            preview_scale: 0.75,
            previews: true,
            thumbnail_quality: 92,
            page_yield_delay_ms: 100,
            max_concurrent_renders: 2,
            render_timeout_secs: None,
            export_timeout_secs: None,
            progress_start: 10,
            progress_step: 15,
            progress_ceiling: 85,
            progress_tick_ms: 500,
            output_suffix: "_rotated".to_string(),
            tool_id: "rotate-pdf".to_string(),
            fallback_page_size: A4_POINTS,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RotateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotateConfig")
            .field("max_file_size", &self.max_file_size)
            .field("accepted_mime_types", &self.accepted_mime_types)
            .field("preview_scale", &self.preview_scale)
            .field("previews", &self.previews)
            .field("thumbnail_quality", &self.thumbnail_quality)
            .field("page_yield_delay_ms", &self.page_yield_delay_ms)
            .field("max_concurrent_renders", &self.max_concurrent_renders)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("export_timeout_secs", &self.export_timeout_secs)
            .field("progress_start", &self.progress_start)
            .field("progress_step", &self.progress_step)
            .field("progress_ceiling", &self.progress_ceiling)
            .field("progress_tick_ms", &self.progress_tick_ms)
            .field("output_suffix", &self.output_suffix)
            .field("tool_id", &self.tool_id)
            .field("fallback_page_size", &self.fallback_page_size)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RotationProgressCallback>"),
            )
            .finish()
    }
}

impl RotateConfig {
    /// Create a new builder for `RotateConfig`.
    pub fn builder() -> RotateConfigBuilder {
        RotateConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn page_yield_delay(&self) -> Duration {
        Duration::from_millis(self.page_yield_delay_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms.max(1))
    }

    pub fn render_timeout(&self) -> Option<Duration> {
        self.render_timeout_secs.map(Duration::from_secs)
    }

    pub fn export_timeout(&self) -> Option<Duration> {
        self.export_timeout_secs.map(Duration::from_secs)
    }

    /// Whether a declared MIME type is accepted at intake (case-insensitive).
    pub fn accepts_mime_type(&self, mime_type: &str) -> bool {
        let declared = mime_type.trim();
        self.accepted_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(declared))
    }
}

/// Builder for [`RotateConfig`].
#[derive(Debug)]
pub struct RotateConfigBuilder {
    config: RotateConfig,
}

impl RotateConfigBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn accepted_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.accepted_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.preview_scale = scale.clamp(0.1, 4.0);
        self
    }

    pub fn previews(mut self, enabled: bool) -> Self {
        self.config.previews = enabled;
        self
    }

    pub fn thumbnail_quality(mut self, quality: u8) -> Self {
        self.config.thumbnail_quality = quality.clamp(1, 100);
        self
    }

    pub fn page_yield_delay_ms(mut self, ms: u64) -> Self {
        self.config.page_yield_delay_ms = ms;
        self
    }

    pub fn max_concurrent_renders(mut self, n: usize) -> Self {
        self.config.max_concurrent_renders = n.max(1);
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = Some(secs);
        self
    }

    pub fn export_timeout_secs(mut self, secs: u64) -> Self {
        self.config.export_timeout_secs = Some(secs);
        self
    }

    /// Shape the simulated export progress: start value, step per tick, ceiling.
    pub fn export_progress(mut self, start: u8, step: u8, ceiling: u8) -> Self {
        self.config.progress_start = start;
        self.config.progress_step = step;
        self.config.progress_ceiling = ceiling;
        self
    }

    pub fn progress_tick_ms(mut self, ms: u64) -> Self {
        self.config.progress_tick_ms = ms;
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    pub fn tool_id(mut self, id: impl Into<String>) -> Self {
        self.config.tool_id = id.into();
        self
    }

    pub fn fallback_page_size(mut self, width: f32, height: f32) -> Self {
        self.config.fallback_page_size = (width, height);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RotateConfig, RotateError> {
        let c = &self.config;
        if c.max_file_size == 0 {
            return Err(RotateError::InvalidConfig(
                "max_file_size must be > 0".into(),
            ));
        }
        if c.accepted_mime_types.is_empty() {
            return Err(RotateError::InvalidConfig(
                "at least one accepted MIME type is required".into(),
            ));
        }
        if c.progress_start > c.progress_ceiling || c.progress_ceiling >= 100 {
            return Err(RotateError::InvalidConfig(format!(
                "export progress must satisfy start ≤ ceiling < 100, got {}..{}",
                c.progress_start, c.progress_ceiling
            )));
        }
        if c.output_suffix.contains(['/', '\\']) {
            return Err(RotateError::InvalidConfig(format!(
                "output suffix must not contain path separators: '{}'",
                c.output_suffix
            )));
        }
        let (w, h) = c.fallback_page_size;
        if !(w > 0.0 && h > 0.0) {
            return Err(RotateError::InvalidConfig(format!(
                "fallback page size must be positive, got {w}x{h}"
            )));
        }
        Ok(self.config)
    }
}
