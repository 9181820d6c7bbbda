//! Page rasterisation for previews.
//!
//! The rasteriser is a capability ([`PageRasterizer`]) so the session never
//! depends on pdfium directly: tests plug in fakes, and export never touches
//! it. Implementations are synchronous; callers run them inside
//! `tokio::task::spawn_blocking` because pdfium is not async-safe.

use crate::config::RotateConfig;
use crate::error::PageError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Turns one page of a PDF buffer into a bitmap.
pub trait PageRasterizer: Send + Sync {
    /// Render `page_number` (1-based) of `pdf` at `scale` times its unscaled
    /// viewport. The page's own `/Rotate` is honoured.
    fn rasterize(&self, pdf: &[u8], page_number: u32, scale: f32)
        -> Result<DynamicImage, PageError>;
}

/// [`PageRasterizer`] backed by the pdfium shared library.
///
/// pdfium is bound on each call: a missing library only fails previews, never
/// intake or export.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Bind to the library at `path`, or the system library if `None`.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    /// Use `config.pdfium_library_path`, falling back to `PDFIUM_LIB_PATH`.
    pub fn from_config(config: &RotateConfig) -> Self {
        let library_path = config
            .pdfium_library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));
        Self::new(library_path)
    }

    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path)?,
            None => Pdfium::bind_to_system_library()?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        pdf: &[u8],
        page_number: u32,
        scale: f32,
    ) -> Result<DynamicImage, PageError> {
        let failed = |detail: String| PageError::RenderFailed {
            page: page_number,
            detail,
        };

        let pdfium = self
            .bind()
            .map_err(|e| failed(format!("pdfium unavailable: {:?}", e)))?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| failed(format!("{:?}", e)))?;

        let index = page_number
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| failed("page number out of range".to_string()))?;
        let page = document
            .pages()
            .get(index)
            .map_err(|e| failed(format!("{:?}", e)))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| failed(format!("{:?}", e)))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_number,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
