//! Preview encoding: `DynamicImage` → JPEG [`Thumbnail`].
//!
//! Previews are lossy JPEG: they are only looked at, never exported, and a
//! quality around 90 keeps a hundred-page file's previews in a few megabytes.

use crate::error::PageError;
use crate::state::Thumbnail;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

/// Compress a rendered page as a JPEG preview.
pub fn encode_thumbnail(
    img: &DynamicImage,
    page_number: u32,
    quality: u8,
) -> Result<Thumbnail, PageError> {
    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| PageError::EncodeFailed {
            page: page_number,
            detail: e.to_string(),
        })?;

    debug!("Encoded page {} preview → {} bytes", page_number, buf.len());

    Ok(Thumbnail {
        mime_type: "image/jpeg",
        width: rgb.width(),
        height: rgb.height(),
        data: Arc::from(buf),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 14, Rgba([255, 0, 0, 128])));
        let thumb = encode_thumbnail(&img, 1, 92).expect("encode should succeed");
        assert_eq!(thumb.mime_type, "image/jpeg");
        assert_eq!((thumb.width, thumb.height), (10, 14));
        // JPEG SOI marker
        assert_eq!(&thumb.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn decoded_preview_keeps_dimensions() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(31, 17, Rgba([0, 0, 255, 255])));
        let thumb = encode_thumbnail(&img, 3, 50).unwrap();
        let decoded = image::load_from_memory(&thumb.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (31, 17));
    }
}
