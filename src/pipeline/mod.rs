//! Pipeline stages for loading, previewing and exporting PDFs.
//!
//! Each submodule implements exactly one step. The two document capabilities
//! are kept apart: [`render`] produces pixels, [`mutate`] edits the page
//! tree, and export never depends on a preview having succeeded.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ load ──▶ thumbnails ──▶ render ──▶ encode
//! (gate)    (lopdf)   (per file)    (pdfium)   (JPEG)
//!              │
//!              └────▶ export ──▶ mutate
//!                     (status)   (lopdf /Rotate)
//! ```
//!
//! 1. [`intake`] : reject wrong declared types and oversize buffers
//! 2. [`load`]   : authoritative page count and per-page geometry; runs in
//!    `spawn_blocking`
//! 3. [`thumbnails`] : drive previews page by page, apply results only to
//!    pages that still exist
//! 4. [`render`] : rasterise one page; pdfium is not async-safe, so this runs
//!    in `spawn_blocking` under a global semaphore
//! 5. [`encode`] : compress the bitmap as a JPEG preview
//! 6. [`export`] : status machine, pass-through, progress ticks, naming
//! 7. [`mutate`] : set `/Rotate` on changed pages and re-serialise

pub mod encode;
pub mod export;
pub mod intake;
pub mod load;
pub mod mutate;
pub mod render;
pub(crate) mod thumbnails;

#[cfg(test)]
pub(crate) mod fixtures;
