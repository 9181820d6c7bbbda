//! Shared helpers for the integration tests: synthetic PDFs and fake backends.
//!
//! Nothing here needs the pdfium native library.

#![allow(dead_code)]

use edgequake_pdf_rotate::{
    DocumentMutator, LopdfMutator, MutableDocument, MutateError, PageError, PageRasterizer,
    RotateConfig, RotateSession, UsageError, UsageEvent, UsageReporter,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use image::{DynamicImage, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

// ── PDFs ─────────────────────────────────────────────────────────────────────

/// A letter-sized PDF with `pages` pages and no `/Rotate` entries.
pub fn letter_pdf(pages: usize) -> Vec<u8> {
    pdf_with_rotations(&vec![None; pages])
}

/// One page per entry; `Some(deg)` writes a `/Rotate` entry on that page.
pub fn pdf_with_rotations(rotations: &[Option<i64>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(rotations.len());

    for rotate in rotations {
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        };
        if let Some(deg) = rotate {
            page.set("Rotate", *deg);
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("test PDF serialises");
    out
}

/// Each page's `/Rotate` entry in page order; `None` when absent.
pub fn stored_rotations(bytes: &[u8]) -> Vec<Option<i64>> {
    let doc = Document::load_mem(bytes).expect("exported PDF parses");
    doc.get_pages()
        .values()
        .map(|&id| {
            doc.get_dictionary(id)
                .ok()
                .and_then(|d| d.get(b"Rotate").ok())
                .and_then(|o| o.as_i64().ok())
        })
        .collect()
}

/// The header and first few objects of a valid PDF, with no xref or trailer.
pub fn truncated_pdf() -> Vec<u8> {
    let mut bytes = letter_pdf(2);
    bytes.truncate(64);
    bytes
}

// ── Sessions ─────────────────────────────────────────────────────────────────

pub fn fast_config() -> RotateConfig {
    RotateConfig::builder()
        .page_yield_delay_ms(0)
        .progress_tick_ms(5)
        .build()
        .expect("valid config")
}

/// Session with a rasterizer that always succeeds.
pub fn session() -> RotateSession {
    RotateSession::builder()
        .config(fast_config())
        .rasterizer(Arc::new(FakeRasterizer::default()))
        .build()
}

// ── Rasterizers ──────────────────────────────────────────────────────────────

/// Produces a tiny bitmap; fails for the listed page numbers.
#[derive(Default)]
pub struct FakeRasterizer {
    pub failing: HashSet<u32>,
    pub calls: AtomicUsize,
}

impl FakeRasterizer {
    pub fn failing(pages: &[u32]) -> Self {
        Self {
            failing: pages.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl PageRasterizer for FakeRasterizer {
    fn rasterize(&self, _pdf: &[u8], page: u32, _scale: f32) -> Result<DynamicImage, PageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&page) {
            return Err(PageError::RenderFailed {
                page,
                detail: "forced failure".into(),
            });
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::new(6, 8)))
    }
}

/// Blocks every render until [`GatedRasterizer::open`] is called.
#[derive(Default)]
pub struct GatedRasterizer {
    gate: Mutex<bool>,
    opened: Condvar,
    pub entered: AtomicUsize,
}

impl GatedRasterizer {
    pub fn open(&self) {
        *self.gate.lock().unwrap() = true;
        self.opened.notify_all();
    }
}

impl PageRasterizer for GatedRasterizer {
    fn rasterize(&self, _pdf: &[u8], _page: u32, _scale: f32) -> Result<DynamicImage, PageError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.gate.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::new(6, 8)))
    }
}

// ── Mutators ─────────────────────────────────────────────────────────────────

/// Delegates to [`LopdfMutator`] but refuses documents with the given page count.
pub struct PickyMutator {
    pub refuse_page_count: u32,
}

impl DocumentMutator for PickyMutator {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn MutableDocument>, MutateError> {
        let doc = LopdfMutator.open(bytes)?;
        if doc.page_count() == self.refuse_page_count {
            return Err(MutateError::Open("refused by test mutator".into()));
        }
        Ok(doc)
    }
}

/// Delegates to [`LopdfMutator`], stalling on documents with the given page
/// count before handing them back.
pub struct SlowMutator {
    pub slow_page_count: u32,
    pub delay: Duration,
}

impl DocumentMutator for SlowMutator {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn MutableDocument>, MutateError> {
        let doc = LopdfMutator.open(bytes)?;
        if doc.page_count() == self.slow_page_count {
            std::thread::sleep(self.delay);
        }
        Ok(doc)
    }
}

// ── Usage reporters ──────────────────────────────────────────────────────────

/// Always fails, counting attempts.
#[derive(Default)]
pub struct FailingUsageReporter {
    pub attempts: Arc<AtomicUsize>,
}

impl UsageReporter for FailingUsageReporter {
    fn report(&self, _event: UsageEvent) -> BoxFuture<'static, Result<(), UsageError>> {
        let attempts = Arc::clone(&self.attempts);
        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(UsageError::Status(503))
        }
        .boxed()
    }
}
