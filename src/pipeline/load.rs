//! Document model loader: authoritative page count and per-page geometry.
//!
//! Parsing uses `lopdf` rather than pdfium: it needs no native library, and
//! the export path uses the same parser, so a file that loads here can always
//! be exported.
//!
//! The page count comes from the page tree root's `/Count`, or from the
//! number of leaf slots in the tree when that is larger or missing. Slots are
//! numbered by walking `/Kids` in order, and a kid that cannot be resolved
//! keeps its slot, so the pages after it keep their numbers. A slot whose
//! object or box cannot be read still gets a record, sized with the
//! configured fallback and flagged as a preview error, so one corrupt page
//! never prevents the rest of the file from loading.

use super::intake::IntakeFile;
use crate::error::RotateError;
use crate::state::{FileId, FileStatus, PageRecord, Rotation, UploadedFile};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Limit on `/Parent` hops, guards against cyclic page trees.
const MAX_TREE_DEPTH: usize = 64;

/// Intrinsic geometry of one page slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_number: u32,
    /// Unscaled viewport size in points, after the page's own `/Rotate`.
    pub width: f32,
    pub height: f32,
    /// Rotation already stored in the document (inherited).
    pub stored_rotation: Rotation,
    /// False when the fallback size was used.
    pub readable: bool,
}

/// Result of opening one document.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub total_pages: u32,
    pub pages: Vec<PageGeometry>,
}

impl LoadedDocument {
    /// Materialise the file record: one [`PageRecord`] per page slot, in order.
    pub(crate) fn into_uploaded_file(self, id: FileId, intake: IntakeFile) -> UploadedFile {
        let pages = self
            .pages
            .iter()
            .map(|g| PageRecord {
                thumbnail_error: !g.readable,
                ..PageRecord::new(&id, g.page_number, g.width, g.height)
            })
            .collect();
        UploadedFile {
            id,
            name: intake.name,
            bytes: intake.bytes,
            status: FileStatus::Ready,
            progress: 0,
            pages,
            total_pages: self.total_pages,
        }
    }
}

/// Open `file` off the async runtime and read its page model.
pub async fn load_document(
    file: &IntakeFile,
    fallback_size: (f32, f32),
) -> Result<LoadedDocument, RotateError> {
    let name = file.name.clone();
    let bytes = Arc::clone(&file.bytes);

    tokio::task::spawn_blocking(move || inspect(&name, &bytes, fallback_size))
        .await
        .map_err(|e| RotateError::Internal(format!("Load task panicked: {}", e)))?
}

/// Blocking implementation of [`load_document`].
pub fn inspect(
    name: &str,
    bytes: &[u8],
    fallback_size: (f32, f32),
) -> Result<LoadedDocument, RotateError> {
    let doc = Document::load_mem(bytes).map_err(|e| RotateError::CorruptPdf {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(RotateError::EncryptedPdf {
            name: name.to_string(),
        });
    }

    let slots = page_slots(&doc);
    let declared = declared_page_count(&doc).unwrap_or(0);
    let total_pages = declared.max(slots.len() as u32);
    if total_pages == 0 {
        return Err(RotateError::EmptyDocument {
            name: name.to_string(),
        });
    }
    if declared != 0 && declared != slots.len() as u32 {
        warn!(
            "{}: page tree declares {} pages but has {} slots",
            name,
            declared,
            slots.len()
        );
    }

    let pages = (1..=total_pages)
        .map(|n| {
            let geometry = slots
                .get(n as usize - 1)
                .copied()
                .flatten()
                .and_then(|id| page_geometry(&doc, id, n));
            match geometry {
                Some(g) => g,
                None => {
                    warn!("{}: page {} metadata unreadable, using fallback size", name, n);
                    PageGeometry {
                        page_number: n,
                        width: fallback_size.0,
                        height: fallback_size.1,
                        stored_rotation: Rotation::NONE,
                        readable: false,
                    }
                }
            }
        })
        .collect::<Vec<_>>();

    info!("Loaded {}: {} pages", name, total_pages);
    Ok(LoadedDocument { total_pages, pages })
}

/// `/Count` of the page tree root, if present and sane.
fn declared_page_count(doc: &Document) -> Option<u32> {
    let root = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .ok()?;
    let catalog = doc.get_dictionary(root).ok()?;
    let pages = resolve(doc, catalog.get(b"Pages").ok()?)?.as_dict().ok()?;
    let count = resolve(doc, pages.get(b"Count").ok()?)?.as_i64().ok()?;
    if count > 0 {
        Some(count.min(u16::MAX as i64) as u32)
    } else {
        None
    }
}

/// Leaf page slots in page-tree order, 1-based page `n` at index `n - 1`.
///
/// A kid that is not a reference, or whose object is missing or not a
/// dictionary, stays in the list as `None`.
pub(crate) fn page_slots(doc: &Document) -> Vec<Option<ObjectId>> {
    let mut slots = Vec::new();
    let root = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_dictionary(id))
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference);
    if let Ok(root) = root {
        let mut visited = HashSet::new();
        collect_slots(doc, root, 0, &mut visited, &mut slots);
    }
    slots
}

fn collect_slots(
    doc: &Document,
    node: ObjectId,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    slots: &mut Vec<Option<ObjectId>>,
) {
    if depth >= MAX_TREE_DEPTH || !visited.insert(node) {
        return;
    }
    let Ok(kids) = doc
        .get_dictionary(node)
        .and_then(|dict| dict.get(b"Kids"))
        .and_then(Object::as_array)
    else {
        return;
    };
    for kid in kids {
        let Ok(id) = kid.as_reference() else {
            slots.push(None);
            continue;
        };
        match doc.get_dictionary(id) {
            Ok(child) if is_tree_node(child) => collect_slots(doc, id, depth + 1, visited, slots),
            Ok(_) => slots.push(Some(id)),
            Err(e) => {
                debug!("Page tree kid {:?} unreadable: {}", id, e);
                slots.push(None);
            }
        }
    }
}

/// Intermediate `/Pages` node rather than a leaf page.
fn is_tree_node(dict: &Dictionary) -> bool {
    match dict.get(b"Type").and_then(Object::as_name) {
        Ok(name) => name == b"Pages",
        Err(_) => dict.has(b"Kids"),
    }
}

fn page_geometry(doc: &Document, page_id: ObjectId, page_number: u32) -> Option<PageGeometry> {
    let dict = doc.get_dictionary(page_id).ok()?;
    let (w, h) = inherited(doc, dict, b"CropBox")
        .and_then(|o| box_size(doc, o))
        .or_else(|| inherited(doc, dict, b"MediaBox").and_then(|o| box_size(doc, o)))?;

    let stored_rotation = stored_rotation(doc, dict);
    let (width, height) = if stored_rotation.swaps_axes() {
        (h, w)
    } else {
        (w, h)
    };
    debug!(
        "Page {}: {:.1}x{:.1} pt, stored rotation {}",
        page_number, width, height, stored_rotation
    );

    Some(PageGeometry {
        page_number,
        width,
        height,
        stored_rotation,
        readable: true,
    })
}

/// The page's effective `/Rotate`, following `/Parent` inheritance.
pub(crate) fn stored_rotation(doc: &Document, page: &Dictionary) -> Rotation {
    inherited(doc, page, b"Rotate")
        .and_then(|o| o.as_i64().ok())
        .map(Rotation::from_stored)
        .unwrap_or(Rotation::NONE)
}

/// Look up an inheritable page attribute on the page or its ancestors,
/// resolving indirect references.
pub(crate) fn inherited<'a>(
    doc: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn box_size(doc: &Document, obj: &Object) -> Option<(f32, f32)> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut coords = [0f32; 4];
    for (slot, item) in coords.iter_mut().zip(arr) {
        *slot = number(resolve(doc, item)?)?;
    }
    let width = (coords[2] - coords[0]).abs();
    let height = (coords[3] - coords[1]).abs();
    if width > 0.0 && height > 0.0 {
        Some((width, height))
    } else {
        None
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{pdf_bytes, pdf_bytes_with_dangling_kid, FixturePage};
    use super::*;
    use crate::config::A4_POINTS;
    use crate::error::ErrorCategory;
    use lopdf::dictionary;

    #[test]
    fn reads_page_count_and_sizes() {
        let bytes = pdf_bytes(&[
            FixturePage::letter(),
            FixturePage::sized(200.0, 100.0),
            FixturePage::letter(),
        ]);
        let loaded = inspect("three.pdf", &bytes, A4_POINTS).unwrap();
        assert_eq!(loaded.total_pages, 3);
        assert_eq!(loaded.pages.len(), 3);
        assert_eq!((loaded.pages[0].width, loaded.pages[0].height), (612.0, 792.0));
        assert_eq!((loaded.pages[1].width, loaded.pages[1].height), (200.0, 100.0));
        assert!(loaded.pages.iter().all(|p| p.readable));
    }

    #[test]
    fn stored_rotation_swaps_viewport_axes() {
        let bytes = pdf_bytes(&[FixturePage::sized(200.0, 100.0).rotated(90)]);
        let loaded = inspect("r.pdf", &bytes, A4_POINTS).unwrap();
        let page = loaded.pages[0];
        assert_eq!(page.stored_rotation, Rotation::QUARTER);
        assert_eq!((page.width, page.height), (100.0, 200.0));
    }

    #[test]
    fn crop_box_wins_over_media_box() {
        let bytes = pdf_bytes(&[FixturePage::letter().cropped(300.0, 400.0)]);
        let loaded = inspect("c.pdf", &bytes, A4_POINTS).unwrap();
        assert_eq!((loaded.pages[0].width, loaded.pages[0].height), (300.0, 400.0));
    }

    #[test]
    fn inherited_media_box_and_rotation() {
        let bytes = pdf_bytes(&[FixturePage::inheriting()]);
        let loaded = inspect("i.pdf", &bytes, A4_POINTS).unwrap();
        let page = loaded.pages[0];
        assert!(page.readable);
        // Parent carries a 612x792 MediaBox and /Rotate 270.
        assert_eq!(page.stored_rotation, Rotation::THREE_QUARTERS);
        assert_eq!((page.width, page.height), (792.0, 612.0));
    }

    #[test]
    fn page_without_box_falls_back_and_is_flagged() {
        let bytes = pdf_bytes(&[FixturePage::letter(), FixturePage::boxless()]);
        let loaded = inspect("f.pdf", &bytes, A4_POINTS).unwrap();
        assert_eq!(loaded.total_pages, 2);
        assert!(loaded.pages[0].readable);
        let broken = loaded.pages[1];
        assert!(!broken.readable);
        assert_eq!((broken.width, broken.height), A4_POINTS);
    }

    #[test]
    fn fallback_page_gets_error_flag_on_its_record() {
        let bytes = pdf_bytes(&[FixturePage::boxless()]);
        let loaded = inspect("f.pdf", &bytes, A4_POINTS).unwrap();
        let file = loaded.into_uploaded_file(
            FileId::from("f"),
            IntakeFile::pdf("f.pdf", bytes.clone()),
        );
        assert_eq!(file.pages.len(), 1);
        assert!(file.pages[0].thumbnail_error);
        assert!(!file.pages[0].thumbnail_loading);
    }

    #[test]
    fn dangling_kid_keeps_its_slot() {
        let bytes = pdf_bytes_with_dangling_kid(
            &[FixturePage::sized(200.0, 100.0), FixturePage::sized(300.0, 400.0)],
            1,
        );
        let loaded = inspect("d.pdf", &bytes, A4_POINTS).unwrap();
        assert_eq!(loaded.total_pages, 3);

        let sizes: Vec<_> = loaded.pages.iter().map(|p| (p.width, p.height)).collect();
        assert_eq!(sizes, vec![(200.0, 100.0), A4_POINTS, (300.0, 400.0)]);
        let readable: Vec<_> = loaded.pages.iter().map(|p| p.readable).collect();
        assert_eq!(readable, vec![true, false, true]);
    }

    #[test]
    fn nested_page_tree_slots_are_in_order() {
        let bytes = pdf_bytes(&[
            FixturePage::sized(100.0, 100.0),
            FixturePage::inheriting(),
            FixturePage::sized(300.0, 300.0),
        ]);
        let doc = Document::load_mem(&bytes).unwrap();
        let slots = page_slots(&doc);
        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(Option::is_some));
        assert_eq!(slots.iter().flatten().count(), doc.get_pages().len());
    }

    #[test]
    fn encrypted_trailer_is_rejected() {
        let mut doc = Document::load_mem(&pdf_bytes(&[FixturePage::letter()])).unwrap();
        doc.trailer.set(
            "Encrypt",
            lopdf::dictionary! {
                "Filter" => "Standard",
                "V" => 1_i64,
                "R" => 2_i64,
            },
        );
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let err = inspect("e.pdf", &bytes, A4_POINTS).unwrap_err();
        assert!(matches!(err, RotateError::EncryptedPdf { .. }));
        assert_eq!(err.category(), ErrorCategory::DocumentOpen);
        assert!(err.to_string().contains("e.pdf"));
    }

    #[test]
    fn truncated_buffer_is_a_document_error() {
        let bytes = pdf_bytes(&[FixturePage::letter()]);
        let truncated = &bytes[..bytes.len() / 3];
        let err = inspect("t.pdf", truncated, A4_POINTS).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::DocumentOpen);
    }

    #[test]
    fn garbage_is_a_document_error() {
        let err = inspect("g.pdf", b"hello world", A4_POINTS).unwrap_err();
        assert!(matches!(err, RotateError::CorruptPdf { .. }));
        assert!(err.to_string().contains("g.pdf"));
    }

    #[tokio::test]
    async fn load_document_runs_off_runtime() {
        let bytes = pdf_bytes(&[FixturePage::letter(), FixturePage::letter()]);
        let file = IntakeFile::pdf("two.pdf", bytes);
        let loaded = load_document(&file, A4_POINTS).await.unwrap();
        assert_eq!(loaded.total_pages, 2);
    }
}
