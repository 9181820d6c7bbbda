//! In-memory PDFs for unit tests, built with `lopdf`.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// Shape of one synthesised page.
#[derive(Debug, Clone, Default)]
pub(crate) struct FixturePage {
    media_box: Option<(f32, f32)>,
    crop_box: Option<(f32, f32)>,
    rotate: Option<i64>,
    /// Wrap the page in an intermediate `/Pages` node carrying a 612x792
    /// MediaBox and `/Rotate 270`.
    inherit: bool,
}

impl FixturePage {
    pub(crate) fn letter() -> Self {
        Self::sized(612.0, 792.0)
    }

    pub(crate) fn sized(width: f32, height: f32) -> Self {
        Self {
            media_box: Some((width, height)),
            ..Self::default()
        }
    }

    pub(crate) fn boxless() -> Self {
        Self::default()
    }

    pub(crate) fn inheriting() -> Self {
        Self {
            inherit: true,
            ..Self::default()
        }
    }

    pub(crate) fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }

    pub(crate) fn cropped(mut self, width: f32, height: f32) -> Self {
        self.crop_box = Some((width, height));
        self
    }
}

fn rect(width: f32, height: f32) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(width),
        Object::Real(height),
    ])
}

/// Serialise a document with the given pages.
pub(crate) fn pdf_bytes(pages: &[FixturePage]) -> Vec<u8> {
    pdf_bytes_declaring(pages, pages.len() as i64)
}

/// Like [`pdf_bytes`] but with an arbitrary `/Count` on the page tree root.
pub(crate) fn pdf_bytes_declaring(pages: &[FixturePage], count: i64) -> Vec<u8> {
    build(pages, count, None)
}

/// Like [`pdf_bytes`] with a reference to a missing object inserted into
/// `/Kids` at index `at`. `/Count` includes it.
pub(crate) fn pdf_bytes_with_dangling_kid(pages: &[FixturePage], at: usize) -> Vec<u8> {
    build(pages, pages.len() as i64 + 1, Some(at))
}

fn build(pages: &[FixturePage], count: i64, dangling_at: Option<usize>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let mut dict = dictionary! {
            "Type" => "Page",
            "Contents" => content_id,
        };
        if let Some((w, h)) = page.media_box {
            dict.set("MediaBox", rect(w, h));
        }
        if let Some((w, h)) = page.crop_box {
            dict.set("CropBox", rect(w, h));
        }
        if let Some(r) = page.rotate {
            dict.set("Rotate", r);
        }

        if page.inherit {
            let node_id = doc.new_object_id();
            dict.set("Parent", node_id);
            let page_id = doc.add_object(dict);
            doc.objects.insert(
                node_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Pages",
                    "Parent" => pages_id,
                    "Kids" => vec![Object::Reference(page_id)],
                    "Count" => 1_i64,
                    "MediaBox" => rect(612.0, 792.0),
                    "Rotate" => 270_i64,
                }),
            );
            kids.push(Object::Reference(node_id));
        } else {
            dict.set("Parent", pages_id);
            kids.push(Object::Reference(doc.add_object(dict)));
        }
    }

    if let Some(at) = dangling_at {
        kids.insert(at.min(kids.len()), Object::Reference((9999, 0)));
    }

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
    doc.save_to(&mut out).expect("fixture PDF serialises");
    out
}

/// Each page's own `/Rotate` entry (not inherited), in page order.
pub(crate) fn own_rotate_entries(bytes: &[u8]) -> Vec<Option<i64>> {
    let doc = Document::load_mem(bytes).expect("fixture PDF parses");
    doc.get_pages()
        .values()
        .map(|&id: &ObjectId| {
            doc.get_dictionary(id)
                .ok()
                .and_then(|d| d.get(b"Rotate").ok())
                .and_then(|o| o.as_i64().ok())
        })
        .collect()
}
