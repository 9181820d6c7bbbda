//! Structural document mutation: set page `/Rotate` and re-serialise.
//!
//! Separate from [`super::render`] on purpose: export only ever goes through
//! a [`DocumentMutator`], so a file whose previews all failed still exports.

use super::load;
use crate::error::MutateError;
use crate::state::Rotation;
use lopdf::{Document, ObjectId};
use tracing::{debug, warn};

/// Opens PDF buffers for page-tree edits.
pub trait DocumentMutator: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn MutableDocument>, MutateError>;
}

/// An open document whose page rotations can be changed.
pub trait MutableDocument {
    /// Number of page slots, including slots whose object is unreadable.
    fn page_count(&self) -> u32;

    /// Whether slot `page_number` has a page object that can be edited.
    fn has_page_object(&self, page_number: u32) -> bool {
        (1..=self.page_count()).contains(&page_number)
    }

    /// The page's effective stored rotation (1-based page number).
    fn page_rotation(&self, page_number: u32) -> Result<Rotation, MutateError>;

    /// Set the page's absolute rotation. Nothing else on the page changes.
    fn set_page_rotation(&mut self, page_number: u32, rotation: Rotation)
        -> Result<(), MutateError>;

    fn save(self: Box<Self>) -> Result<Vec<u8>, MutateError>;
}

/// Apply per-page rotation deltas and return the serialised document.
///
/// `deltas[i]` belongs to page `i + 1`. Pages with an identity delta are
/// never written; for the others the stored rotation becomes
/// `(stored + delta) mod 360`.
pub fn apply_rotations(
    mutator: &dyn DocumentMutator,
    bytes: &[u8],
    deltas: &[Rotation],
) -> Result<Vec<u8>, MutateError> {
    let mut doc = mutator.open(bytes)?;
    let page_count = doc.page_count();

    for (index, delta) in deltas.iter().enumerate() {
        if delta.is_identity() {
            continue;
        }
        let page_number = index as u32 + 1;
        if !doc.has_page_object(page_number) {
            warn!(
                "Page {} has no readable page object ({} slots), rotation not applied",
                page_number, page_count
            );
            continue;
        }
        let stored = doc.page_rotation(page_number)?;
        let absolute = stored.compose(*delta);
        debug!("Page {}: {} + {} → {}", page_number, stored, delta, absolute);
        doc.set_page_rotation(page_number, absolute)?;
    }

    doc.save()
}

/// [`DocumentMutator`] backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfMutator;

impl DocumentMutator for LopdfMutator {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn MutableDocument>, MutateError> {
        let doc = Document::load_mem(bytes).map_err(|e| MutateError::Open(e.to_string()))?;
        let slots = load::page_slots(&doc);
        Ok(Box::new(LopdfDocument { doc, slots }))
    }
}

/// Page slots are numbered exactly as the loader numbers them, so slot `n`
/// here is page record `n` in the session.
struct LopdfDocument {
    doc: Document,
    slots: Vec<Option<ObjectId>>,
}

impl LopdfDocument {
    fn page_id(&self, page_number: u32) -> Result<ObjectId, MutateError> {
        let slot = (page_number as usize)
            .checked_sub(1)
            .and_then(|index| self.slots.get(index));
        match slot {
            Some(Some(id)) => Ok(*id),
            Some(None) => Err(MutateError::Page {
                page: page_number,
                detail: "page object unreadable".to_string(),
            }),
            None => Err(MutateError::Page {
                page: page_number,
                detail: "no such page".to_string(),
            }),
        }
    }
}

impl MutableDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.slots.len() as u32
    }

    fn has_page_object(&self, page_number: u32) -> bool {
        self.page_id(page_number).is_ok()
    }

    fn page_rotation(&self, page_number: u32) -> Result<Rotation, MutateError> {
        let id = self.page_id(page_number)?;
        let dict = self.doc.get_dictionary(id).map_err(|e| MutateError::Page {
            page: page_number,
            detail: e.to_string(),
        })?;
        Ok(load::stored_rotation(&self.doc, dict))
    }

    fn set_page_rotation(
        &mut self,
        page_number: u32,
        rotation: Rotation,
    ) -> Result<(), MutateError> {
        let id = self.page_id(page_number)?;
        let dict = self
            .doc
            .get_dictionary_mut(id)
            .map_err(|e| MutateError::Page {
                page: page_number,
                detail: e.to_string(),
            })?;
        dict.set("Rotate", i64::from(rotation.degrees()));
        Ok(())
    }

    fn save(self: Box<Self>) -> Result<Vec<u8>, MutateError> {
        let mut doc = self.doc;
        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| MutateError::Save(e.to_string()))?;
        Ok(out)
    }
}
