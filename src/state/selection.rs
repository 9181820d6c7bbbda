//! Selection commands. They only ever touch the selection set.

use super::{EditState, PageId};
use crate::error::RotateError;

impl EditState {
    fn require_page(&self, page: &PageId) -> Result<(), RotateError> {
        let exists = self
            .files
            .iter()
            .any(|f| f.pages.iter().any(|p| &p.id == page));
        if exists {
            Ok(())
        } else {
            Err(RotateError::PageNotFound {
                file: "*".to_string(),
                page: page.to_string(),
            })
        }
    }

    /// Add the page to the selection if absent, remove it otherwise.
    pub fn toggle_selection(&self, page: &PageId) -> Result<Self, RotateError> {
        self.require_page(page)?;
        let mut next = self.clone();
        if !next.selection.remove(page) {
            next.selection.insert(page.clone());
        }
        Ok(next)
    }

    /// Add the page to the selection; selecting twice is harmless.
    pub fn select_page(&self, page: &PageId) -> Result<Self, RotateError> {
        self.require_page(page)?;
        let mut next = self.clone();
        next.selection.insert(page.clone());
        Ok(next)
    }

    /// Select every page of every loaded file.
    pub fn select_all(&self) -> Self {
        let mut next = self.clone();
        next.selection = self
            .files
            .iter()
            .flat_map(|f| f.pages.iter().map(|p| p.id.clone()))
            .collect();
        next
    }

    pub fn clear_selection(&self) -> Self {
        let mut next = self.clone();
        next.selection.clear();
        next
    }
}
