//! Rotation values and the rotation commands.
//!
//! A [`Rotation`] is always one of 0, 90, 180, 270. A [`RotationDelta`] is a
//! single quarter-turn. Applying a delta is `(old + Δ + 360) mod 360`, so any
//! sequence of deltas lands on `(Σ Δ) mod 360` and four equal deltas are the
//! identity.

use super::{EditState, FileId, PageId, PageRecord, UploadedFile};
use crate::error::RotateError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Clockwise page rotation in degrees: 0, 90, 180 or 270.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Rotation(u16);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);
    pub const QUARTER: Rotation = Rotation(90);
    pub const HALF: Rotation = Rotation(180);
    pub const THREE_QUARTERS: Rotation = Rotation(270);

    /// Any multiple of 90, normalised into `0..360`.
    pub fn from_degrees(degrees: i64) -> Result<Self, RotateError> {
        if degrees % 90 != 0 {
            return Err(RotateError::InvalidRotation { degrees });
        }
        Ok(Self(degrees.rem_euclid(360) as u16))
    }

    /// Normalise a stored `/Rotate` value. The PDF format requires a
    /// multiple of 90; anything else is snapped down to the previous quarter.
    pub fn from_stored(degrees: i64) -> Self {
        Self((degrees.rem_euclid(360) / 90 * 90) as u16)
    }

    pub fn degrees(self) -> u16 {
        self.0
    }

    pub fn is_identity(self) -> bool {
        self.0 == 0
    }

    /// True for 90 and 270: the page's width and height trade places.
    pub fn swaps_axes(self) -> bool {
        self.0 == 90 || self.0 == 270
    }

    pub fn apply(self, delta: RotationDelta) -> Self {
        Self(((i32::from(self.0) + i32::from(delta.degrees()) + 360) % 360) as u16)
    }

    /// `(self + other) mod 360`.
    pub fn compose(self, other: Rotation) -> Self {
        Self((self.0 + other.0) % 360)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.0)
    }
}

/// A single quarter-turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationDelta {
    /// +90°
    Clockwise,
    /// −90°
    CounterClockwise,
}

impl RotationDelta {
    pub fn degrees(self) -> i16 {
        match self {
            RotationDelta::Clockwise => 90,
            RotationDelta::CounterClockwise => -90,
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            RotationDelta::Clockwise => RotationDelta::CounterClockwise,
            RotationDelta::CounterClockwise => RotationDelta::Clockwise,
        }
    }
}

impl TryFrom<i64> for RotationDelta {
    type Error = RotateError;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        match degrees {
            90 => Ok(RotationDelta::Clockwise),
            -90 => Ok(RotationDelta::CounterClockwise),
            other => Err(RotateError::InvalidRotation { degrees: other }),
        }
    }
}

impl FromStr for RotationDelta {
    type Err = RotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cw" | "right" | "clockwise" | "+90" | "90" => Ok(RotationDelta::Clockwise),
            "ccw" | "left" | "counterclockwise" | "-90" => Ok(RotationDelta::CounterClockwise),
            other => Err(RotateError::InvalidRotation {
                degrees: other.parse().unwrap_or(0),
            }),
        }
    }
}

fn rotated(page: &PageRecord, delta: RotationDelta) -> PageRecord {
    PageRecord {
        rotation: page.rotation.apply(delta),
        ..page.clone()
    }
}

// ── Commands ─────────────────────────────────────────────────────────────

impl EditState {
    /// Rotate one page of one file.
    pub fn rotate_page(
        &self,
        file: &FileId,
        page: &PageId,
        delta: RotationDelta,
    ) -> Result<Self, RotateError> {
        let current = self.require_file(file)?;
        if current.page(page).is_none() {
            return Err(RotateError::PageNotFound {
                file: file.to_string(),
                page: page.to_string(),
            });
        }
        let mut next = self.clone();
        for f in next.files.iter_mut().filter(|f| &f.id == file) {
            *f = UploadedFile {
                pages: f
                    .pages
                    .iter()
                    .map(|p| if &p.id == page { rotated(p, delta) } else { p.clone() })
                    .collect(),
                ..f.clone()
            };
        }
        Ok(next)
    }

    /// Rotate every page of one file.
    pub fn rotate_all_pages(&self, file: &FileId, delta: RotationDelta) -> Result<Self, RotateError> {
        self.require_file(file)?;
        let mut next = self.clone();
        for f in next.files.iter_mut().filter(|f| &f.id == file) {
            *f = UploadedFile {
                pages: f.pages.iter().map(|p| rotated(p, delta)).collect(),
                ..f.clone()
            };
        }
        Ok(next)
    }

    /// Rotate every selected page, whichever file it belongs to.
    /// An empty selection yields an unchanged snapshot.
    pub fn rotate_selected(&self, delta: RotationDelta) -> Self {
        if self.selection.is_empty() {
            return self.clone();
        }
        let mut next = self.clone();
        for f in next.files.iter_mut() {
            if !f.pages.iter().any(|p| self.selection.contains(&p.id)) {
                continue;
            }
            *f = UploadedFile {
                pages: f
                    .pages
                    .iter()
                    .map(|p| {
                        if self.selection.contains(&p.id) {
                            rotated(p, delta)
                        } else {
                            p.clone()
                        }
                    })
                    .collect(),
                ..f.clone()
            };
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    const CW: RotationDelta = RotationDelta::Clockwise;
    const CCW: RotationDelta = RotationDelta::CounterClockwise;

    fn rotation_of(state: &EditState, file: &str, n: u32) -> u16 {
        state
            .file(&FileId::from(file))
            .and_then(|f| f.page_by_number(n))
            .map(|p| p.rotation.degrees())
            .unwrap()
    }

    #[test]
    fn apply_wraps_in_both_directions() {
        assert_eq!(Rotation::NONE.apply(CCW), Rotation::THREE_QUARTERS);
        assert_eq!(Rotation::THREE_QUARTERS.apply(CW), Rotation::NONE);
        assert_eq!(Rotation::QUARTER.apply(CW), Rotation::HALF);
    }

    #[test]
    fn four_equal_deltas_are_identity() {
        for start in [Rotation::NONE, Rotation::QUARTER, Rotation::HALF, Rotation::THREE_QUARTERS] {
            for delta in [CW, CCW] {
                let end = (0..4).fold(start, |r, _| r.apply(delta));
                assert_eq!(end, start, "start={start} delta={delta:?}");
            }
        }
    }

    #[test]
    fn any_sequence_lands_on_sum_mod_360() {
        let sequence = [CW, CW, CCW, CW, CW, CW, CCW, CCW, CCW, CCW, CCW];
        let sum: i64 = sequence.iter().map(|d| i64::from(d.degrees())).sum();
        let end = sequence.iter().fold(Rotation::NONE, |r, d| r.apply(*d));
        assert_eq!(i64::from(end.degrees()), sum.rem_euclid(360));
    }

    #[test]
    fn from_degrees_normalises_and_rejects_odd_angles() {
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::THREE_QUARTERS);
        assert_eq!(Rotation::from_degrees(450).unwrap(), Rotation::QUARTER);
        assert!(Rotation::from_degrees(45).is_err());
    }

    #[test]
    fn stored_values_are_snapped_to_quarters() {
        assert_eq!(Rotation::from_stored(-270), Rotation::QUARTER);
        assert_eq!(Rotation::from_stored(100), Rotation::QUARTER);
        assert_eq!(Rotation::from_stored(720), Rotation::NONE);
    }

    #[test]
    fn compose_adds_mod_360() {
        assert_eq!(Rotation::THREE_QUARTERS.compose(Rotation::HALF), Rotation::QUARTER);
        assert!(Rotation::QUARTER.swaps_axes());
        assert!(!Rotation::HALF.swaps_axes());
    }

    #[test]
    fn delta_parsing() {
        assert_eq!("cw".parse::<RotationDelta>().unwrap(), CW);
        assert_eq!("+90".parse::<RotationDelta>().unwrap(), CW);
        assert_eq!("-90".parse::<RotationDelta>().unwrap(), CCW);
        assert_eq!("Left".parse::<RotationDelta>().unwrap(), CCW);
        assert!("180".parse::<RotationDelta>().is_err());
        assert_eq!(RotationDelta::try_from(-90).unwrap(), CCW);
        assert!(RotationDelta::try_from(30).is_err());
        assert_eq!(CW.inverse(), CCW);
    }

    #[test]
    fn three_page_file_rotated_page_then_whole_file() {
        let f = FileId::from("doc");
        let p2 = page_id("doc", 2);
        let state = EditState::default().with_file(file("doc", 3));

        let state = state.rotate_page(&f, &p2, CW).unwrap();
        let state = state.rotate_page(&f, &p2, CW).unwrap();
        assert_eq!(rotation_of(&state, "doc", 2), 180);

        let state = state.rotate_all_pages(&f, CW).unwrap();
        assert_eq!(rotation_of(&state, "doc", 1), 90);
        assert_eq!(rotation_of(&state, "doc", 2), 270);
        assert_eq!(rotation_of(&state, "doc", 3), 90);
    }

    #[test]
    fn rotate_selected_spans_files() {
        let state = EditState::default()
            .with_file(file("a", 2))
            .with_file(file("b", 1))
            .toggle_selection(&page_id("a", 1))
            .unwrap()
            .toggle_selection(&page_id("b", 1))
            .unwrap();

        let state = state.rotate_selected(CW);
        assert_eq!(rotation_of(&state, "a", 1), 90);
        assert_eq!(rotation_of(&state, "a", 2), 0);
        assert_eq!(rotation_of(&state, "b", 1), 90);
    }

    #[test]
    fn rotate_selected_with_empty_selection_is_a_no_op() {
        let state = EditState::default().with_file(file("a", 2));
        assert_eq!(state.rotate_selected(CW), state);
    }

    #[test]
    fn rotation_never_touches_preview_or_selection() {
        let f = FileId::from("a");
        let p = page_id("a", 1);
        let (armed, epoch) = EditState::default()
            .with_file(file("a", 1))
            .select_all()
            .arm_thumbnail(&f, &p)
            .unwrap();
        let state = armed
            .finish_thumbnail(&f, &p, epoch, Some(thumbnail()))
            .unwrap();
        let before = state.file(&f).unwrap().page(&p).unwrap().clone();

        let after_state = state.rotate_page(&f, &p, CW).unwrap().rotate_all_pages(&f, CCW).unwrap();
        let after = after_state.file(&f).unwrap().page(&p).unwrap();
        assert_eq!(after.thumbnail, before.thumbnail);
        assert_eq!(after.thumbnail_loading, before.thumbnail_loading);
        assert_eq!(after.thumbnail_error, before.thumbnail_error);
        assert_eq!(after.render_epoch, before.render_epoch);
        assert_eq!(after_state.selection(), state.selection());
    }

    #[test]
    fn unknown_targets_are_reported() {
        let state = EditState::default().with_file(file("a", 1));
        assert!(matches!(
            state.rotate_page(&FileId::from("a"), &page_id("a", 9), CW),
            Err(RotateError::PageNotFound { .. })
        ));
        assert!(matches!(
            state.rotate_all_pages(&FileId::from("zzz"), CW),
            Err(RotateError::FileNotFound { .. })
        ));
    }
}
