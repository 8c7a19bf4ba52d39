//! Selection, caution and flag annotations over the sections of a document.
//!
//! The sets are keyed by [`SectionId`] so that structural edits only have to
//! remove the ids of sections that disappear; every surviving annotation
//! follows its section to the new position automatically. Positions are only
//! used at the API boundary.

use std::collections::BTreeSet;

use crate::model::{SectionId, SectionList};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSets {
    selected: BTreeSet<SectionId>,
    caution: BTreeSet<SectionId>,
    flagged: BTreeSet<SectionId>,
    anchor: Option<SectionId>,
}

impl AnnotationSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build sets from persisted caution/flag positions.
    ///
    /// Positions are validated against the section count first. A position
    /// present in both lists ends up flagged only.
    pub fn from_positions(
        sections: &SectionList,
        caution: impl IntoIterator<Item = i64>,
        flagged: impl IntoIterator<Item = i64>,
    ) -> Self {
        let mut sets = Self::new();
        let count = sections.len();

        for index in validate(caution, count) {
            if let Some(id) = sections.id_at(index) {
                sets.caution.insert(id);
            }
        }
        for index in validate(flagged, count) {
            if let Some(id) = sections.id_at(index) {
                if sets.caution.remove(&id) {
                    log::warn!("Section {index} was both cautioned and flagged; keeping the flag");
                }
                sets.flagged.insert(id);
            }
        }
        sets
    }

    /// Flip selection of the section at `index`.
    ///
    /// The first section selected into an empty set becomes the range anchor.
    /// Returns false when `index` does not name a section.
    pub fn toggle_selected(&mut self, sections: &SectionList, index: usize) -> bool {
        let Some(id) = resolve(sections, index) else {
            return false;
        };

        if self.selected.remove(&id) {
            if self.anchor == Some(id) {
                self.anchor = sections
                    .iter()
                    .map(|s| s.id)
                    .find(|candidate| self.selected.contains(candidate));
            }
        } else {
            if self.selected.is_empty() {
                self.anchor = Some(id);
            }
            self.selected.insert(id);
        }
        true
    }

    /// Add or remove caution on `index`; adding clears a flag on the same section.
    pub fn toggle_caution(&mut self, sections: &SectionList, index: usize) -> bool {
        let Some(id) = resolve(sections, index) else {
            return false;
        };
        if !self.caution.remove(&id) {
            self.flagged.remove(&id);
            self.caution.insert(id);
        }
        true
    }

    /// Add or remove a flag on `index`; adding clears caution on the same section.
    pub fn toggle_flagged(&mut self, sections: &SectionList, index: usize) -> bool {
        let Some(id) = resolve(sections, index) else {
            return false;
        };
        if !self.flagged.remove(&id) {
            self.caution.remove(&id);
            self.flagged.insert(id);
        }
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    /// Drop every annotation on a section that no longer exists.
    pub(crate) fn forget(&mut self, id: SectionId) {
        self.selected.remove(&id);
        self.caution.remove(&id);
        self.flagged.remove(&id);
        if self.anchor == Some(id) {
            self.anchor = None;
        }
    }

    pub fn selected(&self, sections: &SectionList) -> BTreeSet<usize> {
        positions(&self.selected, sections)
    }

    pub fn caution(&self, sections: &SectionList) -> BTreeSet<usize> {
        positions(&self.caution, sections)
    }

    pub fn flagged(&self, sections: &SectionList) -> BTreeSet<usize> {
        positions(&self.flagged, sections)
    }

    pub fn anchor(&self, sections: &SectionList) -> Option<usize> {
        self.anchor.and_then(|id| sections.position_of(id))
    }

    pub fn is_selected(&self, id: SectionId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_cautioned(&self, id: SectionId) -> bool {
        self.caution.contains(&id)
    }

    pub fn is_flagged(&self, id: SectionId) -> bool {
        self.flagged.contains(&id)
    }
}

fn resolve(sections: &SectionList, index: usize) -> Option<SectionId> {
    let id = sections.id_at(index);
    if id.is_none() {
        log::debug!(
            "Ignoring annotation toggle on section {index}; document has {} sections",
            sections.len()
        );
    }
    id
}

fn positions(ids: &BTreeSet<SectionId>, sections: &SectionList) -> BTreeSet<usize> {
    sections
        .iter()
        .enumerate()
        .filter(|(_, s)| ids.contains(&s.id))
        .map(|(i, _)| i)
        .collect()
}

/// Bring persisted indices into `[0, section_count)`.
///
/// Indices past the end clamp to the last section, negative indices are
/// dropped, and nothing survives when there are no sections.
pub fn validate(indices: impl IntoIterator<Item = i64>, section_count: usize) -> BTreeSet<usize> {
    if section_count == 0 {
        return BTreeSet::new();
    }
    let last = section_count - 1;

    indices
        .into_iter()
        .filter_map(|index| usize::try_from(index).ok())
        .map(|index| index.min(last))
        .collect()
}
