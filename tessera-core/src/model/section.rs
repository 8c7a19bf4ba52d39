use serde::Serialize;

use crate::segment::{join_sections, segment};

/// Token written between the constituent texts of a merged section.
///
/// It never contains a newline, so a merged section survives a save and
/// re-segment cycle as a single section.
pub const BOUNDARY_MARKER: &str = " \u{241D} ";

/// Stable identity of a section for the lifetime of a [`SectionList`].
///
/// Positions shift on every structural edit; ids do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SectionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    /// Produced directly by segmentation.
    Atomic,
    /// Produced by a combine. `generation` increases with every combine.
    Merged { generation: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: SectionId,
    pub text: String,
    pub kind: SectionKind,
}

impl Section {
    pub fn is_merged(&self) -> bool {
        matches!(self.kind, SectionKind::Merged { .. })
    }

    /// Whether the text still carries at least one boundary marker.
    pub fn has_boundary(&self) -> bool {
        self.text.contains(BOUNDARY_MARKER)
    }
}

/// Ordered sections of one document.
#[derive(Debug, Clone, Default)]
pub struct SectionList {
    sections: Vec<Section>,
    next_id: u64,
    generation: u64,
}

impl SectionList {
    pub fn from_text(text: &str) -> Self {
        let mut list = Self::default();
        for fragment in segment(text) {
            let section = list.atomic(fragment);
            list.sections.push(section);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn id_at(&self, index: usize) -> Option<SectionId> {
        self.sections.get(index).map(|s| s.id)
    }

    pub fn position_of(&self, id: SectionId) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    /// Document text for the current sections.
    pub fn to_document(&self) -> String {
        join_sections(&self.texts())
    }

    pub(crate) fn atomic(&mut self, text: String) -> Section {
        let id = SectionId(self.next_id);
        self.next_id += 1;
        Section {
            id,
            text,
            kind: SectionKind::Atomic,
        }
    }

    pub(crate) fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub(crate) fn sections_mut(&mut self) -> &mut Vec<Section> {
        &mut self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let list = SectionList::from_text("a\n\nb\n\nc");
        let ids: Vec<_> = list.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(list.position_of(ids[2]), Some(2));
    }

    #[test]
    fn test_merged_text_reloads_as_single_section() {
        let text = format!("a{BOUNDARY_MARKER}- b\n\nc");
        let list = SectionList::from_text(&text);
        assert_eq!(list.len(), 2);
        assert!(list.get(0).unwrap().has_boundary());
        assert!(!list.get(0).unwrap().is_merged());
    }
}
