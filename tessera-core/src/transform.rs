//! Structural edits: combining sections into one reversible unit and
//! separating a section back into its constituents.
//!
//! Each operation updates the section list and the annotation sets together
//! and either completes or returns [`Declined`] with nothing touched.

use std::collections::BTreeSet;

use crate::annotations::AnnotationSets;
use crate::error::Declined;
use crate::model::{SectionKind, SectionList, BOUNDARY_MARKER};
use crate::segment::segment;

/// What an accepted structural edit did, in positions after the edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// `absorbed` sections were folded into the section now at `position`.
    Combined { position: usize, absorbed: usize },
    /// The section at `position` became `fragments` sections.
    Separated { position: usize, fragments: usize },
}

/// Merge the inclusive range `anchor..=end` into one section at `anchor`.
pub fn combine_range(
    sections: &mut SectionList,
    annotations: &mut AnnotationSets,
    anchor: usize,
    end: usize,
) -> Result<TransformOutcome, Declined> {
    let count = sections.len();
    if end >= count {
        return Err(Declined::OutOfRange { index: end, count });
    }
    if end <= anchor {
        return Err(Declined::InvalidRange { anchor, end });
    }

    let members: BTreeSet<usize> = (anchor..=end).collect();
    Ok(merge(sections, annotations, &members))
}

/// Merge an arbitrary set of positions into one section at the lowest of them.
pub fn combine_selected(
    sections: &mut SectionList,
    annotations: &mut AnnotationSets,
    selected: &BTreeSet<usize>,
) -> Result<TransformOutcome, Declined> {
    let count = sections.len();
    if let Some(&index) = selected.iter().find(|&&i| i >= count) {
        return Err(Declined::OutOfRange { index, count });
    }
    if selected.len() < 2 {
        return Err(Declined::TooFewSections);
    }

    Ok(merge(sections, annotations, selected))
}

/// `members` holds at least two valid positions.
fn merge(
    sections: &mut SectionList,
    annotations: &mut AnnotationSets,
    members: &BTreeSet<usize>,
) -> TransformOutcome {
    let position = *members.iter().next().unwrap_or(&0);
    let generation = sections.next_generation();
    let list = sections.sections_mut();

    let merged = members
        .iter()
        .map(|&i| list[i].text.as_str())
        .collect::<Vec<_>>()
        .join(BOUNDARY_MARKER);

    // Remove from the back so earlier positions stay valid.
    for &index in members.iter().rev().take_while(|&&i| i != position) {
        let removed = list.remove(index);
        annotations.forget(removed.id);
    }

    let target = &mut list[position];
    target.text = merged;
    target.kind = SectionKind::Merged { generation };
    annotations.clear_selection();

    let absorbed = members.len() - 1;
    log::info!("Combined {} sections into section {position} (generation {generation})", members.len());
    TransformOutcome::Combined { position, absorbed }
}

/// Split the section at `index` on its boundary markers, or re-segment it
/// when it has none.
///
/// The first fragment keeps the section's identity, so annotations on
/// `index` stay there and later annotations move right with their sections.
pub fn separate(
    sections: &mut SectionList,
    index: usize,
) -> Result<TransformOutcome, Declined> {
    let count = sections.len();
    let Some(section) = sections.get(index) else {
        return Err(Declined::OutOfRange { index, count });
    };

    let fragments: Vec<String> = if section.has_boundary() {
        section
            .text
            .split(BOUNDARY_MARKER)
            .filter(|part| !part.trim().is_empty())
            .map(str::to_string)
            .collect()
    } else {
        segment(&section.text)
    };

    if fragments.len() < 2 {
        return Err(Declined::CannotSeparate { index });
    }

    let total = fragments.len();
    let mut fragments = fragments.into_iter();
    let head = fragments.next().unwrap_or_default();
    let tail: Vec<_> = fragments.map(|text| sections.atomic(text)).collect();

    let list = sections.sections_mut();
    let target = &mut list[index];
    target.text = head;
    target.kind = SectionKind::Atomic;
    list.splice(index + 1..index + 1, tail);

    log::info!("Separated section {index} into {total} sections");
    Ok(TransformOutcome::Separated {
        position: index,
        fragments: total,
    })
}
