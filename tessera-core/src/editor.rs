//! Editing session over one sectioned document and its collaborators.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::annotations::AnnotationSets;
use crate::boundary::{
    partition_comments, AnnotationKey, AnnotationState, AnnotationStore, CommentSource, DocumentSink, ExportSink,
};
use crate::error::Declined;
use crate::export::{self, ExportContext, ExportDocument, ExportMode, ExportOutcome, DEFAULT_PREVIEW_CHARS};
use crate::model::{Comment, CommentMap, Section, SectionId, SectionList};
use crate::transform::{self, TransformOutcome};

/// One document being sectioned and annotated.
///
/// Owns the document text, its sections, the annotation sets and the cached
/// comments. In-memory state is always updated first; when the store or the
/// document sink then fails, the editor is marked unsaved and keeps the new
/// state.
pub struct SectionEditor<S, D> {
    key: AnnotationKey,
    document: String,
    sections: SectionList,
    annotations: AnnotationSets,
    comments: CommentMap,
    thread: Vec<Comment>,
    store: S,
    sink: D,
    unsaved: bool,
    document_dirty: bool,
    preview_chars: usize,
}

impl<S: AnnotationStore, D: DocumentSink> SectionEditor<S, D> {
    /// Segment `document` and restore persisted caution/flag state for `key`.
    pub fn open(key: AnnotationKey, document: String, mut store: S, sink: D) -> Self {
        let sections = SectionList::from_text(&document);

        let annotations = match store.load(&key) {
            Ok(Some(state)) => {
                AnnotationSets::from_positions(&sections, state.caution_sections, state.flagged_sections)
            }
            Ok(None) => AnnotationSets::new(),
            Err(e) => {
                log::warn!("Failed to load annotations for {}/{}: {e:#}", key.entity_type, key.entity_id);
                AnnotationSets::new()
            }
        };

        log::debug!("Opened {}/{} with {} sections", key.entity_type, key.entity_id, sections.len());
        Self {
            key,
            document,
            sections,
            annotations,
            comments: CommentMap::new(),
            thread: Vec::new(),
            store,
            sink,
            unsaved: false,
            document_dirty: false,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn key(&self) -> &AnnotationKey {
        &self.key
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn sections(&self) -> &SectionList {
        &self.sections
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn selected(&self) -> BTreeSet<usize> {
        self.annotations.selected(&self.sections)
    }

    pub fn caution(&self) -> BTreeSet<usize> {
        self.annotations.caution(&self.sections)
    }

    pub fn flagged(&self) -> BTreeSet<usize> {
        self.annotations.flagged(&self.sections)
    }

    pub fn anchor(&self) -> Option<usize> {
        self.annotations.anchor(&self.sections)
    }

    pub fn annotations(&self) -> &AnnotationSets {
        &self.annotations
    }

    pub fn comments(&self) -> &CommentMap {
        &self.comments
    }

    /// Comments on the entity as a whole.
    pub fn thread(&self) -> &[Comment] {
        &self.thread
    }

    /// True after a store or document write failed and has not been retried.
    pub fn is_unsaved(&self) -> bool {
        self.unsaved
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn toggle_selected(&mut self, index: usize) -> bool {
        self.annotations.toggle_selected(&self.sections, index)
    }

    pub fn clear_selection(&mut self) {
        self.annotations.clear_selection();
    }

    pub fn toggle_caution(&mut self, index: usize) -> bool {
        let changed = self.annotations.toggle_caution(&self.sections, index);
        if changed {
            self.save_annotations();
        }
        changed
    }

    pub fn toggle_flagged(&mut self, index: usize) -> bool {
        let changed = self.annotations.toggle_flagged(&self.sections, index);
        if changed {
            self.save_annotations();
        }
        changed
    }

    /// Combine every selected section into the lowest selected one.
    pub fn combine_selected(&mut self) -> Result<TransformOutcome, Declined> {
        let selected = self.selected();
        let before = self.section_ids();
        let outcome = transform::combine_selected(&mut self.sections, &mut self.annotations, &selected)?;
        self.after_structural_edit(&before);
        Ok(outcome)
    }

    /// Combine from the range anchor through `end`.
    pub fn combine_to(&mut self, end: usize) -> Result<TransformOutcome, Declined> {
        let anchor = self.anchor().ok_or(Declined::NoRangeAnchor)?;
        self.combine_range(anchor, end)
    }

    pub fn combine_range(&mut self, anchor: usize, end: usize) -> Result<TransformOutcome, Declined> {
        let before = self.section_ids();
        let outcome = transform::combine_range(&mut self.sections, &mut self.annotations, anchor, end)?;
        self.after_structural_edit(&before);
        Ok(outcome)
    }

    pub fn separate(&mut self, index: usize) -> Result<TransformOutcome, Declined> {
        let before = self.section_ids();
        let outcome = transform::separate(&mut self.sections, index)?;
        self.after_structural_edit(&before);
        Ok(outcome)
    }

    /// Replace the document after an edit made outside the engine.
    ///
    /// Annotations survive by position only when the section count is
    /// unchanged; otherwise they are reset.
    pub fn external_edit(&mut self, document: String) {
        if document == self.document {
            return;
        }

        let caution = self.caution();
        let flagged = self.flagged();
        let sections = SectionList::from_text(&document);

        self.annotations = if sections.len() == self.sections.len() {
            let as_i64 = |set: BTreeSet<usize>| set.into_iter().filter_map(|i| i64::try_from(i).ok());
            AnnotationSets::from_positions(&sections, as_i64(caution), as_i64(flagged))
        } else {
            log::info!(
                "Section count changed from {} to {}; resetting annotations",
                self.sections.len(),
                sections.len()
            );
            AnnotationSets::new()
        };

        self.sections = sections;
        self.document = document;
        self.comments.retain(|&index, _| index < self.sections.len());
        self.save_annotations();
    }

    /// Pull the latest comments from `source`.
    ///
    /// On failure the previous comments are kept and the error is returned
    /// for the host to report.
    pub fn refresh_comments(&mut self, source: &mut dyn CommentSource) -> Result<usize> {
        let records = source.fetch(&self.key.entity_id)?;
        let total = records.len();
        let (comments, thread) = partition_comments(records, self.sections.len());
        self.comments = comments;
        self.thread = thread;
        Ok(total)
    }

    pub fn project(&self, mode: ExportMode<'_>) -> String {
        export::project(
            &self.sections.texts(),
            &self.document,
            &self.flagged(),
            &self.caution(),
            &self.comments,
            mode,
        )
    }

    /// Project the document and hand it to the export transports.
    ///
    /// A full-context export uses the editor's top-level comments when
    /// `context` carries none of its own.
    pub fn export(
        &self,
        context: Option<&ExportContext>,
        primary: &mut dyn ExportSink,
        fallback: &mut dyn ExportSink,
    ) -> ExportOutcome {
        let text = match context {
            None => self.project(ExportMode::Document),
            Some(context) if context.thread.is_empty() && !self.thread.is_empty() => {
                let merged = ExportContext {
                    thread: self.thread.clone(),
                    ..context.clone()
                };
                self.project(ExportMode::FullContext(&merged))
            }
            Some(context) => self.project(ExportMode::FullContext(context)),
        };
        let preview = export::preview_with(&text, self.preview_chars);
        export::deliver(text, preview, primary, fallback)
    }

    pub fn export_document(&self) -> ExportDocument {
        let text = self.project(ExportMode::Document);
        ExportDocument {
            entity_type: self.key.entity_type.clone(),
            entity_id: self.key.entity_id.clone(),
            field_name: self.key.field_name.clone(),
            preview: export::preview_with(&text, self.preview_chars),
            text,
            section_count: self.sections.len(),
            flagged_sections: self.flagged().into_iter().collect(),
            caution_sections: self.caution().into_iter().collect(),
        }
    }

    /// Write the current state again after an earlier failure.
    pub fn retry_save(&mut self) -> bool {
        self.unsaved = false;
        if self.document_dirty {
            self.push_document();
        }
        self.save_annotations();
        !self.unsaved
    }

    fn section_ids(&self) -> Vec<SectionId> {
        self.sections.iter().map(|section| section.id).collect()
    }

    /// `before` holds the section ids in their positions prior to the edit.
    fn after_structural_edit(&mut self, before: &[SectionId]) {
        self.document = self.sections.to_document();
        self.comments = self.follow_comments(before);
        self.push_document();
        self.save_annotations();
    }

    /// Move cached comments to the current positions of their sections.
    /// Comments on sections that no longer exist are dropped.
    fn follow_comments(&mut self, before: &[SectionId]) -> CommentMap {
        std::mem::take(&mut self.comments)
            .into_iter()
            .filter_map(|(index, thread)| {
                let id = before.get(index).copied()?;
                self.sections.position_of(id).map(|position| (position, thread))
            })
            .collect()
    }

    fn push_document(&mut self) {
        match self.sink.document_changed(&self.key, &self.document) {
            Ok(()) => self.document_dirty = false,
            Err(e) => {
                log::warn!("Failed to save document for {}/{}: {e:#}", self.key.entity_type, self.key.entity_id);
                self.document_dirty = true;
                self.unsaved = true;
            }
        }
    }

    fn save_annotations(&mut self) {
        let state = AnnotationState::from_positions(&self.caution(), &self.flagged());
        if let Err(e) = self.store.save(&self.key, &state) {
            log::warn!(
                "Failed to save annotations for {}/{}: {e:#}",
                self.key.entity_type,
                self.key.entity_id
            );
            self.unsaved = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::CommentRecord;
    use crate::model::BOUNDARY_MARKER;
    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct MemoryStore {
        state: Option<AnnotationState>,
        saves: usize,
        fail: bool,
    }

    impl AnnotationStore for MemoryStore {
        fn load(&mut self, _key: &AnnotationKey) -> Result<Option<AnnotationState>> {
            Ok(self.state.clone())
        }

        fn save(&mut self, _key: &AnnotationKey, state: &AnnotationState) -> Result<()> {
            if self.fail {
                return Err(anyhow!("backend unavailable"));
            }
            self.saves += 1;
            self.state = Some(state.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        documents: Vec<String>,
        fail: bool,
    }

    impl DocumentSink for MemorySink {
        fn document_changed(&mut self, _key: &AnnotationKey, text: &str) -> Result<()> {
            if self.fail {
                return Err(anyhow!("write rejected"));
            }
            self.documents.push(text.to_string());
            Ok(())
        }
    }

    struct FixedComments(Vec<CommentRecord>);

    impl CommentSource for FixedComments {
        fn fetch(&mut self, _entity_id: &str) -> Result<Vec<CommentRecord>> {
            Ok(self.0.clone())
        }
    }

    struct NullSink;

    impl ExportSink for NullSink {
        fn deliver(&mut self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn key() -> AnnotationKey {
        AnnotationKey::new("task", "17", "description")
    }

    fn open(document: &str, store: MemoryStore) -> SectionEditor<MemoryStore, MemorySink> {
        SectionEditor::open(key(), document.to_string(), store, MemorySink::default())
    }

    fn record(section_id: Option<i64>, content: &str) -> CommentRecord {
        CommentRecord {
            section_id,
            author_name: "Ana".to_string(),
            content: content.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_open_restores_and_clamps_persisted_state() {
        let store = MemoryStore {
            state: Some(AnnotationState {
                caution_sections: vec![0, 9],
                flagged_sections: vec![-2, 1],
                combined_sections: vec![0, 1],
            }),
            ..Default::default()
        };
        let editor = open("A\n\nB\n\nC", store);

        assert_eq!(editor.section_count(), 3);
        assert_eq!(editor.caution(), BTreeSet::from([0, 2]));
        assert_eq!(editor.flagged(), BTreeSet::from([1]));
        assert!(!editor.is_unsaved());
    }

    #[test]
    fn test_combine_rewrites_document_and_saves() {
        let mut editor = open("A\n\nB\n\nC\n\nD\n\nE", MemoryStore::default());
        editor.toggle_caution(4);
        editor.toggle_selected(1);
        editor.toggle_selected(2);

        editor.combine_selected().unwrap();

        let expected = format!("A\n\nB{BOUNDARY_MARKER}C\n\nD\n\nE");
        assert_eq!(editor.document(), expected);
        assert_eq!(editor.sink().documents, vec![expected.clone()]);
        assert_eq!(editor.caution(), BTreeSet::from([3]));
        assert_eq!(editor.store().state.as_ref().unwrap().caution_sections, vec![3]);
        assert!(editor.selected().is_empty());

        // Reloading the saved text reproduces the merged section.
        let reloaded = SectionList::from_text(&expected);
        assert_eq!(reloaded.len(), 4);
    }

    #[test]
    fn test_combine_to_uses_range_anchor() {
        let mut editor = open("A\n\nB\n\nC\n\nD", MemoryStore::default());
        assert_eq!(editor.combine_to(2), Err(Declined::NoRangeAnchor));

        editor.toggle_selected(1);
        let outcome = editor.combine_to(3).unwrap();

        assert_eq!(outcome, TransformOutcome::Combined { position: 1, absorbed: 2 });
        assert_eq!(editor.section_count(), 2);
    }

    #[test]
    fn test_declined_operations_change_nothing() {
        let mut editor = open("Intro\n\nSingle line", MemoryStore::default());
        editor.toggle_selected(0);

        assert_eq!(editor.combine_selected(), Err(Declined::TooFewSections));
        assert_eq!(editor.separate(1), Err(Declined::CannotSeparate { index: 1 }));
        assert_eq!(editor.document(), "Intro\n\nSingle line");
        assert!(editor.sink().documents.is_empty());
        assert_eq!(editor.selected(), BTreeSet::from([0]));
    }

    #[test]
    fn test_separate_round_trip_through_editor() {
        let original = "A\n\nB\n\nC\n\nD";
        let mut editor = open(original, MemoryStore::default());
        editor.combine_range(1, 2).unwrap();
        editor.separate(1).unwrap();

        assert_eq!(editor.document(), original);
        assert_eq!(editor.sink().documents.len(), 2);
    }

    #[test]
    fn test_store_failure_marks_unsaved_without_reverting() {
        let store = MemoryStore {
            fail: true,
            ..Default::default()
        };
        let mut editor = open("A\n\nB", store);

        editor.toggle_flagged(1);

        assert!(editor.is_unsaved());
        assert_eq!(editor.flagged(), BTreeSet::from([1]));
        assert!(!editor.retry_save());
    }

    #[test]
    fn test_document_failure_is_retried_on_demand() {
        let mut editor = SectionEditor::open(
            key(),
            "A\n\nB".to_string(),
            MemoryStore::default(),
            MemorySink {
                fail: true,
                ..Default::default()
            },
        );

        editor.combine_range(0, 1).unwrap();
        assert!(editor.is_unsaved());
        assert_eq!(editor.section_count(), 1);

        editor.sink.fail = false;
        assert!(editor.retry_save());
        assert!(!editor.is_unsaved());
        assert_eq!(editor.sink().documents, vec![format!("A{BOUNDARY_MARKER}B")]);
    }

    #[test]
    fn test_external_edit_keeps_or_resets_annotations() {
        let mut editor = open("A\n\nB\n\nC", MemoryStore::default());
        editor.toggle_caution(2);

        editor.external_edit("A\n\nB changed\n\nC".to_string());
        assert_eq!(editor.caution(), BTreeSet::from([2]));

        editor.external_edit("A\n\nB".to_string());
        assert!(editor.caution().is_empty());
        assert_eq!(editor.store().state.as_ref().unwrap().caution_sections, Vec::<i64>::new());
    }

    #[test]
    fn test_refresh_comments_feeds_projection() {
        let mut editor = open("A\n\nB\n\nC", MemoryStore::default());
        let mut source = FixedComments(vec![record(Some(2), "X"), record(None, "overall")]);

        assert_eq!(editor.refresh_comments(&mut source).unwrap(), 2);
        editor.toggle_flagged(1);

        assert_eq!(editor.project(ExportMode::Document), "A\n\nX");
        assert_eq!(editor.thread().len(), 1);

        editor.toggle_caution(2);
        assert_eq!(editor.project(ExportMode::Document), "A\n\nC");
    }

    #[test]
    fn test_comments_follow_sections_through_combine() {
        let mut editor = open("A\n\nB\n\nC\n\nD", MemoryStore::default());
        let mut source = FixedComments(vec![record(Some(1), "on B"), record(Some(2), "X")]);
        editor.refresh_comments(&mut source).unwrap();
        assert_eq!(editor.project(ExportMode::Document), "A\n\non B\n\nX\n\nD");

        editor.combine_range(0, 1).unwrap();

        // B was absorbed, so its comment goes; C moved from 2 to 1 and keeps its own.
        assert_eq!(editor.comments().keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(
            editor.project(ExportMode::Document),
            format!("A{BOUNDARY_MARKER}B\n\nX\n\nD")
        );
    }

    #[test]
    fn test_comments_follow_sections_through_separate() {
        let mut editor = open("A\n\nB\n\nC", MemoryStore::default());
        editor.combine_range(0, 1).unwrap();
        let mut source = FixedComments(vec![record(Some(0), "merged"), record(Some(1), "on C")]);
        editor.refresh_comments(&mut source).unwrap();

        editor.separate(0).unwrap();

        assert_eq!(editor.comments().keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(editor.project(ExportMode::Document), "merged\n\nB\n\non C");
    }

    #[test]
    fn test_export_full_context_uses_fetched_thread() {
        let mut editor = open("A\n\nB", MemoryStore::default());
        editor
            .refresh_comments(&mut FixedComments(vec![record(None, "Looks good")]))
            .unwrap();

        let outcome = editor.export(Some(&ExportContext::default()), &mut NullSink, &mut NullSink);

        assert!(outcome.text.ends_with("[2024-04-10 12:00] Ana: Looks good"));
        assert_eq!(outcome.delivery, export::Delivery::Primary);
    }

    #[test]
    fn test_export_document_lists_annotations() {
        let mut editor = open("A\n\nB\n\nC", MemoryStore::default());
        editor.toggle_flagged(0);
        editor.toggle_caution(2);

        let export = editor.export_document();

        assert_eq!(export.text, "B\n\nC");
        assert_eq!(export.flagged_sections, vec![0]);
        assert_eq!(export.caution_sections, vec![2]);
        assert_eq!(export.section_count, 3);
    }
}
