use tessera_core::{Declined, Delivery, ExportContext, SectionEditor, TransformOutcome};

use crate::io::{FileAnnotationStore, FileCommentSource, FileDocumentSink, FileExportSink, StashSink};

/// Application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Help,
}

pub type Editor = SectionEditor<FileAnnotationStore, FileDocumentSink>;

/// Terminal application state wrapped around one editor session
pub struct App {
    pub editor: Editor,
    pub title: String,
    pub cursor: usize,
    pub mode: Mode,
    pub running: bool,
    pub status_message: Option<String>,
    pub context: ExportContext,
    pub comments: FileCommentSource,
    pub export_sink: FileExportSink,
    pub stash: StashSink,
}

impl App {
    pub fn new(
        editor: Editor,
        title: String,
        context: ExportContext,
        comments: FileCommentSource,
        export_sink: FileExportSink,
    ) -> Self {
        Self {
            editor,
            title,
            cursor: 0,
            mode: Mode::Normal,
            running: true,
            status_message: None,
            context,
            comments,
            export_sink,
            stash: StashSink::default(),
        }
    }

    pub fn move_down(&mut self) {
        let count = self.editor.section_count();
        if count > 0 {
            self.cursor = (self.cursor + 1).min(count - 1);
        }
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_to_top(&mut self) {
        self.cursor = 0;
    }

    pub fn move_to_bottom(&mut self) {
        self.cursor = self.editor.section_count().saturating_sub(1);
    }

    fn clamp_cursor(&mut self) {
        let last = self.editor.section_count().saturating_sub(1);
        self.cursor = self.cursor.min(last);
    }

    pub fn toggle_selected(&mut self) {
        self.editor.toggle_selected(self.cursor);
    }

    pub fn toggle_caution(&mut self) {
        if self.editor.toggle_caution(self.cursor) {
            self.report_save("Caution toggled");
        }
    }

    pub fn toggle_flagged(&mut self) {
        if self.editor.toggle_flagged(self.cursor) {
            self.report_save("Flag toggled");
        }
    }

    pub fn clear_selection(&mut self) {
        self.editor.clear_selection();
        self.set_status("Selection cleared");
    }

    pub fn combine_selected(&mut self) {
        let result = self.editor.combine_selected();
        self.apply_structural(result);
    }

    pub fn combine_to_cursor(&mut self) {
        let result = self.editor.combine_to(self.cursor);
        self.apply_structural(result);
    }

    pub fn separate(&mut self) {
        let result = self.editor.separate(self.cursor);
        self.apply_structural(result);
    }

    fn apply_structural(&mut self, result: Result<TransformOutcome, Declined>) {
        match result {
            Ok(TransformOutcome::Combined { position, absorbed }) => {
                self.cursor = position;
                self.report_save(&format!("Combined {} sections", absorbed + 1));
            }
            Ok(TransformOutcome::Separated { position, fragments }) => {
                self.cursor = position;
                self.report_save(&format!("Separated into {fragments} sections"));
            }
            Err(declined) => self.set_status(&declined.to_string()),
        }
        self.clamp_cursor();
    }

    pub fn refresh_comments(&mut self) {
        match self.editor.refresh_comments(&mut self.comments) {
            Ok(count) => self.set_status(&format!("Loaded {count} comments")),
            Err(e) => {
                log::warn!("Comment refresh failed: {e:#}");
                self.set_status(&format!("Comment refresh failed: {e}"));
            }
        }
    }

    pub fn export(&mut self, full_context: bool) {
        let context = full_context.then_some(&self.context);
        let outcome = self
            .editor
            .export(context, &mut self.export_sink, &mut self.stash);

        let message = match outcome.delivery {
            Delivery::Primary => format!("Exported to {}: {}", self.export_sink.path.display(), outcome.preview),
            Delivery::Fallback => format!("Export kept for stdout: {}", outcome.preview),
            Delivery::Inline => {
                self.stash.stashed = Some(outcome.text);
                format!("Export transports failed: {}", outcome.preview)
            }
        };
        self.set_status(&message);
    }

    pub fn retry_save(&mut self) {
        if self.editor.retry_save() {
            self.set_status("Changes saved");
        } else {
            self.set_status("Changes not saved");
        }
    }

    fn report_save(&mut self, done: &str) {
        if self.editor.is_unsaved() {
            self.set_status(&format!("{done} (changes not saved, press w to retry)"));
        } else {
            self.set_status(done);
        }
    }

    /// Set status message
    pub fn set_status(&mut self, msg: &str) {
        self.status_message = Some(msg.to_string());
    }

    /// Clear status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tessera_core::AnnotationKey;

    fn app_for(dir: &TempDir, text: &str) -> App {
        let file = dir.path().join("task.md");
        fs::write(&file, text).unwrap();
        let data_dir = dir.path().join("data");

        let editor = SectionEditor::open(
            AnnotationKey::new("task", "7", "description"),
            text.to_string(),
            FileAnnotationStore::new(&data_dir),
            FileDocumentSink::new(file),
        );
        App::new(
            editor,
            "task".to_string(),
            ExportContext::default(),
            FileCommentSource::new(&data_dir),
            FileExportSink::new(&data_dir),
        )
    }

    #[test]
    fn test_range_combine_writes_file_and_moves_cursor() {
        let dir = TempDir::new().unwrap();
        let mut app = app_for(&dir, "A\n\nB\n\nC");

        app.toggle_selected();
        app.move_to_bottom();
        app.combine_to_cursor();

        assert_eq!(app.cursor, 0);
        assert_eq!(app.editor.section_count(), 1);
        let saved = fs::read_to_string(dir.path().join("task.md")).unwrap();
        assert_eq!(saved, app.editor.document());
        assert_eq!(app.status_message.as_deref(), Some("Combined 3 sections"));
    }

    #[test]
    fn test_declined_separate_reports_reason() {
        let dir = TempDir::new().unwrap();
        let mut app = app_for(&dir, "Only one");

        app.separate();

        assert_eq!(
            app.status_message.as_deref(),
            Some("Section 1 cannot be separated any further")
        );
    }

    #[test]
    fn test_export_writes_primary_file() {
        let dir = TempDir::new().unwrap();
        let mut app = app_for(&dir, "A\n\nB");
        app.move_down();
        app.toggle_flagged();

        app.export(false);

        let exported = fs::read_to_string(&app.export_sink.path).unwrap();
        assert_eq!(exported, "A");
        assert!(app.stash.stashed.is_none());
    }

    #[test]
    fn test_export_falls_back_to_stash() {
        let dir = TempDir::new().unwrap();
        let mut app = app_for(&dir, "A\n\nB");
        // A directory in place of the export file makes the primary write fail
        fs::create_dir_all(&app.export_sink.path).unwrap();

        app.export(false);

        assert_eq!(app.stash.stashed.as_deref(), Some("A\n\nB"));
    }
}
