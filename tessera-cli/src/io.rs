//! File-backed collaborators for the terminal host

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use tessera_core::{
    AnnotationKey, AnnotationState, AnnotationStore, CommentRecord, CommentSource, DocumentSink, ExportContext,
    ExportSink,
};

/// A description file loaded from disk
pub struct LoadedFile {
    pub path: PathBuf,
    pub stem: String,
    pub content: String,
}

/// Load a text file to section
pub fn load_file(path: &str) -> Result<LoadedFile> {
    let path = Path::new(path);
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", path.display()))?;

    let content = fs::read_to_string(&canonical)
        .with_context(|| format!("Failed to read file: {}", canonical.display()))?;

    let stem = canonical
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string());

    Ok(LoadedFile {
        path: canonical,
        stem,
        content,
    })
}

/// Create the data directory if needed
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Keep ids usable as single path components
fn file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Annotation state as JSON files under `<data_dir>/annotations`
pub struct FileAnnotationStore {
    dir: PathBuf,
}

impl FileAnnotationStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("annotations"),
        }
    }

    pub fn path_for(&self, key: &AnnotationKey) -> PathBuf {
        self.dir.join(format!(
            "{}-{}-{}.json",
            file_component(&key.entity_type),
            file_component(&key.entity_id),
            file_component(&key.field_name)
        ))
    }
}

impl AnnotationStore for FileAnnotationStore {
    fn load(&mut self, key: &AnnotationKey) -> Result<Option<AnnotationState>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let state = serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(state))
    }

    fn save(&mut self, key: &AnnotationKey, state: &AnnotationState) -> Result<()> {
        ensure_dir(&self.dir)?;
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(state).context("Failed to serialize annotations")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Comments read from `<data_dir>/comments/<entity_id>.json`
pub struct FileCommentSource {
    dir: PathBuf,
}

impl FileCommentSource {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join("comments"),
        }
    }
}

impl CommentSource for FileCommentSource {
    fn fetch(&mut self, entity_id: &str) -> Result<Vec<CommentRecord>> {
        let path = self.dir.join(format!("{}.json", file_component(entity_id)));
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Writes the document back to the file it was loaded from
pub struct FileDocumentSink {
    path: PathBuf,
}

impl FileDocumentSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DocumentSink for FileDocumentSink {
    fn document_changed(&mut self, _key: &AnnotationKey, text: &str) -> Result<()> {
        fs::write(&self.path, text).with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Primary export transport: `<data_dir>/export.txt`
pub struct FileExportSink {
    pub path: PathBuf,
}

impl FileExportSink {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("export.txt"),
        }
    }
}

impl ExportSink for FileExportSink {
    fn deliver(&mut self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        fs::write(&self.path, text).with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Fallback export transport: held in memory and printed after the terminal is restored
#[derive(Default)]
pub struct StashSink {
    pub stashed: Option<String>,
}

impl ExportSink for StashSink {
    fn deliver(&mut self, text: &str) -> Result<()> {
        self.stashed = Some(text.to_string());
        Ok(())
    }
}

/// Project and task metadata from `<data_dir>/context/<entity_id>.json`
pub fn load_context(data_dir: &Path, entity_id: &str) -> Result<ExportContext> {
    let path = data_dir
        .join("context")
        .join(format!("{}.json", file_component(entity_id)));
    if !path.exists() {
        return Ok(ExportContext::default());
    }
    let json = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}
