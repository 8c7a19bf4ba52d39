//! Tessera Core - sectioned document engine
//!
//! Splits a free-text task description into sections, keeps caution, flag and
//! selection annotations on them, merges and separates sections reversibly,
//! and projects the annotated document back into one exportable text. All
//! persistence and transport is reached through the traits in [`boundary`].

pub mod annotations;
pub mod boundary;
pub mod editor;
pub mod error;
pub mod export;
pub mod model;
pub mod segment;
pub mod transform;

pub use annotations::{validate, AnnotationSets};
pub use boundary::{
    partition_comments, AnnotationKey, AnnotationState, AnnotationStore, CommentRecord, CommentSource,
    DocumentSink, ExportSink,
};
pub use editor::SectionEditor;
pub use error::Declined;
pub use export::{
    deliver, preview, project, to_json, Delivery, ExportContext, ExportDocument, ExportMode, ExportOutcome,
    ProjectInfo, TaskInfo,
};
pub use model::{Comment, CommentMap, Section, SectionId, SectionKind, SectionList, BOUNDARY_MARKER};
pub use segment::{join_sections, segment};
pub use transform::TransformOutcome;
