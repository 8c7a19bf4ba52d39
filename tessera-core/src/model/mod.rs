pub mod comment;
pub mod section;

pub use comment::{has_section_comments, Comment, CommentMap};
pub use section::{Section, SectionId, SectionKind, SectionList, BOUNDARY_MARKER};
