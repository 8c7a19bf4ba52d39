use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment left on a document, either on one section or on the whole entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author_name: impl Into<String>, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            author_name: author_name.into(),
            content: content.into(),
            created_at,
        }
    }
}

/// Section position to the comments attached to it, in arrival order.
pub type CommentMap = BTreeMap<usize, Vec<Comment>>;

/// True when at least one section in `0..section_count` has a comment.
pub fn has_section_comments(comments: &CommentMap, section_count: usize) -> bool {
    comments
        .range(..section_count)
        .any(|(_, thread)| !thread.is_empty())
}
