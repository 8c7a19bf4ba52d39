//! Types and collaborator traits at the edge of the engine.
//!
//! Storage, comment fetching, document persistence and export transport are
//! owned by the host. The engine only sees these traits and the payloads
//! below, which are normalized on the way in.

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{Comment, CommentMap};

/// Addresses the annotation state of one text field of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationKey {
    pub entity_type: String,
    pub entity_id: String,
    pub field_name: String,
}

impl AnnotationKey {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            field_name: field_name.into(),
        }
    }
}

/// Persisted caution/flag positions.
///
/// Written as decimal strings. Read leniently: strings and numbers are both
/// accepted, anything else is dropped. `combinedSections` from older
/// payloads is read and discarded; it is never written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationState {
    #[serde(default, deserialize_with = "lenient_indices", serialize_with = "indices_as_strings")]
    pub caution_sections: Vec<i64>,
    #[serde(default, deserialize_with = "lenient_indices", serialize_with = "indices_as_strings")]
    pub flagged_sections: Vec<i64>,
    #[serde(default, deserialize_with = "lenient_indices", skip_serializing)]
    pub combined_sections: Vec<i64>,
}

impl AnnotationState {
    pub fn from_positions(caution: &BTreeSet<usize>, flagged: &BTreeSet<usize>) -> Self {
        let to_i64 = |set: &BTreeSet<usize>| -> Vec<i64> { set.iter().filter_map(|&i| i64::try_from(i).ok()).collect() };
        Self {
            caution_sections: to_i64(caution),
            flagged_sections: to_i64(flagged),
            combined_sections: Vec::new(),
        }
    }
}

fn lenient_indices<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.iter().filter_map(normalize_index).collect())
}

fn normalize_index(value: &serde_json::Value) -> Option<i64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        log::warn!("Dropping unreadable section index {value}");
    }
    parsed
}

fn indices_as_strings<S>(indices: &[i64], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(indices.iter().map(|i| i.to_string()))
}

/// A comment as delivered by the comment service.
///
/// `section_id` is the section position the comment was left on, or `None`
/// for a comment on the entity as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    #[serde(default)]
    pub section_id: Option<i64>,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentRecord> for Comment {
    fn from(record: CommentRecord) -> Self {
        Comment {
            author_name: record.author_name,
            content: record.content,
            created_at: record.created_at,
        }
    }
}

/// Split fetched records into per-section comments and top-level comments.
///
/// Section comments pointing outside `[0, section_count)` are dropped; an
/// out-of-date comment must never replace the text of an unrelated section.
pub fn partition_comments(records: Vec<CommentRecord>, section_count: usize) -> (CommentMap, Vec<Comment>) {
    let mut by_section = CommentMap::new();
    let mut top_level = Vec::new();

    for record in records {
        match record.section_id {
            None => top_level.push(Comment::from(record)),
            Some(id) => match usize::try_from(id) {
                Ok(index) if index < section_count => {
                    by_section.entry(index).or_insert_with(Vec::new).push(Comment::from(record));
                }
                _ => log::debug!("Dropping comment on missing section {id}"),
            },
        }
    }

    (by_section, top_level)
}

/// Loads and saves caution/flag state.
pub trait AnnotationStore {
    fn load(&mut self, key: &AnnotationKey) -> Result<Option<AnnotationState>>;
    fn save(&mut self, key: &AnnotationKey, state: &AnnotationState) -> Result<()>;
}

/// Fetches the comments left on an entity.
pub trait CommentSource {
    fn fetch(&mut self, entity_id: &str) -> Result<Vec<CommentRecord>>;
}

/// Receives the new document text after every accepted structural edit.
pub trait DocumentSink {
    fn document_changed(&mut self, key: &AnnotationKey, text: &str) -> Result<()>;
}

/// Clipboard-like transport for exported text.
pub trait ExportSink {
    fn deliver(&mut self, text: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_serializes_indices_as_strings() {
        let state = AnnotationState::from_positions(&BTreeSet::from([1, 10]), &BTreeSet::from([4]));
        let json = serde_json::to_string(&state).unwrap();

        assert_eq!(json, r#"{"cautionSections":["1","10"],"flaggedSections":["4"]}"#);
    }

    #[test]
    fn test_state_reads_mixed_payloads() {
        let json = r#"{
            "cautionSections": ["2", 3, " 7 ", "x", null, 4.0],
            "flaggedSections": null,
            "combinedSections": ["1", "2"]
        }"#;
        let state: AnnotationState = serde_json::from_str(json).unwrap();

        assert_eq!(state.caution_sections, vec![2, 3, 7, 4]);
        assert!(state.flagged_sections.is_empty());
        assert_eq!(state.combined_sections, vec![1, 2]);

        let written = serde_json::to_string(&state).unwrap();
        assert!(!written.contains("combinedSections"));
    }

    #[test]
    fn test_state_missing_fields_default_to_empty() {
        let state: AnnotationState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, AnnotationState::default());
    }

    #[test]
    fn test_partition_comments() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let record = |section_id, content: &str| CommentRecord {
            section_id,
            author_name: "Site lead".to_string(),
            content: content.to_string(),
            created_at: at,
        };
        let records = vec![
            record(Some(1), "first"),
            record(None, "general"),
            record(Some(1), "second"),
            record(Some(5), "stale"),
            record(Some(-1), "broken"),
        ];

        let (sections, top_level) = partition_comments(records, 3);

        assert_eq!(sections.len(), 1);
        let bodies: Vec<_> = sections[&1].iter().map(|c| c.content.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
        assert_eq!(top_level.len(), 1);
        assert_eq!(top_level[0].content, "general");
    }

    #[test]
    fn test_comment_record_reads_camel_case() {
        let json = r#"{"sectionId":null,"authorName":"Ana","content":"ok","createdAt":"2024-03-01T09:30:00Z"}"#;
        let record: CommentRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.section_id, None);
        assert_eq!(record.author_name, "Ana");
    }
}
