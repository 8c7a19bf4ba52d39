use thiserror::Error;

/// A structural edit the engine refused to perform.
///
/// Declined operations leave the document, the sections and every annotation
/// set exactly as they were. The `Display` text is meant to be shown to the
/// user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Declined {
    #[error("Select at least two sections to combine")]
    TooFewSections,

    #[error("No range anchor: select the first section of the range")]
    NoRangeAnchor,

    #[error("Cannot combine from section {} to section {}: the end must come after the start", .anchor + 1, .end + 1)]
    InvalidRange { anchor: usize, end: usize },

    #[error("Section {} does not exist (document has {count} sections)", .index + 1)]
    OutOfRange { index: usize, count: usize },

    #[error("Section {} cannot be separated any further", .index + 1)]
    CannotSeparate { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_use_one_based_positions() {
        let err = Declined::CannotSeparate { index: 0 };
        assert_eq!(err.to_string(), "Section 1 cannot be separated any further");

        let err = Declined::InvalidRange { anchor: 3, end: 1 };
        assert_eq!(
            err.to_string(),
            "Cannot combine from section 4 to section 2: the end must come after the start"
        );
    }
}
