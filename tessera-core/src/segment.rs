//! Splitting a free-text description into sections.
//!
//! A section boundary is either a run of two or more line breaks, LF or CRLF
//! (the run itself is discarded), or the start of a line carrying a structural
//! marker: a heading (`#` or `##`), a bullet (`-` or `*`) or a numbered item (`12.`),
//! each followed by whitespace. Markers stay at the head of the section they
//! introduce.

use std::sync::OnceLock;

use regex::Regex;

/// Separator placed between sections when a document is rebuilt from them.
pub const SECTION_SEPARATOR: &str = "\n\n";

fn blank_run() -> &'static Regex {
    static BLANK_RUN: OnceLock<Regex> = OnceLock::new();
    BLANK_RUN.get_or_init(|| Regex::new(r"(?:\r?\n){2,}").expect("Invalid blank run regex"))
}

fn line_marker() -> &'static Regex {
    static LINE_MARKER: OnceLock<Regex> = OnceLock::new();
    LINE_MARKER.get_or_init(|| {
        Regex::new(r"(?m)^(?:#{1,2}\s|[-*]\s|\d+\.\s)").expect("Invalid line marker regex")
    })
}

/// Split `text` into trimmed, non-empty sections.
pub fn segment(text: &str) -> Vec<String> {
    let mut sections = Vec::new();

    for chunk in blank_run().split(text) {
        let mut start = 0;
        for found in line_marker().find_iter(chunk) {
            if found.start() > start {
                push_fragment(&mut sections, &chunk[start..found.start()]);
                start = found.start();
            }
        }
        push_fragment(&mut sections, &chunk[start..]);
    }

    sections
}

fn push_fragment(sections: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        sections.push(trimmed.to_string());
    }
}

/// Rebuild document text from an ordered list of section texts.
pub fn join_sections<S: AsRef<str>>(sections: &[S]) -> String {
    sections
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("", &[])]
    #[case("   \n\n\n  ", &[])]
    #[case("Pour the footing", &["Pour the footing"])]
    #[case("First\n\nSecond", &["First", "Second"])]
    #[case("First\n\n\n\nSecond", &["First", "Second"])]
    #[case("Line one\nline two", &["Line one\nline two"])]
    #[case("Intro\n- rebar\n- formwork", &["Intro", "- rebar", "- formwork"])]
    #[case("Intro\n* rebar", &["Intro", "* rebar"])]
    #[case("# Scope\nExcavate\n## Notes\nCheck soil", &["# Scope\nExcavate", "## Notes\nCheck soil"])]
    #[case("Pour footing\r\n\r\nCure slab", &["Pour footing", "Cure slab"])]
    #[case("Intro\r\n- rebar\r\n- formwork", &["Intro", "- rebar", "- formwork"])]
    #[case("Steps\n1. Survey\n2. Excavate\n10. Backfill", &["Steps", "1. Survey", "2. Excavate", "10. Backfill"])]
    fn test_segment_boundaries(#[case] text: &str, #[case] expected: &[&str]) {
        assert_eq!(segment(text), expected);
    }

    #[rstest]
    #[case("### Deep heading\nbody")]
    #[case("-not a bullet\n*emphasis*")]
    #[case("Total 1.5 tonnes\nv2.0")]
    #[case("Ratio 3.x\n#hashtag")]
    fn test_non_markers_do_not_split(#[case] text: &str) {
        assert_eq!(segment(text), vec![text.to_string()]);
    }

    #[test]
    fn test_marker_inside_line_does_not_split() {
        let text = "Use - as separator and 1. as label";
        assert_eq!(segment(text), vec![text.to_string()]);
    }

    #[test]
    fn test_segment_is_idempotent_over_unchanged_text() {
        let text = "# Pour\n\nIntro\n- a\n- b\n\n\n3. c\nmore";
        assert_eq!(segment(text), segment(text));
    }

    #[test]
    fn test_join_then_segment_reproduces_sections() {
        let sections = segment("Intro\n- a\n- b\n\nClosing");
        let joined = join_sections(&sections);
        assert_eq!(joined, "Intro\n\n- a\n\n- b\n\nClosing");
        assert_eq!(segment(&joined), sections);
    }
}
