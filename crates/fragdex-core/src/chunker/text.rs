//! Searchable-text assembly and boundary detection.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{ParentRecord, RecordField};

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("static regex"));
static METRIC_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*•]\s+|\d+[.)]\s+|(?:metric|kpi|measure|benchmark)s?\s*[:\-])").expect("static regex")
});

pub(crate) const SECTION_SEP: &str = "\n\n";

/// One present field rendered as `"<Title>: <value>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub field: RecordField,
    pub text: String,
}

/// Present recognized fields in fixed order. Absent or blank fields are skipped.
pub fn sections(record: &ParentRecord) -> Vec<Section> {
    RecordField::ORDERED
        .into_iter()
        .filter_map(|field| record.field(field).map(|v| Section { field, text: format!("{}: {}", field.title(), v) }))
        .collect()
}

/// The record's full searchable text; `None` when no field contributes text.
pub fn assemble_text(record: &ParentRecord) -> Option<String> {
    let parts = sections(record);
    if parts.is_empty() { return None; }
    Some(parts.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(SECTION_SEP))
}

pub(crate) fn char_len(s: &str) -> usize { s.chars().count() }

/// Blank-line separated paragraphs, trimmed, empties dropped.
pub(crate) fn paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_BREAK.split(text).map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Sentences ending in `.`, `!` or `?` followed by whitespace or end of text.
/// Line breaks also end a sentence. A run with no terminator is one sentence.
pub(crate) fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for line in text.lines() {
        let mut start = 0;
        let mut iter = line.char_indices().peekable();
        while let Some((i, c)) = iter.next() {
            if !matches!(c, '.' | '!' | '?') { continue; }
            let end = i + c.len_utf8();
            match iter.peek() {
                Some(&(_, next)) if next.is_whitespace() => {
                    push_trimmed(&mut out, &line[start..end]);
                    start = end;
                }
                None => {
                    push_trimmed(&mut out, &line[start..end]);
                    start = end;
                }
                Some(_) => {}
            }
        }
        push_trimmed(&mut out, &line[start..]);
    }
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() { out.push(s); }
}

/// Metric/KPI groups: each section starts a group, and so does every line
/// that opens with a bullet, an enumeration or a metric keyword.
pub(crate) fn metric_groups(sections: &[Section]) -> Vec<String> {
    let mut groups = Vec::new();
    for section in sections {
        let mut current = String::new();
        for line in section.text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if METRIC_MARKER.is_match(line) && !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            if !current.is_empty() { current.push('\n'); }
            current.push_str(line);
        }
        if !current.is_empty() { groups.push(current); }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_fields_in_fixed_order_with_labels() {
        let record = ParentRecord::new("r1", "faq")
            .with_field(RecordField::Answer, "Yes.")
            .with_field(RecordField::Industry, "Retail")
            .with_field(RecordField::Question, "Do you support SSO?")
            .with_field(RecordField::Description, "   ");
        let text = assemble_text(&record).unwrap();
        assert_eq!(text, "Question: Do you support SSO?\n\nAnswer: Yes.\n\nIndustry: Retail");
    }

    #[test]
    fn empty_record_assembles_to_none() {
        let record = ParentRecord::new("r2", "faq").with_field(RecordField::Label, " \n ");
        assert!(assemble_text(&record).is_none());
    }

    #[test]
    fn sentence_split_respects_decimals_and_line_breaks() {
        let got = sentences("Revenue grew 4.5x. Churn fell!\nNext line without stop");
        assert_eq!(got, vec!["Revenue grew 4.5x.", "Churn fell!", "Next line without stop"]);
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        assert_eq!(paragraphs("a\n\nb\n  \nc"), vec!["a", "b", "c"]);
        assert_eq!(paragraphs("single"), vec!["single"]);
    }

    #[test]
    fn metric_markers_open_new_groups() {
        let section = Section { field: RecordField::Description, text: "Description: Results\n- Pipeline +30%\ncontinued note\nKPI: win rate 2x".into() };
        let groups = metric_groups(&[section]);
        assert_eq!(groups, vec!["Description: Results", "- Pipeline +30%\ncontinued note", "KPI: win rate 2x"]);
    }
}
