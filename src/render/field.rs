//! Word-processing field construction.
//!
//! A complex field is a run sequence
//! `begin` / instruction / `separate` / cached result / `end`. The cached
//! result is what readers show until fields are updated; the field is
//! flagged dirty so the host application refreshes it on open.

use crate::model::CaptionLabel;
use crate::template::xml::escape;
use std::ops::RangeInclusive;

/// A field ready to be placed into a paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    instruction: String,
    cached: String,
}

impl Field {
    /// Field instruction text (e.g. `SEQ Table \* ARABIC`).
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Value shown before the field is updated.
    pub fn cached(&self) -> &str {
        &self.cached
    }

    /// Render the field as runs. `run_props` is an optional `<w:rPr>` body
    /// applied to every run.
    pub fn to_runs(&self, run_props: Option<&str>) -> String {
        let rpr = run_props
            .map(|p| format!("<w:rPr>{}</w:rPr>", p))
            .unwrap_or_default();
        format!(
            concat!(
                r#"<w:r>{rpr}<w:fldChar w:fldCharType="begin" w:dirty="true"/></w:r>"#,
                r#"<w:r>{rpr}<w:instrText xml:space="preserve"> {instr} </w:instrText></w:r>"#,
                r#"<w:r>{rpr}<w:fldChar w:fldCharType="separate"/></w:r>"#,
                r#"<w:r>{rpr}<w:t xml:space="preserve">{cached}</w:t></w:r>"#,
                r#"<w:r>{rpr}<w:fldChar w:fldCharType="end"/></w:r>"#,
            ),
            rpr = rpr,
            instr = escape(&self.instruction),
            cached = escape(&self.cached),
        )
    }
}

/// Builds the fields the word-processing renderer emits.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldBuilder;

impl FieldBuilder {
    /// Auto-numbering field for a caption label, with `value` cached.
    pub fn sequence_field(label: CaptionLabel, value: u32) -> Field {
        Field {
            instruction: format!("SEQ {} \\* ARABIC", label.as_str()),
            cached: value.to_string(),
        }
    }

    /// Table of contents over heading levels `levels`, with hyperlinked
    /// entries.
    pub fn toc_field(levels: RangeInclusive<u8>, placeholder: &str) -> Field {
        Field {
            instruction: format!("TOC \\o \"{}-{}\" \\h \\z \\u", levels.start(), levels.end()),
            cached: placeholder.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_field() {
        let field = FieldBuilder::sequence_field(CaptionLabel::Figure, 3);
        assert_eq!(field.instruction(), "SEQ Figure \\* ARABIC");
        assert_eq!(field.cached(), "3");

        let runs = field.to_runs(None);
        assert_eq!(runs.matches("<w:fldChar").count(), 3);
        assert!(runs.contains(r#"w:fldCharType="begin" w:dirty="true""#));
        assert!(runs.contains("> SEQ Figure \\* ARABIC <"));
        assert!(runs.contains(r#"<w:t xml:space="preserve">3</w:t>"#));
    }

    #[test]
    fn test_labels_are_independent() {
        let table = FieldBuilder::sequence_field(CaptionLabel::Table, 1);
        let figure = FieldBuilder::sequence_field(CaptionLabel::Figure, 1);
        assert_ne!(table, figure);
        assert_eq!(table.cached(), figure.cached());
    }

    #[test]
    fn test_toc_field_escaped() {
        let field = FieldBuilder::toc_field(1..=3, "Update <fields>");
        let runs = field.to_runs(Some("<w:b/>"));
        assert!(runs.contains("TOC \\o &quot;1-3&quot; \\h \\z \\u"));
        assert!(runs.contains("Update &lt;fields&gt;"));
        assert_eq!(runs.matches("<w:rPr><w:b/></w:rPr>").count(), 5);
    }
}
