//! Slide layout classification.
//!
//! Section titles are matched against keyword groups in a fixed
//! priority order; the first group that matches decides the layout.

use crate::model::{Document, Section, SlideLayoutHint};
use regex::Regex;
use std::sync::OnceLock;

struct Rule {
    hint: SlideLayoutHint,
    pattern: &'static str,
}

/// Keyword groups in priority order.
const RULES: &[Rule] = &[
    Rule {
        hint: SlideLayoutHint::ThankYou,
        pattern: r"\b(thank you|thanks|questions|contact|get in touch)\b",
    },
    Rule {
        hint: SlideLayoutHint::BulletPoints,
        pattern: r"\bnext steps\b",
    },
    Rule {
        hint: SlideLayoutHint::Table,
        pattern: r"\b(timeline|milestones?|schedule|roadmap)\b",
    },
    Rule {
        hint: SlideLayoutHint::TwoColumn,
        pattern: r"\b(comparison|compare|versus|vs|why partner|partner with|why choose|advantages)\b",
    },
    Rule {
        hint: SlideLayoutHint::Visual,
        pattern: r"\b(overview|architecture|diagram)\b",
    },
    Rule {
        hint: SlideLayoutHint::DataVisualization,
        pattern: r"\b(investment|roi|cost|costs|pricing|metrics)\b",
    },
];

fn rule_regexes() -> &'static [(SlideLayoutHint, Regex)] {
    static RES: OnceLock<Vec<(SlideLayoutHint, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        RULES
            .iter()
            .map(|r| {
                (
                    r.hint,
                    Regex::new(r.pattern).expect("slide keyword regex is valid"),
                )
            })
            .collect()
    })
}

fn slide_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*slide\s+\d+\s*[:.\-]\s*").expect("slide prefix regex is valid"))
}

/// Classify a section title into a slide layout.
///
/// `ordinal` is the zero-based position of the section among the
/// slide-level sections. Only the first section can be a title slide,
/// and only when its title names one.
pub fn classify(section_title: &str, ordinal: usize) -> SlideLayoutHint {
    let title = section_title.to_lowercase();

    if ordinal == 0 && is_title_slide(&title) {
        return SlideLayoutHint::Title;
    }

    rule_regexes()
        .iter()
        .find(|(_, re)| re.is_match(&title))
        .map(|(hint, _)| *hint)
        .unwrap_or(SlideLayoutHint::SingleColumn)
}

fn is_title_slide(lower_title: &str) -> bool {
    let stripped = strip_slide_prefix(lower_title);
    stripped.trim() == "title slide" || stripped.trim() == "title"
}

/// Remove a leading `Slide N:` prefix.
pub fn strip_slide_prefix(title: &str) -> &str {
    match slide_prefix().find(title) {
        Some(m) => &title[m.end()..],
        None => title,
    }
}

/// Assign a layout hint to every top-level section and drop a literal
/// title-slide section.
///
/// `Slide N:` prefixes are removed from titles. Sections that contain a
/// table are forced to [`SlideLayoutHint::Table`].
pub fn assign_hints(doc: &mut Document) {
    let sections = std::mem::take(&mut doc.sections);
    let mut kept = Vec::with_capacity(sections.len());

    for (ordinal, mut section) in sections.into_iter().enumerate() {
        let mut hint = classify(&section.title, ordinal);
        if hint == SlideLayoutHint::Title {
            log::debug!("Dropping title-slide section '{}'", section.title);
            continue;
        }
        if hint != SlideLayoutHint::Table && section_has_table(&section) {
            log::debug!(
                "Section '{}' holds a table, overriding {} layout",
                section.title,
                hint
            );
            hint = SlideLayoutHint::Table;
        }

        section.title = strip_slide_prefix(&section.title).trim().to_string();
        section.slide_hint = Some(hint);
        kept.push(section);
    }

    doc.sections = kept;
}

fn section_has_table(section: &Section) -> bool {
    section.has_table() || section.children.iter().any(section_has_table)
}
