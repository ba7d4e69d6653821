//! Inline span resolution (bold, italic, code, links).

use crate::model::{plain_text, TextRun};
use regex::Regex;
use std::sync::OnceLock;

fn span_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
              \*\*\*(?P<bi>.+?)\*\*\*
            | \*\*(?P<b>.+?)\*\*
            | __(?P<b2>.+?)__
            | \*(?P<i>[^*\s](?:[^*]*?[^*\s])?)\*
            | \b_(?P<i2>[^_]+?)_\b
            | `(?P<code>[^`]+)`
            | \[(?P<link>[^\]]+)\]\([^)\s]+\)
            ",
        )
        .expect("inline span regex is valid")
    })
}

/// Resolve inline markers into styled runs.
///
/// Unbalanced markers are kept as literal text.
pub fn parse_inline(text: &str) -> Vec<TextRun> {
    let mut runs = Vec::new();
    push_spans(text, false, false, &mut runs);
    merge_adjacent(runs)
}

/// Text with all inline markers removed.
pub fn strip_markers(text: &str) -> String {
    plain_text(&parse_inline(text))
}

fn push_spans(text: &str, bold: bool, italic: bool, out: &mut Vec<TextRun>) {
    let mut last = 0;
    for caps in span_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push_plain(&text[last..whole.start()], bold, italic, out);

        if let Some(inner) = caps.name("bi") {
            push_spans(inner.as_str(), true, true, out);
        } else if let Some(inner) = caps.name("b").or_else(|| caps.name("b2")) {
            push_spans(inner.as_str(), true, italic, out);
        } else if let Some(inner) = caps.name("i").or_else(|| caps.name("i2")) {
            push_spans(inner.as_str(), bold, true, out);
        } else if let Some(code) = caps.name("code") {
            push_plain(code.as_str(), bold, italic, out);
        } else if let Some(link) = caps.name("link") {
            push_spans(link.as_str(), bold, italic, out);
        }

        last = whole.end();
    }
    push_plain(&text[last..], bold, italic, out);
}

fn push_plain(text: &str, bold: bool, italic: bool, out: &mut Vec<TextRun>) {
    if text.is_empty() {
        return;
    }
    out.push(TextRun {
        text: text.to_string(),
        bold,
        italic,
    });
}

fn merge_adjacent(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(prev) if prev.bold == run.bold && prev.italic == run.italic => {
                prev.text.push_str(&run.text);
            }
            _ => merged.push(run),
        }
    }
    merged
}
