//! Source kind detection and output format selection.

use crate::convert::OutputFormat;
use crate::error::{Error, Result};
use crate::model::Metadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Kind of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Markup with optional front matter
    Markup,
    /// Delimited tabular text
    Tabular,
}

impl SourceKind {
    /// Extensions recognised for this kind, lowercase without the dot.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Markup => &["md", "markdown"],
            SourceKind::Tabular => &["csv"],
        }
    }

    /// Formats a source of this kind can be converted to.
    pub fn targets(&self) -> &'static [OutputFormat] {
        match self {
            SourceKind::Markup => &[OutputFormat::Docx, OutputFormat::Pptx],
            SourceKind::Tabular => &[OutputFormat::Xlsx],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Markup => f.write_str("markup"),
            SourceKind::Tabular => f.write_str("tabular"),
        }
    }
}

/// Front-matter keys that name the output format.
const FORMAT_KEYS: &[&str] = &["output", "format", "output_format"];

/// Stem words that mark a markup source as a slide deck.
const DECK_WORDS: &[&str] = &["presentation", "deck", "slides"];

/// Detect the source kind from the file extension.
///
/// # Example
/// ```
/// use mdoffice::detect::{detect_source_kind, SourceKind};
///
/// assert_eq!(detect_source_kind("docs/proposal.md").unwrap(), SourceKind::Markup);
/// assert!(detect_source_kind("notes.txt").is_err());
/// ```
pub fn detect_source_kind<P: AsRef<Path>>(path: P) -> Result<SourceKind> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    [SourceKind::Markup, SourceKind::Tabular]
        .into_iter()
        .find(|kind| kind.extensions().contains(&ext.as_str()))
        .ok_or_else(|| Error::UnsupportedSource(path.display().to_string()))
}

/// Check if a path looks like a convertible source.
pub fn is_source<P: AsRef<Path>>(path: P) -> bool {
    detect_source_kind(path).is_ok()
}

/// Output format for a markup source.
///
/// Front matter `output:` wins; otherwise a file stem containing
/// `presentation`, `deck` or `slides` selects a slide deck, and anything
/// else a word-processing document. Unrecognised `output:` values are
/// ignored with a warning.
pub fn markup_target(path: &Path, metadata: &Metadata) -> OutputFormat {
    if let Some(value) = metadata.get_any(FORMAT_KEYS) {
        match value.parse::<OutputFormat>() {
            Ok(OutputFormat::Xlsx) => {
                log::warn!("{}: markup cannot become a workbook, ignoring output: {}", path.display(), value)
            }
            Ok(format) => return format,
            Err(_) => log::warn!("{}: unknown output format '{}'", path.display(), value),
        }
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if DECK_WORDS.iter().any(|w| stem.contains(w)) {
        OutputFormat::Pptx
    } else {
        OutputFormat::Docx
    }
}

/// Read just the front matter of a markup file and pick its format.
pub fn markup_target_from_path(path: &Path) -> Result<OutputFormat> {
    let text = std::fs::read_to_string(path)?;
    let (metadata, _) = crate::parser::split_front_matter(&text)?;
    Ok(markup_target(path, &metadata))
}
