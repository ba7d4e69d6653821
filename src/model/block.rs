//! Content blocks, text runs and captions.

use super::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One semantic unit of body content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// A paragraph with inline bold/italic spans
    Paragraph {
        /// Styled runs
        runs: Vec<TextRun>,
    },

    /// A bullet list item
    Bullet {
        /// Styled runs
        runs: Vec<TextRun>,
        /// Indent level (0 = top level)
        level: u8,
    },

    /// A table
    Table(Table),

    /// An image reference
    Image {
        /// Path as written in the source (relative to the source file)
        path: String,
        /// Alternative text
        alt: String,
    },

    /// A numbered caption for the preceding table or image
    Caption(Caption),
}

impl ContentBlock {
    /// Create a paragraph from runs.
    pub fn paragraph(runs: Vec<TextRun>) -> Self {
        ContentBlock::Paragraph { runs }
    }

    /// Create a bullet from runs.
    pub fn bullet(runs: Vec<TextRun>, level: u8) -> Self {
        ContentBlock::Bullet { runs, level }
    }

    /// Get plain text content of the block.
    pub fn plain_text(&self) -> String {
        match self {
            ContentBlock::Paragraph { runs } | ContentBlock::Bullet { runs, .. } => {
                plain_text(runs)
            }
            ContentBlock::Table(t) => t.plain_text(),
            ContentBlock::Image { alt, .. } => alt.clone(),
            ContentBlock::Caption(c) => c.to_string(),
        }
    }
}

/// Concatenate the text of a run sequence.
pub fn plain_text(runs: &[TextRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,

    /// Bold text
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,

    /// Italic text
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
}

impl TextRun {
    /// Create a plain run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    /// Create a bold run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            bold: true,
            ..Self::new(text)
        }
    }

    /// Create an italic run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            italic: true,
            ..Self::new(text)
        }
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Caption label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptionLabel {
    /// Table caption
    Table,
    /// Figure caption
    Figure,
}

impl CaptionLabel {
    /// Label as used in captions and `SEQ` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionLabel::Table => "Table",
            CaptionLabel::Figure => "Figure",
        }
    }
}

impl fmt::Display for CaptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numbered caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caption {
    /// Table or Figure
    pub label: CaptionLabel,
    /// Sequence number within the label, starting at 1
    pub number: u32,
    /// Description text
    pub description: String,
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{} {}", self.label, self.number)
        } else {
            write!(f, "{} {}: {}", self.label, self.number, self.description)
        }
    }
}

/// Independent per-label caption counters, scoped to one document.
#[derive(Debug, Clone, Default)]
pub struct CaptionCounters {
    table: u32,
    figure: u32,
}

impl CaptionCounters {
    /// Create counters starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter for `label` and build the caption.
    pub fn next(&mut self, label: CaptionLabel, description: impl Into<String>) -> Caption {
        let counter = match label {
            CaptionLabel::Table => &mut self.table,
            CaptionLabel::Figure => &mut self.figure,
        };
        *counter += 1;
        Caption {
            label,
            number: *counter,
            description: description.into(),
        }
    }

    /// Current value for `label` (number of captions issued).
    pub fn current(&self, label: CaptionLabel) -> u32 {
        match label {
            CaptionLabel::Table => self.table,
            CaptionLabel::Figure => self.figure,
        }
    }
}
