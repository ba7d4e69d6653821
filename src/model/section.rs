//! Sections, section numbers and slide layout hints.

use super::ContentBlock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A heading and the content that follows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Heading text
    pub title: String,

    /// Heading level (1-6)
    pub level: u8,

    /// Computed section number; has exactly `level` components
    pub number: SectionNumber,

    /// Content blocks directly under this heading
    pub blocks: Vec<ContentBlock>,

    /// Nested sections
    pub children: Vec<Section>,

    /// Layout hint, only assigned when the target is a slide deck
    pub slide_hint: Option<SlideLayoutHint>,
}

impl Section {
    /// Create a new empty section.
    pub fn new(title: impl Into<String>, level: u8, number: SectionNumber) -> Self {
        Self {
            title: title.into(),
            level: level.clamp(1, 6),
            number,
            blocks: Vec::new(),
            children: Vec::new(),
            slide_hint: None,
        }
    }

    /// Heading text prefixed with the section number ("1.2 Scope").
    pub fn numbered_title(&self) -> String {
        format!("{} {}", self.number, self.title)
    }

    /// Whether any block in this section is a table.
    pub fn has_table(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::Table(_)))
    }

    /// Whether any block in this section is an image.
    pub fn has_image(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::Image { .. }))
    }
}

/// Hierarchical section number such as `[2, 1, 3]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionNumber(Vec<u32>);

impl SectionNumber {
    /// Number components.
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Number of components (equals the heading level).
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<u32>> for SectionNumber {
    fn from(components: Vec<u32>) -> Self {
        Self(components)
    }
}

impl fmt::Display for SectionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Closed set of slide layouts a section can render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideLayoutHint {
    /// Title slide (synthesized from metadata, never from body content)
    Title,
    /// Title and a single content column
    SingleColumn,
    /// Title and two content columns
    TwoColumn,
    /// Title and a table
    Table,
    /// Title and a bullet list
    BulletPoints,
    /// Picture with caption
    Visual,
    /// Figures and numbers
    DataVisualization,
    /// Closing slide
    ThankYou,
}

impl SlideLayoutHint {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlideLayoutHint::Title => "title",
            SlideLayoutHint::SingleColumn => "single-column",
            SlideLayoutHint::TwoColumn => "two-column",
            SlideLayoutHint::Table => "table",
            SlideLayoutHint::BulletPoints => "bullet-points",
            SlideLayoutHint::Visual => "visual",
            SlideLayoutHint::DataVisualization => "data-visualization",
            SlideLayoutHint::ThankYou => "thank-you",
        }
    }
}

impl fmt::Display for SlideLayoutHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
