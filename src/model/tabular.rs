//! Tabular (delimited text) sources.

use serde::{Deserialize, Serialize};

/// A parsed delimited-text source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabularSource {
    /// Source identity (usually the file name)
    pub source: String,

    /// Sections in file order; files without `#` markers have one unnamed section
    pub sections: Vec<TabularSection>,
}

impl TabularSource {
    /// Create an empty source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sections: Vec::new(),
        }
    }

    /// First section, which is what the generic renderer uses.
    pub fn primary(&self) -> Option<&TabularSection> {
        self.sections.first()
    }

    /// Find a section by marker name (case-insensitive, substring match).
    pub fn section(&self, marker: &str) -> Option<&TabularSection> {
        let wanted = marker.to_lowercase();
        self.sections.iter().find(|s| {
            s.marker
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains(&wanted))
        })
    }

    /// Total data rows across all sections.
    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }
}

/// One header + rows block of a tabular source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularSection {
    /// Marker text after `#` (e.g. "EFFORT ESTIMATE")
    pub marker: Option<String>,

    /// Column names
    pub header: Vec<String>,

    /// Data rows, padded or truncated to the header width
    pub rows: Vec<Vec<String>>,
}

impl TabularSection {
    /// Index of the first column whose name contains any of `needles`.
    pub fn column_index(&self, needles: &[&str]) -> Option<usize> {
        self.header.iter().position(|h| {
            let h = h.to_lowercase();
            needles.iter().any(|n| h.contains(n))
        })
    }

    /// Values of one column.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |r| r.get(index).map(String::as_str).unwrap_or(""))
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.header.len()
    }
}
