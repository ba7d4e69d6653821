//! Document-level types.

use super::{ContentBlock, Section};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A parsed markup source.
///
/// Built once per source file and discarded after rendering. Renderers
/// read it but never mutate it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Source identity (usually the file name)
    pub source: String,

    /// Front-matter metadata
    pub metadata: Metadata,

    /// Text of the suppressed title heading, if any
    pub title: Option<String>,

    /// Blocks that appear before the first numbered section
    pub preamble: Vec<ContentBlock>,

    /// Top-level sections in document order
    pub sections: Vec<Section>,
}

impl Document {
    /// Create a new empty document.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Check if the document has no body content.
    pub fn is_empty(&self) -> bool {
        self.preamble.is_empty() && self.sections.is_empty()
    }

    /// Title for covers and title slides.
    ///
    /// Front matter wins over the suppressed heading.
    pub fn display_title(&self) -> Option<&str> {
        self.metadata
            .get("title")
            .or(self.title.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    /// Iterate all sections depth-first in document order.
    pub fn iter_sections(&self) -> SectionIter<'_> {
        SectionIter {
            stack: self.sections.iter().rev().collect(),
        }
    }

    /// Total number of sections (including nested).
    pub fn section_count(&self) -> usize {
        self.iter_sections().count()
    }

    /// Iterate every content block: preamble first, then sections in order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        self.preamble
            .iter()
            .chain(self.iter_sections().flat_map(|s| s.blocks.iter()))
    }

    /// Serialize the model to pretty JSON (used for inspection and dry runs).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Depth-first iterator over a section tree.
pub struct SectionIter<'a> {
    stack: Vec<&'a Section>,
}

impl<'a> Iterator for SectionIter<'a> {
    type Item = &'a Section;

    fn next(&mut self) -> Option<Self::Item> {
        let section = self.stack.pop()?;
        self.stack.extend(section.children.iter().rev());
        Some(section)
    }
}

/// Flat key/value front matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Keys are stored lower-cased.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(key.as_ref().trim().to_lowercase(), value.into());
    }

    /// Look up a value by key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_lowercase()).map(String::as_str)
    }

    /// First present key out of several aliases.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// Client name, accepting the common spellings.
    pub fn client_name(&self) -> Option<&str> {
        self.get_any(&["client_name", "client", "customer"])
    }

    /// Path of the client logo, if any.
    pub fn logo(&self) -> Option<&str> {
        self.get_any(&["client_logo", "logo"])
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.insert(k, v);
        }
        metadata
    }
}
