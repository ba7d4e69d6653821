//! Parsing options.

/// Options for building a document model from markup.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Treat the first level-1 heading as the document title: it is not
    /// numbered, not rendered in the body, and deeper headings move up
    /// one level
    pub suppress_title: bool,

    /// Source identity recorded on the document
    pub source_name: String,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the first level-1 heading as an ordinary section.
    pub fn keep_title(mut self) -> Self {
        self.suppress_title = false;
        self
    }

    /// Set the source identity.
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            suppress_title: true,
            source_name: String::new(),
        }
    }
}
