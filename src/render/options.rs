//! Rendering options and configuration.

use crate::layout::DEFAULT_PAGE_WIDTH;
use std::ops::RangeInclusive;

/// Options for rendering a document into a template.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Usable page width for tables, in inches
    pub page_width: f64,

    /// Width images are scaled to in word-processing output, in inches
    pub image_width: f64,

    /// Heading levels collected by the table of contents field
    pub toc_levels: RangeInclusive<u8>,

    /// Emit the table of contents and the lists of tables and figures
    pub front_lists: bool,

    /// Page value written after each literal list entry
    pub page_placeholder: String,

    /// Synthesize a title slide from metadata
    pub title_slide: bool,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the usable page width in inches.
    pub fn with_page_width(mut self, inches: f64) -> Self {
        self.page_width = inches;
        self
    }

    /// Set the image width in inches.
    pub fn with_image_width(mut self, inches: f64) -> Self {
        self.image_width = inches;
        self
    }

    /// Set the heading levels shown in the table of contents.
    pub fn with_toc_levels(mut self, levels: RangeInclusive<u8>) -> Self {
        let start = (*levels.start()).clamp(1, 6);
        let end = (*levels.end()).clamp(start, 6);
        self.toc_levels = start..=end;
        self
    }

    /// Enable or disable the table of contents and caption lists.
    pub fn with_front_lists(mut self, enabled: bool) -> Self {
        self.front_lists = enabled;
        self
    }

    /// Set the page placeholder for literal list entries.
    pub fn with_page_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.page_placeholder = placeholder.into();
        self
    }

    /// Enable or disable the synthesized title slide.
    pub fn with_title_slide(mut self, enabled: bool) -> Self {
        self.title_slide = enabled;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_width: DEFAULT_PAGE_WIDTH,
            image_width: 6.0,
            toc_levels: 1..=3,
            front_lists: true,
            page_placeholder: "##".to_string(),
            title_slide: true,
        }
    }
}
