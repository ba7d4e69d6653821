//! Rendering module for filling branded templates.
//!
//! Each renderer opens a fresh package from a cached [`Template`](crate::template::Template),
//! appends content unit by unit, and serializes the result. A failure in
//! one unit (a section, table or image) is recorded in the
//! [`RenderReport`] and rendering continues with the next unit.

mod context;
pub mod docx;
pub mod field;
mod options;
pub mod pptx;
mod properties;
pub mod xlsx;

pub use context::{RenderContext, StyleCatalogue, Theme};
pub use docx::{render_docx, DocxRenderer};
pub use field::{Field, FieldBuilder};
pub use options::RenderOptions;
pub use pptx::{render_pptx, PptxRenderer};
pub use properties::{stamp_core_properties, CORE_PROPERTIES};
pub use xlsx::{render_xlsx, XlsxRenderer};

use crate::error::{Error, RenderUnitError};
use serde::{Deserialize, Serialize};

/// Lifecycle of a renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderState {
    /// Created, no template yet
    #[default]
    Idle,
    /// Template package opened
    TemplateLoaded,
    /// At least one unit appended
    SectionAppended,
    /// Output serialized
    Saved,
}

/// Outcome of rendering one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderReport {
    /// Units rendered without error
    pub units: usize,

    /// Units that failed and were skipped
    pub errors: Vec<RenderUnitError>,
}

impl RenderReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a successfully rendered unit.
    pub fn record_success(&mut self) {
        self.units += 1;
    }

    /// Record a failed unit and log it.
    pub fn record_error(&mut self, unit: impl Into<String>, error: Error) {
        let unit = unit.into();
        let message = match error {
            Error::RenderUnit { message, .. } => message,
            other => other.to_string(),
        };
        log::warn!("Failed to render {}: {}", unit, message);
        self.errors.push(RenderUnitError::new(unit, message));
    }

    /// Whether every unit rendered.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Serialized output plus the report of how it was produced.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// Package bytes
    pub bytes: Vec<u8>,

    /// Unit-level report
    pub report: RenderReport,
}

impl RenderOutput {
    /// Output size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the output is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
