//! Error types for mdoffice.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mdoffice operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while assembling documents.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading sources or templates.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed front matter (unterminated delimiter).
    #[error("Parse error: {0}")]
    Parse(String),

    /// No branded template is available for an output format.
    #[error("Template missing for {format}: {}", path.display())]
    TemplateMissing {
        /// Output format the template was needed for
        format: String,
        /// Where the template was expected
        path: PathBuf,
    },

    /// The template exists but does not have the structure the renderer needs.
    #[error("Invalid template: {0}")]
    Template(String),

    /// Failure while rendering a single section, table or image.
    #[error("Failed to render {unit}: {message}")]
    RenderUnit {
        /// Human-readable name of the unit (e.g. "section 2.1 Scope")
        unit: String,
        /// What went wrong
        message: String,
    },

    /// Failure writing the output file.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error reading or writing the zip container of a template.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error reading a template XML part.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Error reading a tabular source.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The source file kind is not recognized.
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    /// Invalid configuration file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a render-unit error.
    pub fn render_unit(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RenderUnit {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole batch instead of one file.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Error::TemplateMissing { .. } | Error::Template(_))
    }
}

/// A recovered failure for one render unit.
///
/// Renderers collect these instead of aborting the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderUnitError {
    /// The unit that failed
    pub unit: String,
    /// What went wrong
    pub message: String,
}

impl RenderUnitError {
    /// Create a new unit error.
    pub fn new(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RenderUnitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.unit, self.message)
    }
}

impl From<Error> for RenderUnitError {
    fn from(err: Error) -> Self {
        match err {
            Error::RenderUnit { unit, message } => RenderUnitError { unit, message },
            other => RenderUnitError::new("document", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Parse("unterminated front matter".into());
        assert_eq!(err.to_string(), "Parse error: unterminated front matter");

        let err = Error::TemplateMissing {
            format: "docx".into(),
            path: PathBuf::from("templates/template.docx"),
        };
        assert_eq!(
            err.to_string(),
            "Template missing for docx: templates/template.docx"
        );
    }

    #[test]
    fn test_batch_fatal() {
        let missing = Error::TemplateMissing {
            format: "pptx".into(),
            path: PathBuf::from("x.pptx"),
        };
        assert!(missing.is_batch_fatal());
        assert!(!Error::Parse("x".into()).is_batch_fatal());
        assert!(!Error::render_unit("table 1", "empty").is_batch_fatal());
    }

    #[test]
    fn test_unit_error_conversion() {
        let unit: RenderUnitError = Error::render_unit("figure 2", "file not found").into();
        assert_eq!(unit.unit, "figure 2");
        assert_eq!(unit.to_string(), "figure 2: file not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
