//! Document converter module providing a plugin architecture for source kinds.
//!
//! A converter turns one source file into one branded output package.
//! Converters are registered by source file extension and dispatched by
//! the [`ConverterRegistry`].
//!
//! # Example
//!
//! ```no_run
//! use mdoffice::convert::{ConvertOptions, ConverterRegistry};
//! use mdoffice::template::TemplateLoader;
//! use std::path::Path;
//!
//! fn main() -> mdoffice::Result<()> {
//!     let registry = ConverterRegistry::with_defaults();
//!     let mut templates = TemplateLoader::new("templates");
//!
//!     let path = Path::new("proposal.md");
//!     let result = registry.convert(path, &mut templates, &ConvertOptions::default())?;
//!     result.save(Path::new("proposal.docx"))?;
//!     Ok(())
//! }
//! ```

mod markup;
mod tabular;

pub use markup::MarkupConverter;
pub use tabular::TabularConverter;

use crate::error::{Error, Result};
use crate::render::{RenderOptions, RenderReport};
use crate::template::TemplateLoader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Output package format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Word-processing document
    Docx,
    /// Slide deck
    Pptx,
    /// Spreadsheet workbook
    Xlsx,
}

impl OutputFormat {
    /// Every format, in a stable order.
    pub fn all() -> [OutputFormat; 3] {
        [OutputFormat::Docx, OutputFormat::Pptx, OutputFormat::Xlsx]
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pptx => "pptx",
            OutputFormat::Xlsx => "xlsx",
        }
    }

    /// Part every package of this format must contain.
    pub fn main_part(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "word/document.xml",
            OutputFormat::Pptx => "ppt/presentation.xml",
            OutputFormat::Xlsx => "xl/workbook.xml",
        }
    }

    /// Template file name used when the configuration names none.
    pub fn default_template_name(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "template.docx",
            OutputFormat::Pptx => "template.pptx",
            OutputFormat::Xlsx => "template.xlsx",
        }
    }

    /// MIME type of the output package.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            OutputFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            OutputFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    /// Accepts extensions and the common names of each format.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "docx" | "word" | "document" => Ok(OutputFormat::Docx),
            "pptx" | "powerpoint" | "presentation" | "slides" | "deck" => Ok(OutputFormat::Pptx),
            "xlsx" | "excel" | "workbook" | "spreadsheet" => Ok(OutputFormat::Xlsx),
            other => Err(Error::Config(format!("unknown output format: {}", other))),
        }
    }
}

/// Options for document conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Rendering options
    pub render: RenderOptions,

    /// Force an output format instead of detecting it
    pub target: Option<OutputFormat>,

    /// Keep the first level-1 heading as a numbered section
    pub keep_title: bool,
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }

    /// Force the output format.
    pub fn with_target(mut self, format: OutputFormat) -> Self {
        self.target = Some(format);
        self
    }

    /// Keep the title heading in the body.
    pub fn keep_title(mut self) -> Self {
        self.keep_title = true;
        self
    }
}

/// Result of document conversion.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// Output package bytes
    pub bytes: Vec<u8>,

    /// Format of the package
    pub format: OutputFormat,

    /// Unit-level rendering report
    pub report: RenderReport,
}

impl ConvertResult {
    /// Create a new conversion result.
    pub fn new(bytes: Vec<u8>, format: OutputFormat, report: RenderReport) -> Self {
        Self {
            bytes,
            format,
            report,
        }
    }

    /// MIME type of the output.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Get content length in bytes.
    pub fn content_len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether every unit rendered.
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }

    /// Write the package to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Trait for source converters.
///
/// Implement this trait to add support for a new source kind.
pub trait DocumentConverter: Send + Sync {
    /// Get the supported file extensions for this converter.
    ///
    /// Extensions should be lowercase without the leading dot (e.g., `["md"]`).
    fn supported_extensions(&self) -> &[&str];

    /// Get the name of this converter.
    fn name(&self) -> &str;

    /// Output format a source at `path` will be converted to, reading the
    /// source when the decision depends on its content.
    fn target_format(&self, path: &Path, options: &ConvertOptions) -> Result<OutputFormat>;

    /// Convert a file at the given path.
    fn convert(
        &self,
        path: &Path,
        templates: &mut TemplateLoader,
        options: &ConvertOptions,
    ) -> Result<ConvertResult>;

    /// Convert source text. `source_name` identifies the source and
    /// `source_dir` resolves relative image paths.
    fn convert_text(
        &self,
        text: &str,
        source_name: &str,
        source_dir: &Path,
        templates: &mut TemplateLoader,
        options: &ConvertOptions,
    ) -> Result<ConvertResult>;

    /// Check if this converter supports the given extension.
    fn supports_extension(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.supported_extensions().iter().any(|e| *e == ext_lower)
    }
}

/// Read a source file and split its path into name and directory.
pub(crate) fn read_source(path: &Path) -> Result<(String, String, &Path)> {
    let text = std::fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    Ok((text, name, dir))
}

/// Registry for source converters.
///
/// The registry maps file extensions to converters and provides
/// convenient methods for converting sources.
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn DocumentConverter>>,
    by_name: HashMap<String, Arc<dyn DocumentConverter>>,
}

impl ConverterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            converters: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Create a registry with the markup and tabular converters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MarkupConverter::new()));
        registry.register(Arc::new(TabularConverter::new()));
        registry
    }

    /// Register a converter.
    ///
    /// The converter will be registered for all its supported extensions.
    pub fn register(&mut self, converter: Arc<dyn DocumentConverter>) {
        for ext in converter.supported_extensions() {
            self.converters
                .insert(ext.to_lowercase(), converter.clone());
        }
        self.by_name
            .insert(converter.name().to_lowercase(), converter);
    }

    /// Get a converter by file extension.
    pub fn get_by_extension(&self, ext: &str) -> Option<Arc<dyn DocumentConverter>> {
        self.converters.get(&ext.to_lowercase()).cloned()
    }

    /// Get a converter by name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn DocumentConverter>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    /// Check if an extension is supported.
    pub fn supports(&self, ext: &str) -> bool {
        self.converters.contains_key(&ext.to_lowercase())
    }

    /// Get all supported extensions.
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.converters.keys().map(|s| s.as_str()).collect();
        exts.sort_unstable();
        exts
    }

    /// Converter for a path, by its extension.
    pub fn for_path(&self, path: &Path) -> Result<Arc<dyn DocumentConverter>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedSource(format!("{} has no extension", path.display())))?;

        self.get_by_extension(ext)
            .ok_or_else(|| Error::UnsupportedSource(format!("no converter for extension: {}", ext)))
    }

    /// Convert a file using the appropriate converter.
    pub fn convert(
        &self,
        path: &Path,
        templates: &mut TemplateLoader,
        options: &ConvertOptions,
    ) -> Result<ConvertResult> {
        self.for_path(path)?.convert(path, templates, options)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_options_builder() {
        let options = ConvertOptions::new()
            .with_target(OutputFormat::Pptx)
            .keep_title();

        assert_eq!(options.target, Some(OutputFormat::Pptx));
        assert!(options.keep_title);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("docx".parse::<OutputFormat>().unwrap(), OutputFormat::Docx);
        assert_eq!(".PPTX".parse::<OutputFormat>().unwrap(), OutputFormat::Pptx);
        assert_eq!("slides".parse::<OutputFormat>().unwrap(), OutputFormat::Pptx);
        assert_eq!("Excel".parse::<OutputFormat>().unwrap(), OutputFormat::Xlsx);
        assert!("pdf".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Xlsx.to_string(), "xlsx");
    }

    #[test]
    fn test_output_format_parts() {
        assert_eq!(OutputFormat::Docx.main_part(), "word/document.xml");
        assert_eq!(OutputFormat::Pptx.default_template_name(), "template.pptx");
        assert!(OutputFormat::Xlsx.mime_type().ends_with("spreadsheetml.sheet"));
    }

    #[test]
    fn test_registry_with_defaults() {
        let registry = ConverterRegistry::with_defaults();
        assert!(registry.supports("md"));
        assert!(registry.supports("MD"));
        assert!(registry.supports("csv"));
        assert!(!registry.supports("pdf"));
        assert_eq!(registry.supported_extensions(), vec!["csv", "markdown", "md"]);
    }

    #[test]
    fn test_registry_get_by_name() {
        let registry = ConverterRegistry::with_defaults();
        assert_eq!(registry.get_by_name("markup").unwrap().name(), "markup");
        assert!(registry.get_by_name("tabular").is_some());
    }

    #[test]
    fn test_registry_for_path() {
        let registry = ConverterRegistry::with_defaults();
        assert_eq!(registry.for_path(Path::new("a/b.csv")).unwrap().name(), "tabular");
        assert!(matches!(
            registry.for_path(Path::new("notes.txt")),
            Err(Error::UnsupportedSource(_))
        ));
        assert!(registry.for_path(Path::new("README")).is_err());
    }
}
