//! # mdoffice
//!
//! Assemble branded office documents from plain-text sources.
//!
//! Markdown with front matter becomes a Word document or a PowerPoint
//! deck, and CSV becomes an Excel workbook. Every output is filled into a
//! branded template package, so fonts, colours, numbering and layouts
//! come from the template rather than from code.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mdoffice::Assembler;
//!
//! fn main() -> mdoffice::Result<()> {
//!     let result = Assembler::new("templates").convert("docs/markdown/proposal.md")?;
//!     result.save("docs/proposal.docx".as_ref())?;
//!     for err in &result.report.errors {
//!         eprintln!("skipped {}", err);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Numbered sections**: hierarchical `1`, `1.1`, `1.1.1` numbering
//! - **Live fields**: table of contents and `SEQ` caption numbers stay updatable
//! - **Column widths**: table columns sized from a weighted character score
//! - **Slide layouts**: each section classified into a layout of the branded deck
//! - **Workbooks**: currency detection, formulas, and multi-sheet layouts for known files
//! - **Batch mode**: a whole tree converted with per-file error records

pub mod batch;
pub mod config;
pub mod convert;
pub mod detect;
pub mod error;
pub mod layout;
pub mod model;
pub mod parser;
pub mod render;
pub mod template;

// Re-export commonly used types
pub use batch::{run_batch, BatchEngine, BatchOptions, BatchReport, FileRecord, FileStatus};
pub use config::EngineConfig;
pub use convert::{
    ConvertOptions, ConvertResult, ConverterRegistry, DocumentConverter, OutputFormat,
};
pub use detect::{detect_source_kind, is_source, SourceKind};
pub use error::{Error, RenderUnitError, Result};
pub use model::{
    Caption, CaptionLabel, ContentBlock, Document, ImageResource, Metadata, Section,
    SectionNumber, SlideLayoutHint, Table, TabularSection, TabularSource, TextRun,
};
pub use parser::{parse_markup, parse_markup_file, parse_tabular, parse_tabular_file, ParseOptions};
pub use render::{RenderOptions, RenderReport};
pub use template::{Template, TemplateLoader};

use std::path::{Path, PathBuf};

/// Convert a source file with the templates in `template_dir`.
///
/// The output format follows the source: front matter or file name for
/// markup, always a workbook for CSV.
///
/// # Example
///
/// ```no_run
/// use mdoffice::convert_file;
///
/// let result = convert_file("notes/kickoff.md", "templates").unwrap();
/// std::fs::write("kickoff.docx", &result.bytes).unwrap();
/// ```
pub fn convert_file<P: AsRef<Path>, T: AsRef<Path>>(path: P, template_dir: T) -> Result<ConvertResult> {
    Assembler::new(template_dir.as_ref()).convert(path)
}

/// Render markup text into a word-processing document.
pub fn to_docx<T: AsRef<Path>>(markup: &str, template_dir: T) -> Result<Vec<u8>> {
    Assembler::new(template_dir.as_ref())
        .with_target(OutputFormat::Docx)
        .convert_text(markup, "document.md", Path::new("."))
        .map(|r| r.bytes)
}

/// Render markup text into a slide deck.
pub fn to_pptx<T: AsRef<Path>>(markup: &str, template_dir: T) -> Result<Vec<u8>> {
    Assembler::new(template_dir.as_ref())
        .with_target(OutputFormat::Pptx)
        .convert_text(markup, "presentation.md", Path::new("."))
        .map(|r| r.bytes)
}

/// Render CSV text into a workbook. `source_name` selects the
/// multi-sheet layout for known files such as `effort-estimate.csv`.
pub fn to_xlsx<T: AsRef<Path>>(csv: &str, source_name: &str, template_dir: T) -> Result<Vec<u8>> {
    Assembler::new(template_dir.as_ref())
        .convert_text(csv, source_name, Path::new("."))
        .map(|r| r.bytes)
}

/// Builder for converting single sources.
///
/// # Example
///
/// ```no_run
/// use mdoffice::{Assembler, OutputFormat, RenderOptions};
///
/// let deck = Assembler::new("templates")
///     .with_target(OutputFormat::Pptx)
///     .with_render_options(RenderOptions::new().with_title_slide(false))
///     .convert("docs/quarterly-review.md")?;
/// # Ok::<(), mdoffice::Error>(())
/// ```
pub struct Assembler {
    templates: TemplateLoader,
    options: ConvertOptions,
    registry: ConverterRegistry,
}

impl Assembler {
    /// Create an assembler using templates from `template_dir`.
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates: TemplateLoader::new(template_dir),
            options: ConvertOptions::default(),
            registry: ConverterRegistry::with_defaults(),
        }
    }

    /// Create an assembler from an engine configuration.
    pub fn from_config(config: &EngineConfig, root: &Path) -> Self {
        Self {
            templates: config.template_loader(root),
            options: ConvertOptions::new().with_render_options(config.render_options()),
            registry: ConverterRegistry::with_defaults(),
        }
    }

    /// Force the output format.
    pub fn with_target(mut self, format: OutputFormat) -> Self {
        self.options = self.options.with_target(format);
        self
    }

    /// Set render options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.options = self.options.with_render_options(options);
        self
    }

    /// Keep the first level-1 heading as a section.
    pub fn keep_title(mut self) -> Self {
        self.options = self.options.keep_title();
        self
    }

    /// Template loader in use.
    pub fn templates(&self) -> &TemplateLoader {
        &self.templates
    }

    /// Convert a source file.
    pub fn convert<P: AsRef<Path>>(&mut self, path: P) -> Result<ConvertResult> {
        self.registry
            .convert(path.as_ref(), &mut self.templates, &self.options)
    }

    /// Convert source text. The extension of `source_name` picks the
    /// converter; `source_dir` resolves relative image paths.
    pub fn convert_text(
        &mut self,
        text: &str,
        source_name: &str,
        source_dir: &Path,
    ) -> Result<ConvertResult> {
        let converter = self.registry.for_path(Path::new(source_name))?;
        converter.convert_text(text, source_name, source_dir, &mut self.templates, &self.options)
    }
}
