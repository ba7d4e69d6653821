//! Markup source converter.

use super::{read_source, ConvertOptions, ConvertResult, DocumentConverter, OutputFormat};
use crate::detect::{markup_target, markup_target_from_path};
use crate::error::{Error, Result};
use crate::layout::assign_hints;
use crate::model::Document;
use crate::parser::{parse_markup_with_options, ParseOptions};
use crate::render::{render_docx, render_pptx};
use crate::template::TemplateLoader;
use std::path::Path;

/// Markup converter.
///
/// Builds the document model and renders it into a word-processing
/// document or, for decks, a slide presentation.
#[derive(Debug, Clone, Default)]
pub struct MarkupConverter {
    _private: (),
}

impl MarkupConverter {
    /// Create a new markup converter.
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_parse_options(&self, source_name: &str, options: &ConvertOptions) -> ParseOptions {
        let parse_opts = ParseOptions::new().with_source_name(source_name);
        if options.keep_title {
            parse_opts.keep_title()
        } else {
            parse_opts
        }
    }

    fn convert_document(
        &self,
        mut doc: Document,
        format: OutputFormat,
        source_dir: &Path,
        templates: &mut TemplateLoader,
        options: &ConvertOptions,
    ) -> Result<ConvertResult> {
        let template = templates.load(format)?;
        let output = match format {
            OutputFormat::Docx => render_docx(&doc, &template, source_dir, &options.render)?,
            OutputFormat::Pptx => {
                assign_hints(&mut doc);
                render_pptx(&doc, &template, source_dir, &options.render)?
            }
            OutputFormat::Xlsx => {
                return Err(Error::UnsupportedSource(format!(
                    "{} is markup and cannot be rendered as a workbook",
                    doc.source
                )))
            }
        };
        Ok(ConvertResult::new(output.bytes, format, output.report))
    }
}

impl DocumentConverter for MarkupConverter {
    fn supported_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn name(&self) -> &str {
        "markup"
    }

    fn target_format(&self, path: &Path, options: &ConvertOptions) -> Result<OutputFormat> {
        match options.target {
            Some(format) => Ok(format),
            None => markup_target_from_path(path),
        }
    }

    fn convert(
        &self,
        path: &Path,
        templates: &mut TemplateLoader,
        options: &ConvertOptions,
    ) -> Result<ConvertResult> {
        let (text, name, dir) = read_source(path)?;
        self.convert_text(&text, &name, dir, templates, options)
    }

    fn convert_text(
        &self,
        text: &str,
        source_name: &str,
        source_dir: &Path,
        templates: &mut TemplateLoader,
        options: &ConvertOptions,
    ) -> Result<ConvertResult> {
        let doc = parse_markup_with_options(text, &self.build_parse_options(source_name, options))?;
        let format = options
            .target
            .unwrap_or_else(|| markup_target(Path::new(source_name), &doc.metadata));
        log::debug!(
            "{}: {} sections, rendering {}",
            source_name,
            doc.section_count(),
            format
        );
        self.convert_document(doc, format, source_dir, templates, options)
    }
}
