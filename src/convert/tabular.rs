//! Tabular source converter.

use super::{read_source, ConvertOptions, ConvertResult, DocumentConverter, OutputFormat};
use crate::error::{Error, Result};
use crate::parser::parse_tabular;
use crate::render::render_xlsx;
use crate::template::TemplateLoader;
use std::path::Path;

/// Tabular converter: delimited text to a workbook.
#[derive(Debug, Clone, Default)]
pub struct TabularConverter {
    _private: (),
}

impl TabularConverter {
    /// Create a new tabular converter.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl DocumentConverter for TabularConverter {
    fn supported_extensions(&self) -> &[&str] {
        &["csv"]
    }

    fn name(&self) -> &str {
        "tabular"
    }

    fn target_format(&self, path: &Path, options: &ConvertOptions) -> Result<OutputFormat> {
        match options.target {
            None | Some(OutputFormat::Xlsx) => Ok(OutputFormat::Xlsx),
            Some(other) => Err(Error::UnsupportedSource(format!(
                "{} is tabular and cannot be rendered as {}",
                path.display(),
                other
            ))),
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
        _source_dir: &Path,
        templates: &mut TemplateLoader,
        options: &ConvertOptions,
    ) -> Result<ConvertResult> {
        let format = self.target_format(Path::new(source_name), options)?;
        let source = parse_tabular(text, source_name)?;
        log::debug!(
            "{}: {} sections, {} rows",
            source_name,
            source.sections.len(),
            source.row_count()
        );
        let template = templates.load(format)?;
        let output = render_xlsx(&source, &template, &options.render)?;
        Ok(ConvertResult::new(output.bytes, format, output.report))
    }
}
