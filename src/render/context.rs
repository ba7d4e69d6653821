//! Per-file rendering context.
//!
//! Everything the renderers read from the template besides the parts
//! they edit: theme fonts and colours, and the catalogue of named
//! styles. Built once per output file and passed by reference to every
//! rendering call.

use super::RenderOptions;
use crate::convert::OutputFormat;
use crate::error::Result;
use crate::template::xml::{attributes, local_name};
use crate::template::Package;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_ACCENT: &str = "1F4E79";

/// Theme fonts and colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Heading font
    pub major_font: String,
    /// Body font
    pub minor_font: String,
    /// Colour scheme slots (`dk1`, `lt1`, `accent1`, ...) as hex RGB
    pub colors: HashMap<String, String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            major_font: "Calibri Light".to_string(),
            minor_font: "Calibri".to_string(),
            colors: HashMap::new(),
        }
    }
}

impl Theme {
    /// Parse a DrawingML theme part.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut theme = Theme::default();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut font_slot: Option<&'static str> = None;
        let mut in_scheme = false;
        let mut color_slot: Option<String> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let qname = e.name();
                    match local_name(qname.as_ref()) {
                        b"majorFont" => font_slot = Some("major"),
                        b"minorFont" => font_slot = Some("minor"),
                        b"clrScheme" => in_scheme = true,
                        b"srgbClr" | b"sysClr" => record_color(&e, color_slot.as_deref(), &mut theme),
                        name if in_scheme => {
                            color_slot = Some(String::from_utf8_lossy(name).into_owned());
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    let qname = e.name();
                    if local_name(qname.as_ref()) == b"latin" {
                        if let (Some(slot), Some(face)) = (font_slot, attributes(&e).remove("typeface")) {
                            match slot {
                                "major" => theme.major_font = face,
                                _ => theme.minor_font = face,
                            }
                        }
                    } else {
                        record_color(&e, color_slot.as_deref(), &mut theme);
                    }
                }
                Event::End(e) => match local_name(e.name().as_ref()) {
                    b"majorFont" | b"minorFont" => font_slot = None,
                    b"clrScheme" => in_scheme = false,
                    b"srgbClr" | b"sysClr" => {}
                    _ => color_slot = None,
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(theme)
    }

    /// Colour for a scheme slot.
    pub fn color(&self, slot: &str) -> Option<&str> {
        self.colors.get(slot).map(String::as_str)
    }

    /// Accent colour used for table header fills.
    pub fn accent(&self) -> &str {
        self.color("accent1").unwrap_or(DEFAULT_ACCENT)
    }
}

fn record_color(e: &BytesStart<'_>, slot: Option<&str>, theme: &mut Theme) {
    let Some(slot) = slot else {
        return;
    };
    let qname = e.name();
    let key = match local_name(qname.as_ref()) {
        b"srgbClr" => "val",
        b"sysClr" => "lastClr",
        _ => return,
    };
    if let Some(value) = attributes(e).remove(key) {
        theme.colors.insert(slot.to_string(), value.to_uppercase());
    }
}

/// Named paragraph/character/table styles of a word-processing template.
#[derive(Debug, Clone, Default)]
pub struct StyleCatalogue {
    ids: HashMap<String, String>,
    names: HashMap<String, String>,
}

impl StyleCatalogue {
    /// Parse `word/styles.xml`.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut catalogue = StyleCatalogue::default();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut current: Option<String> = None;
        loop {
            match reader.read_event()? {
                Event::Start(e) if local_name(e.name().as_ref()) == b"style" => {
                    current = attributes(&e).remove("styleId");
                    if let Some(id) = &current {
                        catalogue.ids.insert(id.to_lowercase(), id.clone());
                    }
                }
                Event::Empty(e) if local_name(e.name().as_ref()) == b"name" => {
                    if let (Some(id), Some(name)) = (&current, attributes(&e).remove("val")) {
                        catalogue.names.insert(normalize(&name), id.clone());
                    }
                }
                Event::End(e) if local_name(e.name().as_ref()) == b"style" => current = None,
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(catalogue)
    }

    /// Resolve a style by id or display name (case and spacing
    /// insensitive), returning the style id.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.ids
            .get(&name.to_lowercase())
            .or_else(|| self.names.get(&normalize(name)))
            .map(String::as_str)
    }

    /// Number of styles.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Immutable per-file context shared by all rendering calls.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Output format being produced
    pub format: OutputFormat,
    /// Template theme
    pub theme: Theme,
    /// Template styles (word-processing only)
    pub styles: StyleCatalogue,
    /// Directory image paths are resolved against
    pub source_dir: PathBuf,
    /// Rendering options
    pub options: RenderOptions,
}

impl RenderContext {
    /// Build the context from a freshly opened template package.
    pub fn new(
        package: &Package,
        format: OutputFormat,
        source_dir: impl Into<PathBuf>,
        options: RenderOptions,
    ) -> Result<Self> {
        let theme_part = match format {
            OutputFormat::Docx => "word/theme/theme1.xml",
            OutputFormat::Pptx => "ppt/theme/theme1.xml",
            OutputFormat::Xlsx => "xl/theme/theme1.xml",
        };
        let theme = if package.has_part(theme_part) {
            Theme::parse(&package.part_text(theme_part)?)?
        } else {
            log::debug!("Template has no {}, using default theme", theme_part);
            Theme::default()
        };

        let styles = if format == OutputFormat::Docx && package.has_part("word/styles.xml") {
            StyleCatalogue::parse(&package.part_text("word/styles.xml")?)?
        } else {
            StyleCatalogue::default()
        };

        Ok(Self {
            format,
            theme,
            styles,
            source_dir: source_dir.into(),
            options,
        })
    }

    /// Resolve a path from the source against the source directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.source_dir.join(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEME: &str = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Brand"><a:themeElements><a:clrScheme name="Brand"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:accent1><a:srgbClr val="c00000"/></a:accent1></a:clrScheme><a:fontScheme name="Brand"><a:majorFont><a:latin typeface="Georgia"/></a:majorFont><a:minorFont><a:latin typeface="Segoe UI"/></a:minorFont></a:fontScheme></a:themeElements></a:theme>"#;

    #[test]
    fn test_theme_parse() {
        let theme = Theme::parse(THEME).unwrap();
        assert_eq!(theme.major_font, "Georgia");
        assert_eq!(theme.minor_font, "Segoe UI");
        assert_eq!(theme.color("dk1"), Some("000000"));
        assert_eq!(theme.accent(), "C00000");
    }

    #[test]
    fn test_theme_defaults() {
        let theme = Theme::parse("<a:theme/>").unwrap();
        assert_eq!(theme.minor_font, "Calibri");
        assert_eq!(theme.accent(), DEFAULT_ACCENT);
    }

    #[test]
    fn test_style_catalogue() {
        let xml = r#"<w:styles xmlns:w="w"><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/></w:style></w:styles>"#;
        let styles = StyleCatalogue::parse(xml).unwrap();
        assert_eq!(styles.len(), 2);
        assert_eq!(styles.resolve("Heading1"), Some("Heading1"));
        assert_eq!(styles.resolve("heading 1"), Some("Heading1"));
        assert_eq!(styles.resolve("Table Grid"), Some("TableGrid"));
        assert_eq!(styles.resolve("Caption"), None);
    }

    #[test]
    fn test_resolve_path() {
        let ctx = RenderContext {
            format: OutputFormat::Docx,
            theme: Theme::default(),
            styles: StyleCatalogue::default(),
            source_dir: PathBuf::from("/src/docs"),
            options: RenderOptions::default(),
        };
        assert_eq!(ctx.resolve_path("img/a.png"), PathBuf::from("/src/docs/img/a.png"));
        assert_eq!(ctx.resolve_path("/abs/a.png"), PathBuf::from("/abs/a.png"));
    }
}
