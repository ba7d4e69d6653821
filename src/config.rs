//! Engine configuration file.
//!
//! An optional JSON file names the template directory, per-format
//! template files, and render option overrides:
//!
//! ```json
//! {
//!   "template_dir": "branding",
//!   "templates": { "pptx": "deck-2024.pptx" },
//!   "render": { "image_width": 5.5, "toc_levels": [1, 2] }
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use crate::convert::OutputFormat;
use crate::error::{Error, Result};
use crate::render::RenderOptions;
use crate::template::TemplateLoader;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Template directory used when the configuration names none.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

/// Per-format template file names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateNames {
    /// Word-processing template
    pub docx: Option<String>,
    /// Slide-deck template
    pub pptx: Option<String>,
    /// Workbook template
    pub xlsx: Option<String>,
}

impl TemplateNames {
    /// Configured name for a format.
    pub fn get(&self, format: OutputFormat) -> Option<&str> {
        match format {
            OutputFormat::Docx => self.docx.as_deref(),
            OutputFormat::Pptx => self.pptx.as_deref(),
            OutputFormat::Xlsx => self.xlsx.as_deref(),
        }
    }
}

/// Render option overrides; unset fields keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOverrides {
    /// Usable page width in inches
    pub page_width: Option<f64>,
    /// Image width in inches
    pub image_width: Option<f64>,
    /// First and last heading level of the table of contents
    pub toc_levels: Option<[u8; 2]>,
    /// Emit the table of contents and caption lists
    pub front_lists: Option<bool>,
    /// Page value after literal list entries
    pub page_placeholder: Option<String>,
    /// Synthesize a title slide
    pub title_slide: Option<bool>,
}

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Template directory
    pub template_dir: Option<PathBuf>,
    /// Template file names
    pub templates: TemplateNames,
    /// Render option overrides
    pub render: RenderOverrides,

    /// Directory the configuration was loaded from
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// File name looked up at the batch root.
    pub const FILE_NAME: &'static str = "mdoffice.json";

    /// Parse configuration JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_json(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `mdoffice.json` from `root` (or the directory of `root` when
    /// it is a file), if present.
    pub fn discover<P: AsRef<Path>>(root: P) -> Result<Option<Self>> {
        let root = root.as_ref();
        let dir = if root.is_file() {
            root.parent().unwrap_or_else(|| Path::new("."))
        } else {
            root
        };
        let candidate = dir.join(Self::FILE_NAME);
        if candidate.is_file() {
            Self::load(candidate).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Template directory, resolved against the configuration's directory
    /// or `root`.
    pub fn template_dir(&self, root: &Path) -> PathBuf {
        let base = self.base_dir.as_deref().unwrap_or(root);
        match &self.template_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base.join(dir),
            None => base.join(DEFAULT_TEMPLATE_DIR),
        }
    }

    /// Template loader for this configuration.
    pub fn template_loader(&self, root: &Path) -> TemplateLoader {
        OutputFormat::all()
            .into_iter()
            .fold(TemplateLoader::new(self.template_dir(root)), |loader, format| {
                match self.templates.get(format) {
                    Some(name) => loader.with_name(format, name),
                    None => loader,
                }
            })
    }

    /// Default render options with the overrides applied.
    pub fn render_options(&self) -> RenderOptions {
        let r = &self.render;
        let mut options = RenderOptions::default();
        if let Some(w) = r.page_width {
            options = options.with_page_width(w);
        }
        if let Some(w) = r.image_width {
            options = options.with_image_width(w);
        }
        if let Some([first, last]) = r.toc_levels {
            options = options.with_toc_levels(first..=last);
        }
        if let Some(enabled) = r.front_lists {
            options = options.with_front_lists(enabled);
        }
        if let Some(p) = &r.page_placeholder {
            options = options.with_page_placeholder(p.clone());
        }
        if let Some(enabled) = r.title_slide {
            options = options.with_title_slide(enabled);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_json() {
        let config = EngineConfig::from_json(
            r#"{"template_dir": "branding", "templates": {"pptx": "deck.pptx"}, "render": {"image_width": 5.5, "toc_levels": [1, 2], "front_lists": false}}"#,
        )
        .unwrap();
        assert_eq!(config.template_dir, Some(PathBuf::from("branding")));
        assert_eq!(config.templates.get(OutputFormat::Pptx), Some("deck.pptx"));
        assert_eq!(config.templates.get(OutputFormat::Docx), None);

        let options = config.render_options();
        assert_eq!(options.image_width, 5.5);
        assert_eq!(options.toc_levels, 1..=2);
        assert!(!options.front_lists);
        assert_eq!(options.page_width, RenderOptions::default().page_width);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = EngineConfig::from_json(r#"{"template": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_config() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(
            config.template_dir(Path::new("/work")),
            PathBuf::from("/work").join(DEFAULT_TEMPLATE_DIR)
        );
    }

    #[test]
    fn test_discover_and_resolve() {
        let dir = TempDir::new().unwrap();
        assert!(EngineConfig::discover(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(EngineConfig::FILE_NAME),
            r#"{"template_dir": "brand", "templates": {"docx": "letterhead.docx"}}"#,
        )
        .unwrap();
        let config = EngineConfig::discover(dir.path()).unwrap().unwrap();
        assert_eq!(config.template_dir(Path::new("/elsewhere")), dir.path().join("brand"));

        let loader = config.template_loader(Path::new("/elsewhere"));
        assert_eq!(
            loader.path_for(OutputFormat::Docx),
            dir.path().join("brand").join("letterhead.docx")
        );
        assert_eq!(
            loader.path_for(OutputFormat::Xlsx),
            dir.path().join("brand").join("template.xlsx")
        );
    }

    #[test]
    fn test_load_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
