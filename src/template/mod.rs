//! Branded template assets.
//!
//! Each output format is produced by filling a pre-styled template
//! package. The [`TemplateLoader`] reads each template file once and
//! hands out cheap [`Template`] handles sharing the cached bytes; every
//! output file then opens its own fresh [`Package`] from those bytes so
//! edits never leak from one file into the next.

pub mod package;
pub mod xml;

pub use package::{rels_path, Package, Relationship};

use crate::convert::OutputFormat;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A validated template for one output format.
#[derive(Debug, Clone)]
pub struct Template {
    format: OutputFormat,
    path: PathBuf,
    bytes: Arc<Vec<u8>>,
}

impl Template {
    /// Build a template from bytes, checking that it is a package of the
    /// expected kind.
    pub fn from_bytes(format: OutputFormat, path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self> {
        let template = Self {
            format,
            path: path.into(),
            bytes: Arc::new(bytes),
        };
        let package = template.open()?;
        let main = format.main_part();
        if !package.has_part(main) {
            return Err(Error::Template(format!(
                "{} is not a {} template: missing {}",
                template.path.display(),
                format,
                main
            )));
        }
        Ok(template)
    }

    /// Output format this template produces.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Where the template was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh package from the cached bytes.
    pub fn open(&self) -> Result<Package> {
        Package::from_bytes(&self.bytes)
    }
}

/// Loads templates from a directory and caches their bytes.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    dir: PathBuf,
    names: HashMap<OutputFormat, String>,
    cache: HashMap<OutputFormat, Template>,
}

impl TemplateLoader {
    /// Create a loader for `dir` with the default file names.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let names = OutputFormat::all()
            .iter()
            .map(|f| (*f, f.default_template_name().to_string()))
            .collect();
        Self {
            dir: dir.into(),
            names,
            cache: HashMap::new(),
        }
    }

    /// Override the template file name for one format.
    pub fn with_name(mut self, format: OutputFormat, name: impl Into<String>) -> Self {
        self.names.insert(format, name.into());
        self.cache.remove(&format);
        self
    }

    /// Template directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Expected path of the template for `format`.
    pub fn path_for(&self, format: OutputFormat) -> PathBuf {
        let name = self
            .names
            .get(&format)
            .map(String::as_str)
            .unwrap_or_else(|| format.default_template_name());
        self.dir.join(name)
    }

    /// Fail with [`Error::TemplateMissing`] unless the template file exists.
    pub fn ensure_available(&self, format: OutputFormat) -> Result<()> {
        let path = self.path_for(format);
        if path.is_file() {
            Ok(())
        } else {
            Err(Error::TemplateMissing {
                format: format.to_string(),
                path,
            })
        }
    }

    /// Load (or reuse) the template for `format`.
    pub fn load(&mut self, format: OutputFormat) -> Result<Template> {
        if let Some(template) = self.cache.get(&format) {
            return Ok(template.clone());
        }

        self.ensure_available(format)?;
        let path = self.path_for(format);
        let bytes = std::fs::read(&path)?;
        let template = Template::from_bytes(format, &path, bytes)?;
        log::debug!("Loaded {} template from {}", format, path.display());
        self.cache.insert(format, template.clone());
        Ok(template)
    }
}
