//! Batch engine.
//!
//! Discovers sources under a root, decides the output format and path of
//! each, and converts them one after the other. A failing file is recorded
//! and the batch moves on; only a missing or unusable template stops it.

use crate::config::EngineConfig;
use crate::convert::{ConvertOptions, ConverterRegistry, OutputFormat};
use crate::detect::{detect_source_kind, SourceKind};
use crate::error::{Error, Result};
use crate::template::TemplateLoader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Options for one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Source file or directory
    pub root: PathBuf,

    /// Only produce outputs of this format
    pub format: Option<OutputFormat>,

    /// Only convert sources whose file name or stem is listed
    pub files: Vec<String>,

    /// Only convert sources below this directory (relative to the root)
    pub subdir: Option<PathBuf>,

    /// Regenerate outputs that are already up to date
    pub force: bool,

    /// Report what would be generated without writing anything
    pub dry_run: bool,

    /// Template directory, overriding the configuration
    pub template_dir: Option<PathBuf>,

    /// Conversion options applied to every file
    pub convert: ConvertOptions,
}

impl BatchOptions {
    /// Create options for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Restrict the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Add a file name filter.
    pub fn with_file(mut self, name: impl Into<String>) -> Self {
        self.files.push(name.into());
        self
    }

    /// Restrict discovery to a subdirectory.
    pub fn with_subdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.subdir = Some(dir.into());
        self
    }

    /// Regenerate every output.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Plan only.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Use templates from `dir`.
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    /// Set the per-file conversion options.
    pub fn with_convert_options(mut self, options: ConvertOptions) -> Self {
        self.convert = options;
        self
    }

    fn matches_file_filter(&self, path: &Path) -> bool {
        if self.files.is_empty() {
            return true;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.files.iter().any(|f| {
            let f = f.to_lowercase();
            f == name || f == stem
        })
    }
}

/// A source selected for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Source path
    pub source: PathBuf,
    /// Source kind
    pub kind: SourceKind,
    /// Output format
    pub format: OutputFormat,
    /// Output path
    pub output: PathBuf,
}

/// What happened to one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Output written
    Converted,
    /// Output already up to date
    Skipped,
    /// Would be generated (dry run)
    Planned,
    /// Conversion failed
    Failed,
}

/// Per-file record of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Source path
    pub source: PathBuf,
    /// Output path, when one was decided
    pub output: Option<PathBuf>,
    /// Output format, when one was decided
    pub format: Option<OutputFormat>,
    /// Outcome
    pub status: FileStatus,
    /// Error message for failed files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Units that failed but did not stop the file
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unit_errors: Vec<String>,
    /// Output size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
}

impl FileRecord {
    fn for_item(item: &BatchItem, status: FileStatus) -> Self {
        Self {
            source: item.source.clone(),
            output: Some(item.output.clone()),
            format: Some(item.format),
            status,
            error: None,
            unit_errors: Vec::new(),
            bytes: None,
        }
    }

    fn failed(source: &Path, error: &Error) -> Self {
        Self {
            source: source.to_path_buf(),
            output: None,
            format: None,
            status: FileStatus::Failed,
            error: Some(error.to_string()),
            unit_errors: Vec::new(),
            bytes: None,
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-file records in processing order
    pub files: Vec<FileRecord>,
    /// Files converted
    pub converted: usize,
    /// Files skipped as up to date
    pub skipped: usize,
    /// Files that would be generated (dry run)
    pub planned: usize,
    /// Files that failed
    pub failed: usize,
    /// Converted files that lost a section, table or image
    pub unit_error_files: usize,
    /// Error that stopped the batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Wall time in milliseconds
    pub elapsed_ms: u128,
}

impl BatchReport {
    fn push(&mut self, record: FileRecord) {
        match record.status {
            FileStatus::Converted => self.converted += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Planned => self.planned += 1,
            FileStatus::Failed => self.failed += 1,
        }
        if !record.unit_errors.is_empty() {
            self.unit_error_files += 1;
        }
        self.files.push(record);
    }

    /// Every error message, file errors first, then unit errors.
    pub fn errors(&self) -> Vec<String> {
        let mut errors: Vec<String> = self
            .fatal
            .iter()
            .cloned()
            .chain(self.files.iter().filter_map(|f| {
                f.error
                    .as_ref()
                    .map(|e| format!("{}: {}", f.source.display(), e))
            }))
            .collect();
        for f in &self.files {
            errors.extend(
                f.unit_errors
                    .iter()
                    .map(|e| format!("{}: {}", f.source.display(), e)),
            );
        }
        errors
    }

    /// Total number of files considered.
    pub fn total(&self) -> usize {
        self.files.len()
    }

    /// True when nothing failed, no unit was dropped and the batch was
    /// not stopped.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.unit_error_files == 0 && self.fatal.is_none()
    }
}

/// Output path for a source: its stem with the format extension, written
/// next to the source's parent directory.
///
/// Sources directly inside `root` (or without a grandparent directory)
/// get their output in the same directory.
pub fn output_path(source: &Path, root: &Path, format: OutputFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{}.{}", stem, format.extension());

    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    let dir = if parent == root {
        parent
    } else {
        match parent.parent() {
            Some(grandparent) if !grandparent.as_os_str().is_empty() => grandparent,
            _ => parent,
        }
    };
    dir.join(file_name)
}

/// Whether `output` exists and is at least as new as `source`.
pub fn is_up_to_date(source: &Path, output: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(out)) => out >= src,
        _ => false,
    }
}

/// Find every convertible source under `root`, sorted.
///
/// Hidden directories are not searched. A file root is returned as-is.
pub fn discover_sources(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", root.display()),
        )));
    }

    let base = root
        .to_str()
        .ok_or_else(|| Error::Other(format!("{} is not valid UTF-8", root.display())))?;
    let base = glob::Pattern::escape(base);

    let mut found = BTreeSet::new();
    for kind in [SourceKind::Markup, SourceKind::Tabular] {
        for ext in kind.extensions() {
            let pattern = format!("{}/**/*.{}", base, ext);
            let options = glob::MatchOptions {
                case_sensitive: false,
                ..glob::MatchOptions::new()
            };
            let entries = glob::glob_with(&pattern, options)
                .map_err(|e| Error::Other(format!("invalid pattern {}: {}", pattern, e)))?;
            for entry in entries {
                match entry {
                    Ok(path) if !is_hidden(&path, root) => {
                        found.insert(path);
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("Skipping unreadable path: {}", e),
                }
            }
        }
    }
    Ok(found.into_iter().collect())
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

/// The batch engine.
pub struct BatchEngine {
    options: BatchOptions,
    registry: ConverterRegistry,
    templates: TemplateLoader,
}

impl BatchEngine {
    /// Create an engine. Template names and the template directory come
    /// from `config` unless the options override the directory.
    pub fn new(options: BatchOptions, config: &EngineConfig) -> Self {
        let root = if options.root.is_file() {
            options.root.parent().unwrap_or_else(|| Path::new("."))
        } else {
            options.root.as_path()
        };
        let mut config = config.clone();
        if let Some(dir) = &options.template_dir {
            config.template_dir = Some(dir.clone());
            config.base_dir = None;
        }
        let templates = config.template_loader(root);
        Self {
            options,
            registry: ConverterRegistry::with_defaults(),
            templates,
        }
    }

    /// Replace the converter registry.
    pub fn with_registry(mut self, registry: ConverterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Template loader in use.
    pub fn templates(&self) -> &TemplateLoader {
        &self.templates
    }

    /// Discover and filter sources, deciding format and output path for
    /// each. Sources whose format cannot be decided are returned as
    /// failed records.
    pub fn plan(&self) -> Result<(Vec<BatchItem>, Vec<FileRecord>)> {
        let root = &self.options.root;
        let search_root = match &self.options.subdir {
            Some(sub) if root.is_dir() => root.join(sub),
            _ => root.clone(),
        };
        let output_root = if root.is_file() {
            root.parent().unwrap_or_else(|| Path::new("")).to_path_buf()
        } else {
            root.clone()
        };

        let mut items = Vec::new();
        let mut failures = Vec::new();
        for source in discover_sources(&search_root)? {
            if !self.options.matches_file_filter(&source) {
                continue;
            }
            match self.plan_source(&source, &output_root) {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(e) => failures.push(FileRecord::failed(&source, &e)),
            }
        }
        log::debug!(
            "Planned {} sources under {} ({} undecidable)",
            items.len(),
            search_root.display(),
            failures.len()
        );
        Ok((items, failures))
    }

    fn plan_source(&self, source: &Path, root: &Path) -> Result<Option<BatchItem>> {
        let kind = detect_source_kind(source)?;
        let converter = self.registry.for_path(source)?;

        // A format filter that the source kind can never produce excludes it.
        if let Some(wanted) = self.options.format {
            if !kind.targets().contains(&wanted) {
                return Ok(None);
            }
        }
        let format = converter.target_format(source, &self.options.convert)?;
        if self.options.format.is_some_and(|wanted| wanted != format) {
            return Ok(None);
        }
        Ok(Some(BatchItem {
            source: source.to_path_buf(),
            kind,
            format,
            output: output_path(source, root, format),
        }))
    }

    /// Check that every template the items need exists.
    pub fn check_templates(&self, items: &[BatchItem]) -> Result<()> {
        let formats: BTreeSet<OutputFormat> = items.iter().map(|i| i.format).collect();
        formats
            .into_iter()
            .try_for_each(|f| self.templates.ensure_available(f))
    }

    /// Convert one item and write its output.
    pub fn process(&mut self, item: &BatchItem) -> Result<FileRecord> {
        let converter = self.registry.for_path(&item.source)?;
        let options = self.options.convert.clone().with_target(item.format);
        let result = converter.convert(&item.source, &mut self.templates, &options)?;
        result.save(&item.output)?;

        let mut record = FileRecord::for_item(item, FileStatus::Converted);
        record.bytes = Some(result.content_len());
        record.unit_errors = result.report.errors.iter().map(|e| e.to_string()).collect();
        log::info!(
            "Converted {} -> {} ({} units, {} unit errors)",
            item.source.display(),
            item.output.display(),
            result.report.units,
            result.report.errors.len()
        );
        Ok(record)
    }

    /// Run the batch.
    pub fn run(&mut self) -> Result<BatchReport> {
        self.run_with(|_| {})
    }

    /// Run the batch, calling `on_file` after each record is final.
    ///
    /// Returns `Err` only when discovery itself fails; missing templates
    /// are reported through [`BatchReport::fatal`].
    pub fn run_with<F: FnMut(&FileRecord)>(&mut self, mut on_file: F) -> Result<BatchReport> {
        let start = Instant::now();
        let mut report = BatchReport {
            dry_run: self.options.dry_run,
            ..BatchReport::default()
        };

        let (items, failures) = self.plan()?;
        for record in failures {
            on_file(&record);
            report.push(record);
        }

        let (pending, fresh): (Vec<BatchItem>, Vec<BatchItem>) = items
            .into_iter()
            .partition(|item| self.options.force || !is_up_to_date(&item.source, &item.output));
        for item in &fresh {
            let record = FileRecord::for_item(item, FileStatus::Skipped);
            on_file(&record);
            report.push(record);
        }

        if self.options.dry_run {
            for item in &pending {
                let record = FileRecord::for_item(item, FileStatus::Planned);
                on_file(&record);
                report.push(record);
            }
            report.elapsed_ms = start.elapsed().as_millis();
            return Ok(report);
        }

        if let Err(e) = self.check_templates(&pending) {
            log::error!("{}", e);
            report.fatal = Some(e.to_string());
            report.elapsed_ms = start.elapsed().as_millis();
            return Ok(report);
        }

        for item in &pending {
            let record = match self.process(item) {
                Ok(record) => record,
                Err(e) => {
                    log::error!("{}: {}", item.source.display(), e);
                    let mut record = FileRecord::for_item(item, FileStatus::Failed);
                    record.error = Some(e.to_string());
                    if e.is_batch_fatal() {
                        report.fatal = Some(e.to_string());
                    }
                    record
                }
            };
            on_file(&record);
            report.push(record);
            if report.fatal.is_some() {
                break;
            }
        }

        report.elapsed_ms = start.elapsed().as_millis();
        Ok(report)
    }
}

/// Run a batch with the default registry.
pub fn run_batch(options: BatchOptions, config: &EngineConfig) -> Result<BatchReport> {
    BatchEngine::new(options, config).run()
}
