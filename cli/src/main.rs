//! mdoffice CLI - branded document assembly

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use mdoffice::{
    BatchEngine, BatchOptions, BatchReport, ConvertOptions, EngineConfig, FileRecord, FileStatus,
    OutputFormat,
};

#[derive(Parser)]
#[command(name = "mdoffice")]
#[command(version)]
#[command(about = "Assemble branded Word, PowerPoint and Excel files from Markdown and CSV", long_about = None)]
struct Cli {
    /// Source file or directory
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Only generate outputs of this type
    #[arg(short = 't', long = "type", value_enum)]
    output_type: Option<OutputType>,

    /// Only convert these files (name or stem, repeatable)
    #[arg(short, long = "file", value_name = "NAME")]
    files: Vec<String>,

    /// Only convert sources below this subdirectory
    #[arg(short, long, value_name = "SUBDIR")]
    dir: Option<PathBuf>,

    /// Template directory
    #[arg(long, value_name = "DIR", env = "MDOFFICE_TEMPLATES")]
    templates: Option<PathBuf>,

    /// Configuration file (default: mdoffice.json in PATH)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Regenerate outputs even when they are up to date
    #[arg(long)]
    force: bool,

    /// Show what would be generated without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputType {
    /// Word documents
    Docx,
    /// PowerPoint decks
    Pptx,
    /// Excel workbooks
    Xlsx,
}

impl From<OutputType> for OutputFormat {
    fn from(t: OutputType) -> Self {
        match t {
            OutputType::Docx => OutputFormat::Docx,
            OutputType::Pptx => OutputFormat::Pptx,
            OutputType::Xlsx => OutputFormat::Xlsx,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(report) => {
            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    }
    builder.init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::discover(&cli.path)?.unwrap_or_default(),
    };
    Ok(config)
}

fn build_options(cli: &Cli, config: &EngineConfig) -> BatchOptions {
    let convert = ConvertOptions::new().with_render_options(config.render_options());
    let mut options = BatchOptions::new(&cli.path).with_convert_options(convert);
    options.format = cli.output_type.map(Into::into);
    options.files = cli.files.clone();
    options.subdir = cli.dir.clone();
    options.force = cli.force;
    options.dry_run = cli.dry_run;
    options.template_dir = cli.templates.clone();
    options
}

fn run(cli: &Cli) -> Result<BatchReport, Box<dyn std::error::Error>> {
    let config = load_config(cli)?;
    let mut engine = BatchEngine::new(build_options(cli, &config), &config);

    let show_progress = !cli.quiet && !cli.verbose && !cli.json;
    let pb = if show_progress {
        let (items, failures) = engine.plan()?;
        let pb = ProgressBar::new((items.len() + failures.len()) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let root = cli.path.clone();
    let report = engine.run_with(|record| {
        let line = file_line(record, &root);
        match &pb {
            Some(pb) => {
                pb.inc(1);
                pb.set_message(display_path(&record.source, &root));
                if !cli.quiet || record.status == FileStatus::Failed {
                    pb.println(line);
                }
            }
            None if cli.json => {}
            None if cli.quiet && record.status != FileStatus::Failed => {}
            None => println!("{}", line),
        }
    })?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, cli.quiet);
    }
    Ok(report)
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

fn file_line(record: &FileRecord, root: &Path) -> String {
    let source = display_path(&record.source, root);
    let output = record
        .output
        .as_deref()
        .map(|p| display_path(p, root))
        .unwrap_or_default();
    match record.status {
        FileStatus::Converted if record.unit_errors.is_empty() => {
            format!("  {} {} -> {}", "✓".green(), source, output)
        }
        FileStatus::Converted => format!(
            "  {} {} -> {} ({} units skipped)",
            "!".yellow(),
            source,
            output,
            record.unit_errors.len()
        ),
        FileStatus::Skipped => format!("  {} {} (up to date)", "-".dimmed(), source.dimmed()),
        FileStatus::Planned => format!("  {} {} -> {}", "+".cyan(), source, output),
        FileStatus::Failed => format!(
            "  {} {}: {}",
            "✗".red(),
            source,
            record.error.as_deref().unwrap_or("failed")
        ),
    }
}

fn print_summary(report: &BatchReport, quiet: bool) {
    let errors = report.errors();
    if !quiet {
        println!();
        let headline = if report.dry_run {
            format!("{} would be generated", report.planned)
        } else {
            format!("{} converted", report.converted)
        };
        println!(
            "{}, {} skipped, {} failed, {} incomplete ({} ms)",
            headline.bold(),
            report.skipped,
            report.failed,
            report.unit_error_files,
            report.elapsed_ms
        );
    }
    if !errors.is_empty() {
        eprintln!("\n{}", "Errors:".red().bold());
        for e in &errors {
            eprintln!("  {} {}", "└─".dimmed(), e);
        }
    }
}
