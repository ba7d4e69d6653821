//! Batch conversion over a source tree.

mod common;

use common::{docx_template, part_text, pptx_template, write_source, write_templates};
use mdoffice::{run_batch, BatchEngine, BatchOptions, EngineConfig, FileStatus, OutputFormat};
use tempfile::TempDir;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_templates(&root.join("templates"));
    write_source(
        root,
        "markdown/proposal.md",
        "---\ntitle: Proposal\nclient: Acme\n---\n# Proposal\n\n## Scope\n\nBuild it.\n",
    );
    write_source(
        root,
        "markdown/client-presentation.md",
        "---\ntitle: Pitch\n---\n# Pitch\n\n## Next Steps\n\n- Sign\n",
    );
    write_source(root, "csv/quote.csv", "Item,Cost\nSetup,$500\n");
    dir
}

fn status_of(report: &mdoffice::BatchReport, name: &str) -> FileStatus {
    report
        .files
        .iter()
        .find(|f| f.source.file_name().is_some_and(|n| n == name))
        .unwrap_or_else(|| panic!("no record for {}", name))
        .status
}

#[test]
fn test_converts_tree_next_to_source_folders() {
    let dir = project();
    let root = dir.path();
    let report = run_batch(BatchOptions::new(root), &EngineConfig::default()).unwrap();

    assert!(report.is_success(), "{:?}", report.errors());
    assert_eq!(report.converted, 3);
    assert!(root.join("proposal.docx").is_file());
    assert!(root.join("client-presentation.pptx").is_file());
    assert!(root.join("quote.xlsx").is_file());

    let bytes = std::fs::read(root.join("proposal.docx")).unwrap();
    assert!(part_text(&bytes, "word/document.xml").contains(">1 Scope<"));
    for record in &report.files {
        assert!(record.bytes.unwrap() > 0);
    }
}

#[test]
fn test_failures_do_not_stop_the_batch() {
    let dir = project();
    let root = dir.path();
    write_source(root, "markdown/broken.md", "---\ntitle: never closed\n# Body\n");

    let report = run_batch(BatchOptions::new(root), &EngineConfig::default()).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed, 1);
    assert_eq!(report.converted, 3);
    assert!(report.fatal.is_none());
    assert_eq!(status_of(&report, "broken.md"), FileStatus::Failed);
    assert!(report.errors()[0].contains("broken.md"));
    assert!(!root.join("broken.docx").exists());
}

#[test]
fn test_dropped_image_marks_run_failed() {
    let dir = project();
    let root = dir.path();
    write_source(
        root,
        "markdown/architecture.md",
        "# Architecture\n\n## Overview\n\n![diagram](missing.png)\n\nStill rendered.\n",
    );

    let report = run_batch(BatchOptions::new(root), &EngineConfig::default()).unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed, 0);
    assert_eq!(report.converted, 4);
    assert_eq!(report.unit_error_files, 1);
    assert_eq!(status_of(&report, "architecture.md"), FileStatus::Converted);
    assert!(report.errors().iter().any(|e| e.contains("missing.png")));

    let bytes = std::fs::read(root.join("architecture.docx")).unwrap();
    assert!(part_text(&bytes, "word/document.xml").contains("Still rendered."));
}

#[test]
fn test_up_to_date_outputs_are_skipped() {
    let dir = project();
    let root = dir.path();
    run_batch(BatchOptions::new(root), &EngineConfig::default()).unwrap();

    let again = run_batch(BatchOptions::new(root), &EngineConfig::default()).unwrap();
    assert_eq!(again.converted, 0);
    assert_eq!(again.skipped, 3);
    assert!(again.is_success());

    let forced = run_batch(BatchOptions::new(root).force(), &EngineConfig::default()).unwrap();
    assert_eq!(forced.converted, 3);
}

#[test]
fn test_filters() {
    let dir = project();
    let root = dir.path();

    let decks = run_batch(
        BatchOptions::new(root).with_format(OutputFormat::Pptx),
        &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(decks.total(), 1);
    assert_eq!(status_of(&decks, "client-presentation.md"), FileStatus::Converted);

    let csv_only = run_batch(
        BatchOptions::new(root).with_subdir("csv").dry_run(),
        &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(csv_only.planned, 1);
    assert!(!root.join("quote.xlsx").exists());

    let by_name = run_batch(
        BatchOptions::new(root).with_file("Proposal").dry_run(),
        &EngineConfig::default(),
    )
    .unwrap();
    assert_eq!(by_name.total(), 1);
    assert_eq!(by_name.files[0].output.as_deref(), Some(root.join("proposal.docx").as_path()));
}

#[test]
fn test_wrong_template_is_fatal() {
    let dir = project();
    let root = dir.path();
    // A deck where a document template is expected.
    std::fs::write(root.join("templates/template.docx"), pptx_template()).unwrap();

    let report = run_batch(
        BatchOptions::new(root).with_format(OutputFormat::Docx),
        &EngineConfig::default(),
    )
    .unwrap();
    assert!(report.fatal.as_deref().unwrap().contains("not a docx template"));
    assert_eq!(report.failed, 1);
    assert!(!report.is_success());
}

#[test]
fn test_config_names_templates() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("brand")).unwrap();
    std::fs::write(root.join("brand/letterhead.docx"), docx_template()).unwrap();
    std::fs::write(
        root.join(EngineConfig::FILE_NAME),
        r#"{"template_dir": "brand", "templates": {"docx": "letterhead.docx"}, "render": {"front_lists": false}}"#,
    )
    .unwrap();
    write_source(root, "md/memo.md", "# Memo\n\n## Note\n\nHello.\n");

    let config = EngineConfig::discover(root).unwrap().unwrap();
    let mut engine = BatchEngine::new(
        BatchOptions::new(root)
            .with_convert_options(mdoffice::ConvertOptions::new().with_render_options(config.render_options())),
        &config,
    );
    assert_eq!(
        engine.templates().path_for(OutputFormat::Docx),
        root.join("brand/letterhead.docx")
    );

    let report = engine.run().unwrap();
    assert!(report.is_success(), "{:?}", report.errors());
    let bytes = std::fs::read(root.join("memo.docx")).unwrap();
    assert!(!part_text(&bytes, "word/document.xml").contains("TOC \\o"));
}

#[test]
fn test_template_dir_option_overrides_config() {
    let dir = project();
    let root = dir.path();
    let config = EngineConfig::from_json(r#"{"template_dir": "missing"}"#).unwrap();
    let engine = BatchEngine::new(
        BatchOptions::new(root).with_template_dir(root.join("templates")),
        &config,
    );
    assert_eq!(
        engine.templates().path_for(OutputFormat::Xlsx),
        root.join("templates/template.xlsx")
    );
}
