//! Word-processing output tests.

mod common;

use common::{part_text, png_bytes, read_parts, write_templates, ACCENT};
use mdoffice::{Assembler, Error, OutputFormat};
use std::path::Path;
use tempfile::TempDir;

const PROPOSAL: &str = "---
title: Data Platform Proposal
client: Acme & Sons
---

# Data Platform Proposal

Prepared in response to the RFP.

## Intro

We propose a **phased** delivery.

### Background

- Current warehouse is *on-premises*
  - Nightly batch loads

## Scope

| Task | Vendor | Client | SME |
|------|--------|--------|-----|
| Requirements workshops with all stakeholder groups | X | X | X |
| Data model design and review | X |  | X |

Table: Responsibility matrix

## Pricing

| Item | Cost |
|---|---|
| Build | $10,000 |
";

fn assembler(dir: &TempDir) -> Assembler {
    write_templates(&dir.path().join("templates"));
    Assembler::new(dir.path().join("templates")).with_target(OutputFormat::Docx)
}

fn render(dir: &TempDir, text: &str) -> (Vec<u8>, mdoffice::RenderReport) {
    let result = assembler(dir)
        .convert_text(text, "proposal.md", dir.path())
        .unwrap();
    assert_eq!(result.format, OutputFormat::Docx);
    (result.bytes, result.report)
}

#[test]
fn test_section_numbering_in_body() {
    let dir = TempDir::new().unwrap();
    let (bytes, report) = render(&dir, PROPOSAL);
    assert!(report.is_success(), "{:?}", report.errors);

    let document = part_text(&bytes, "word/document.xml");
    let intro = document.find(">1 Intro<").expect("1 Intro heading");
    let background = document.find(">1.1 Background<").expect("1.1 Background heading");
    let scope = document.find(">2 Scope<").expect("2 Scope heading");
    assert!(intro < background && background < scope);
    assert!(document.contains(">3 Pricing<"));

    // The title heading only appears on the cover.
    assert_eq!(document.matches("Data Platform Proposal").count(), 1);
    assert!(document.contains(r#"<w:pStyle w:val="Heading2"/>"#));
}

#[test]
fn test_cover_placeholders_and_marker() {
    let dir = TempDir::new().unwrap();
    let (bytes, _) = render(&dir, PROPOSAL);
    let document = part_text(&bytes, "word/document.xml");

    assert!(document.contains("<w:t>Data Platform Proposal</w:t>"));
    assert!(document.contains("Prepared for Acme &amp; Sons"));
    assert!(!document.contains("{{content}}"));
    assert!(!document.contains("{{title}}"));

    // Body sits between the cover and the section properties.
    let cover = document.find("Prepared for").unwrap();
    let body = document.find(">1 Intro<").unwrap();
    let sect = document.rfind("<w:sectPr").unwrap();
    assert!(cover < body && body < sect);
}

#[test]
fn test_core_properties_stamped() {
    let dir = TempDir::new().unwrap();
    let (bytes, _) = render(&dir, PROPOSAL);
    let core = part_text(&bytes, "docProps/core.xml");

    assert!(core.contains("<dc:title>Data Platform Proposal</dc:title>"));
    assert!(core.contains("<dc:creator>Brand Team</dc:creator>"));
    assert!(!core.contains("2020-01-01"));
}

#[test]
fn test_inline_spans_and_bullets() {
    let dir = TempDir::new().unwrap();
    let (bytes, _) = render(&dir, PROPOSAL);
    let document = part_text(&bytes, "word/document.xml");

    assert!(document.contains(r#"<w:rPr><w:b/></w:rPr><w:t xml:space="preserve">phased</w:t>"#));
    assert!(document.contains(r#"<w:rPr><w:i/></w:rPr><w:t xml:space="preserve">on-premises</w:t>"#));
    assert!(document.contains(r#"<w:pStyle w:val="ListBullet"/>"#));
    assert!(document.contains(r#"<w:pStyle w:val="ListBullet2"/>"#));
}

#[test]
fn test_tables_and_captions() {
    let dir = TempDir::new().unwrap();
    let (bytes, _) = render(&dir, PROPOSAL);
    let document = part_text(&bytes, "word/document.xml");

    assert_eq!(document.matches("<w:tbl>").count(), 2);
    assert!(document.contains(r#"<w:tblLayout w:type="fixed"/>"#));
    assert!(document.contains(&format!(r#"w:fill="{}""#, ACCENT)));

    // Captions use live sequence fields in the template's caption style.
    assert_eq!(document.matches("SEQ Table \\* ARABIC").count(), 2);
    assert!(document.contains(r#"<w:pStyle w:val="BrandCaption"/>"#));
    assert!(document.contains(": Responsibility matrix"));

    // The widest column is clipped to 35% of 6.5in (9360 twips).
    let first_col: i64 = document
        .split(r#"<w:gridCol w:w=""#)
        .nth(1)
        .and_then(|s| s.split('"').next())
        .and_then(|s| s.parse().ok())
        .unwrap();
    assert!(first_col <= (9360.0_f64 * 0.35).round() as i64 + 1);
    assert!(first_col >= 9360 / 4);
}

#[test]
fn test_front_lists() {
    let dir = TempDir::new().unwrap();
    let (bytes, _) = render(&dir, PROPOSAL);
    let document = part_text(&bytes, "word/document.xml");

    // Table of contents stays a live field.
    assert!(document.contains("TOC \\o &quot;1-3&quot; \\h \\z \\u"));
    // Lists of captions are literal text with a page placeholder.
    assert!(document.contains("List of Tables"));
    assert!(document.contains(">Table 1: Responsibility matrix<"));
    assert!(document.contains(">##<"));
    assert!(!document.contains("List of Figures"));

    let settings = part_text(&bytes, "word/settings.xml");
    assert!(settings.contains(r#"<w:updateFields w:val="true"/>"#));
}

#[test]
fn test_front_lists_disabled() {
    let dir = TempDir::new().unwrap();
    let result = assembler(&dir)
        .with_render_options(mdoffice::RenderOptions::new().with_front_lists(false))
        .convert_text(PROPOSAL, "proposal.md", dir.path())
        .unwrap();
    let document = part_text(&result.bytes, "word/document.xml");
    assert!(!document.contains("TOC \\o"));
    assert!(!document.contains("List of Tables"));
}

#[test]
fn test_image_embedding() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("arch.png"), png_bytes(800, 400)).unwrap();
    let text = "# T\n\n## Architecture\n\n![System architecture](arch.png)\n";
    let (bytes, report) = render(&dir, text);
    assert!(report.is_success(), "{:?}", report.errors);

    let parts = read_parts(&bytes);
    assert!(parts.contains_key("word/media/image1.png"));
    let types = part_text(&bytes, "[Content_Types].xml");
    assert!(types.contains(r#"Extension="png""#));
    let rels = part_text(&bytes, "word/_rels/document.xml.rels");
    assert!(rels.contains(r#"Target="media/image1.png""#));

    let document = part_text(&bytes, "word/document.xml");
    // 6in wide, aspect ratio 2:1.
    assert!(document.contains(r#"<wp:extent cx="5486400" cy="2743200"/>"#));
    assert!(document.contains("SEQ Figure \\* ARABIC"));
    assert!(document.contains("List of Figures"));
}

#[test]
fn test_missing_image_is_a_unit_error() {
    let dir = TempDir::new().unwrap();
    let text = "# T\n\n## One\n\n![Missing](nope.png)\n\nStill here.\n\n## Two\n\nAfter.\n";
    let (bytes, report) = render(&dir, text);

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].unit.contains("nope.png"));
    let document = part_text(&bytes, "word/document.xml");
    assert!(document.contains("Still here."));
    assert!(document.contains(">2 Two<"));
}

#[test]
fn test_rendering_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let mut assembler = assembler(&dir);
    let first = assembler
        .convert_text(PROPOSAL, "proposal.md", dir.path())
        .unwrap();
    let second = assembler
        .convert_text(PROPOSAL, "proposal.md", dir.path())
        .unwrap();
    assert_eq!(
        part_text(&first.bytes, "word/document.xml"),
        part_text(&second.bytes, "word/document.xml")
    );
}

#[test]
fn test_unterminated_front_matter_fails() {
    let dir = TempDir::new().unwrap();
    let err = assembler(&dir)
        .convert_text("---\ntitle: x\n\n# Body\n", "broken.md", dir.path())
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_missing_template() {
    let dir = TempDir::new().unwrap();
    let err = Assembler::new(dir.path().join("empty"))
        .convert_text("# T\n", "doc.md", Path::new("."))
        .unwrap_err();
    assert!(err.is_batch_fatal());
    assert!(matches!(err, Error::TemplateMissing { .. }));
}
