//! Benchmarks for mdoffice assembly performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks use synthetic proposals and a minimal document template.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mdoffice::render::render_docx;
use mdoffice::{parse_markup, OutputFormat, RenderOptions, Table, Template};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Creates a synthetic proposal with the given number of sections.
fn create_proposal(section_count: usize) -> String {
    let mut text = String::from("---\ntitle: Benchmark Proposal\nclient: Acme\n---\n\n# Benchmark Proposal\n\n");
    for i in 0..section_count {
        text.push_str(&format!("## Section {}\n\nWe deliver **phase {}** on time.\n\n", i + 1, i + 1));
        text.push_str("### Details\n\n- First point\n  - Nested point\n- Second point\n\n");
        text.push_str("| Task | Owner | Effort |\n|---|---|---|\n");
        for row in 0..5 {
            text.push_str(&format!("| Task {} with a longer description | Vendor | {} |\n", row, row * 8));
        }
        text.push_str("\nTable: Work breakdown\n\n");
    }
    text
}

/// Minimal document template: content types and a body with the marker.
fn create_template() -> Vec<u8> {
    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        ),
        (
            "word/document.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{{title}}</w:t></w:r></w:p><w:p><w:r><w:t>{{content}}</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#,
        ),
    ];
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Benchmark markup parsing at various sizes.
fn bench_markup_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("markup_parsing");

    for section_count in [1, 10, 50].iter() {
        let text = create_proposal(*section_count);

        group.bench_function(format!("{}_sections", section_count), |b| {
            b.iter(|| parse_markup(black_box(&text), "proposal.md").unwrap());
        });
    }

    group.finish();
}

/// Benchmark column width planning.
fn bench_column_widths(c: &mut Criterion) {
    let rows: Vec<Vec<String>> = (0..20)
        .map(|r| {
            (0..6)
                .map(|c| "word ".repeat((r * c) % 7 + 1).trim_end().to_string())
                .collect()
        })
        .collect();
    let table = Table::from_rows(rows, true);

    c.bench_function("column_widths_6x20", |b| {
        b.iter(|| mdoffice::layout::widths(black_box(&table), 6.5));
    });
}

/// Benchmark a full document render.
fn bench_docx_render(c: &mut Criterion) {
    let template = Template::from_bytes(OutputFormat::Docx, "bench.docx", create_template()).unwrap();
    let doc = parse_markup(&create_proposal(10), "proposal.md").unwrap();
    let options = RenderOptions::default();

    c.bench_function("docx_render_10_sections", |b| {
        b.iter(|| render_docx(black_box(&doc), &template, Path::new("."), &options).unwrap());
    });
}

criterion_group!(
    benches,
    bench_markup_parsing,
    bench_column_widths,
    bench_docx_render,
);
criterion_main!(benches);
