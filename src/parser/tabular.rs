//! Delimited tabular input.
//!
//! A tabular source is comma-separated text with a header row. Lines
//! starting with `#` split the file into named sections:
//!
//! ```text
//! # SCOPE ASSUMPTIONS
//! Assumption,Impact
//! Single region,Low
//!
//! # EFFORT ESTIMATE
//! Phase,Task,Hours,Rate
//! Discovery,Workshops,16,$175
//! ```

use crate::error::Result;
use crate::model::{TabularSection, TabularSource};
use std::path::Path;

const MARKER: char = '#';

/// Parse delimited text into a [`TabularSource`].
///
/// Text before the first marker line forms an unnamed section. Rows are
/// padded or truncated to the header width, and fully blank rows are
/// skipped.
pub fn parse_tabular(text: &str, identity: &str) -> Result<TabularSource> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut source = TabularSource::new(identity);

    let mut marker: Option<String> = None;
    let mut chunk = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix(MARKER) {
            push_section(&mut source, marker.take(), &chunk)?;
            chunk.clear();
            marker = Some(name.trim().to_string());
            continue;
        }
        chunk.push_str(line);
        chunk.push('\n');
    }
    push_section(&mut source, marker, &chunk)?;

    log::debug!(
        "Parsed {}: {} sections, {} rows",
        identity,
        source.sections.len(),
        source.row_count()
    );
    Ok(source)
}

/// Parse a tabular file from disk.
pub fn parse_tabular_file(path: impl AsRef<Path>) -> Result<TabularSource> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let identity = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_tabular(&text, &identity)
}

fn push_section(source: &mut TabularSource, marker: Option<String>, chunk: &str) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(chunk.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.iter().all(String::is_empty) {
            continue;
        }
        records.push(cells);
    }

    let mut iter = records.into_iter();
    let Some(header) = iter.next() else {
        if let Some(marker) = marker {
            log::debug!("Skipping empty tabular section '{}'", marker);
        }
        return Ok(());
    };

    let width = header.len();
    let rows = iter
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    source.sections.push(TabularSection {
        marker,
        header,
        rows,
    });
    Ok(())
}
