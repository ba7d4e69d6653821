//! Hand-specified multi-sheet workbook layouts.
//!
//! A few well-known sources get a dedicated layout instead of the
//! generic single-sheet table. They are chosen by file name through
//! [`SPECIAL_LAYOUTS`], before the generic renderer is considered.

use super::currency::{is_currency_column, parse_number};
use super::sheet::{cell_ref, column_widths, quote_sheet, sheet_name, Cell, SheetBuilder};
use super::styles::CellStyles;
use super::{generic_sheet, unique_name};
use crate::error::{Error, Result};
use crate::model::{TabularSection, TabularSource};
use std::path::Path;

/// Specialised workbook layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialLayout {
    /// Effort per task with totals and a per-phase summary
    EffortEstimate,
    /// One sheet per question group plus a completion overview
    DiscoveryQuestionnaire,
    /// Cost lines with a per-category summary
    CostBreakdown,
}

/// File-name patterns mapped to their layout, checked in order.
pub const SPECIAL_LAYOUTS: &[(&str, SpecialLayout)] = &[
    ("effort-estimate", SpecialLayout::EffortEstimate),
    ("discovery-questionnaire", SpecialLayout::DiscoveryQuestionnaire),
    ("cost-breakdown", SpecialLayout::CostBreakdown),
];

/// Layout for a source, matched on its normalised file stem.
pub fn special_layout(source_name: &str) -> Option<SpecialLayout> {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .replace(['_', ' '], "-");
    SPECIAL_LAYOUTS
        .iter()
        .find(|(pattern, _)| stem.contains(pattern))
        .map(|(_, layout)| *layout)
}

impl SpecialLayout {
    /// Build the sheets for this layout.
    pub fn build(&self, source: &TabularSource, styles: &CellStyles) -> Result<Vec<SheetBuilder>> {
        if source.sections.is_empty() {
            return Err(Error::render_unit(self.name(), "source has no rows"));
        }
        match self {
            SpecialLayout::EffortEstimate => effort_estimate(source, styles),
            SpecialLayout::DiscoveryQuestionnaire => Ok(discovery_questionnaire(source, styles)),
            SpecialLayout::CostBreakdown => cost_breakdown(source, styles),
        }
    }

    /// Display name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            SpecialLayout::EffortEstimate => "effort estimate",
            SpecialLayout::DiscoveryQuestionnaire => "discovery questionnaire",
            SpecialLayout::CostBreakdown => "cost breakdown",
        }
    }
}

const EFFORT_KEYWORDS: &[&str] = &["hour", "day", "effort", "estimate", "week"];
const GROUP_KEYWORDS: &[&str] = &["phase", "category", "role", "workstream", "type"];

/// Sheet names handed out so far. Formulas refer to sheets by name, so
/// every name is final before a formula is built from it.
#[derive(Debug, Default)]
struct SheetNames(Vec<String>);

impl SheetNames {
    fn claim(&mut self, raw: &str) -> String {
        let name = unique_name(&sheet_name(raw), &self.0);
        self.0.push(name.clone());
        name
    }
}

/// Data rows occupy rows 2..=last of a sheet with a header.
fn data_range(column: usize, rows: usize) -> String {
    format!("{}:{}", cell_ref(column, 2), cell_ref(column, rows + 1))
}

/// Detail sheet with a bold total row summing `sum_columns`; returns the
/// sheet and the row number of the totals.
fn detail_with_totals(
    name: &str,
    section: &TabularSection,
    sum_columns: &[usize],
    styles: &CellStyles,
) -> (SheetBuilder, usize) {
    let mut sheet = generic_sheet(name, section, styles);
    let n = section.rows.len();
    let total_row = (0..section.width())
        .map(|col| {
            if col == 0 {
                Cell::text("Total", styles.header)
            } else if sum_columns.contains(&col) {
                Cell::formula(format!("SUM({})", data_range(col, n)), styles.header)
            } else {
                Cell::empty(styles.header)
            }
        })
        .collect();
    let row = sheet.push_row(total_row);
    (sheet, row)
}

fn distinct_values(section: &TabularSection, column: usize) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in section.column(column) {
        let value = value.trim();
        if !value.is_empty() && !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

fn criteria(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn effort_estimate(source: &TabularSource, styles: &CellStyles) -> Result<Vec<SheetBuilder>> {
    let effort = source
        .section("EFFORT ESTIMATE")
        .or_else(|| source.sections.iter().find(|s| s.column_index(EFFORT_KEYWORDS).is_some()))
        .or_else(|| source.primary())
        .ok_or_else(|| Error::render_unit("effort estimate", "no effort section"))?;

    let effort_columns: Vec<usize> = (1..effort.width())
        .filter(|&c| {
            let header = effort.header[c].to_lowercase();
            EFFORT_KEYWORDS.iter().any(|k| header.contains(k))
                || is_currency_column(&effort.header[c], effort.column(c))
                || (!effort.rows.is_empty()
                    && effort.column(c).all(|v| v.trim().is_empty() || parse_number(v).is_some()))
        })
        .collect();
    if effort_columns.is_empty() {
        return Err(Error::render_unit("effort estimate", "no numeric effort column"));
    }

    let mut names = SheetNames::default();
    let summary_name = names.claim("Summary");
    let detail_name = names.claim("Effort Estimate");
    let (detail, total_row) = detail_with_totals(&detail_name, effort, &effort_columns, styles);
    let detail_ref = quote_sheet(detail.name());
    let n = effort.rows.len();

    let mut summary = SheetBuilder::new(&summary_name);
    let mut header = vec![Cell::text("Measure", styles.header)];
    header.extend(
        effort_columns
            .iter()
            .map(|&c| Cell::text(effort.header[c].clone(), styles.header)),
    );
    summary.push_row(header);

    if let Some(group) = effort.column_index(GROUP_KEYWORDS).filter(|&g| !effort_columns.contains(&g)) {
        for (i, value) in distinct_values(effort, group).iter().enumerate() {
            let mut row = vec![Cell::text(value.clone(), styles.data(i, false))];
            for &c in &effort_columns {
                row.push(Cell::formula(
                    format!(
                        "SUMIF({d}!{g},{v},{d}!{c})",
                        d = detail_ref,
                        g = data_range(group, n),
                        v = criteria(value),
                        c = data_range(c, n)
                    ),
                    styles.data(i, is_currency_column(&effort.header[c], effort.column(c))),
                ));
            }
            summary.push_row(row);
        }
    }

    let mut total = vec![Cell::text("Total", styles.header)];
    for &c in &effort_columns {
        total.push(Cell::formula(
            format!("{}!{}", detail_ref, cell_ref(c, total_row)),
            styles.header,
        ));
    }
    summary.push_row(total);
    summary.push_row(vec![
        Cell::text("Tasks", styles.row),
        Cell::formula(format!("COUNTA({}!{})", detail_ref, data_range(0, n)), styles.row),
    ]);
    let mut summary_widths = vec![24.0];
    summary_widths.extend(effort_columns.iter().map(|_| 16.0));
    summary.set_column_widths(summary_widths);
    summary.freeze_header();

    let mut sheets = vec![summary, detail];
    for section in source.sections.iter().filter(|s| !std::ptr::eq(*s, effort)) {
        let name = names.claim(&title_case(section.marker.as_deref().unwrap_or("Assumptions")));
        sheets.push(generic_sheet(&name, section, styles));
    }
    Ok(sheets)
}

fn discovery_questionnaire(source: &TabularSource, styles: &CellStyles) -> Vec<SheetBuilder> {
    let mut names = SheetNames::default();
    let mut overview = SheetBuilder::new(&names.claim("Overview"));
    overview.push_row(vec![
        Cell::text("Section", styles.header),
        Cell::text("Questions", styles.header),
        Cell::text("Answered", styles.header),
    ]);

    let mut sheets = Vec::new();
    for (i, section) in source.sections.iter().enumerate() {
        let mut section = section.clone();
        let response = match section.column_index(&["response", "answer"]) {
            Some(c) => c,
            None => {
                section.header.push("Response".to_string());
                for row in &mut section.rows {
                    row.push(String::new());
                }
                section.width() - 1
            }
        };
        let name = names.claim(
            &section
                .marker
                .as_deref()
                .map(title_case)
                .unwrap_or_else(|| format!("Questions {}", i + 1)),
        );
        let mut sheet = generic_sheet(&name, &section, styles);
        let mut widths = column_widths(&section.header, &section.rows);
        if let Some(w) = widths.get_mut(response) {
            *w = w.max(40.0);
        }
        sheet.set_column_widths(widths);

        let sheet_ref = quote_sheet(sheet.name());
        let n = section.rows.len();
        overview.push_row(vec![
            Cell::text(sheet.name(), styles.data(i, false)),
            Cell::formula(format!("COUNTA({}!{})", sheet_ref, data_range(0, n)), styles.data(i, false)),
            Cell::formula(
                format!("COUNTA({}!{})", sheet_ref, data_range(response, n)),
                styles.data(i, false),
            ),
        ]);
        sheets.push(sheet);
    }

    let last = overview.row_count();
    overview.push_row(vec![
        Cell::text("Total", styles.header),
        Cell::formula(format!("SUM(B2:B{})", last), styles.header),
        Cell::formula(format!("SUM(C2:C{})", last), styles.header),
    ]);
    overview.set_column_widths(vec![32.0, 12.0, 12.0]);
    overview.freeze_header();

    sheets.insert(0, overview);
    sheets
}

fn cost_breakdown(source: &TabularSource, styles: &CellStyles) -> Result<Vec<SheetBuilder>> {
    let mut names = SheetNames::default();
    let summary_name = names.claim("Summary");
    let mut details = Vec::new();
    for (i, section) in source.sections.iter().enumerate() {
        let Some(cost) = (0..section.width())
            .rev()
            .find(|&c| is_currency_column(&section.header[c], section.column(c)))
        else {
            continue;
        };
        let name = names.claim(
            &section
                .marker
                .as_deref()
                .map(title_case)
                .unwrap_or_else(|| if i == 0 { "Cost Detail".to_string() } else { format!("Costs {}", i + 1) }),
        );
        let (sheet, total_row) = detail_with_totals(&name, section, &[cost], styles);
        details.push((section, cost, sheet, total_row));
    }
    if details.is_empty() {
        return Err(Error::render_unit("cost breakdown", "no currency column"));
    }

    let mut summary = SheetBuilder::new(&summary_name);
    summary.push_row(vec![
        Cell::text("Category", styles.header),
        Cell::text("Total", styles.header),
    ]);

    let mut line = 0;
    if let [(section, cost, sheet, _)] = details.as_slice() {
        let n = section.rows.len();
        let group = section.column_index(GROUP_KEYWORDS).filter(|g| g != cost).unwrap_or(0);
        let sheet_ref = quote_sheet(sheet.name());
        for value in distinct_values(section, group) {
            summary.push_row(vec![
                Cell::text(value.clone(), styles.data(line, false)),
                Cell::formula(
                    format!(
                        "SUMIF({d}!{g},{v},{d}!{c})",
                        d = sheet_ref,
                        g = data_range(group, n),
                        v = criteria(&value),
                        c = data_range(*cost, n)
                    ),
                    styles.data(line, true),
                ),
            ]);
            line += 1;
        }
    } else {
        for (_, cost, sheet, total_row) in &details {
            summary.push_row(vec![
                Cell::text(sheet.name(), styles.data(line, false)),
                Cell::formula(
                    format!("{}!{}", quote_sheet(sheet.name()), cell_ref(*cost, *total_row)),
                    styles.data(line, true),
                ),
            ]);
            line += 1;
        }
    }

    let last = summary.row_count();
    summary.push_row(vec![
        Cell::text("Grand Total", styles.header),
        Cell::formula(
            format!("SUM({}:{})", cell_ref(1, 2), cell_ref(1, last.max(2))),
            styles.currency,
        ),
    ]);
    summary.set_column_widths(vec![32.0, 18.0]);
    summary.freeze_header();

    let mut sheets = vec![summary];
    sheets.extend(details.into_iter().map(|(_, _, sheet, _)| sheet));
    Ok(sheets)
}

/// `SCOPE ASSUMPTIONS` -> `Scope Assumptions`.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
