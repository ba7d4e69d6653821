//! Workbook renderer.
//!
//! Tabular sources become worksheets in the branded workbook template.
//! Sources whose file name matches a [`special`] layout get that layout's
//! sheets; everything else gets one generic sheet per source section,
//! with currency columns converted to numbers and formatted as money.

pub mod currency;
pub mod sheet;
pub mod special;
pub mod styles;

pub use currency::{format_currency, is_currency_column, parse_currency, CURRENCY_FORMAT};
pub use sheet::{Cell, CellValue, SheetBuilder};
pub use special::{special_layout, SpecialLayout};
pub use styles::{CellStyles, StyleSheet};

use super::{stamp_core_properties, RenderContext, RenderOptions, RenderOutput, RenderReport, RenderState};
use crate::convert::OutputFormat;
use crate::error::{Error, Result};
use crate::model::{TabularSection, TabularSource};
use crate::template::package::REL_WORKSHEET;
use crate::template::xml::{elements, escape, insert_before_last};
use crate::template::{Package, Template};
use chrono::Utc;
use currency::parse_number;
use std::path::PathBuf;

const WORKBOOK: &str = "xl/workbook.xml";
const STYLES: &str = "xl/styles.xml";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// Generic sheet for one source section: styled header, alternating
/// rows, currency and numeric conversion, widths, frozen header and auto
/// filter.
pub fn generic_sheet(name: &str, section: &TabularSection, styles: &CellStyles) -> SheetBuilder {
    let mut sheet = SheetBuilder::new(name);
    let money: Vec<bool> = (0..section.width())
        .map(|c| is_currency_column(&section.header[c], section.column(c)))
        .collect();

    sheet.push_row(
        section
            .header
            .iter()
            .map(|h| Cell::text(h.clone(), styles.header))
            .collect(),
    );

    for (i, row) in section.rows.iter().enumerate() {
        let cells = row
            .iter()
            .enumerate()
            .map(|(c, text)| {
                let is_money = money.get(c).copied().unwrap_or(false);
                let style = styles.data(i, is_money);
                if text.trim().is_empty() {
                    Cell::empty(style)
                } else if is_money {
                    match parse_currency(text) {
                        Some(value) => Cell::number(value, style),
                        None => Cell::text(text.clone(), styles.data(i, false)),
                    }
                } else {
                    match parse_number(text) {
                        Some(value) => Cell::number(value, style),
                        None => Cell::text(text.clone(), style),
                    }
                }
            })
            .collect();
        sheet.push_row(cells);
    }

    sheet.set_column_widths(sheet::column_widths(&section.header, &section.rows));
    sheet.freeze_header();
    sheet.auto_filter(section.width());
    sheet
}

/// Sheets for a source: the special layout when its file name calls for
/// one, otherwise one generic sheet per section. A special layout that
/// cannot be built is reported and the generic sheets are used instead.
pub fn build_sheets(
    source: &TabularSource,
    styles: &CellStyles,
    report: &mut RenderReport,
) -> Vec<SheetBuilder> {
    if let Some(layout) = special_layout(&source.source) {
        log::debug!("Using {} layout for {}", layout.name(), source.source);
        match layout.build(source, styles) {
            Ok(sheets) => return sheets,
            Err(e) => report.record_error(layout.name(), e),
        }
    }

    source
        .sections
        .iter()
        .enumerate()
        .map(|(i, section)| {
            let name = match &section.marker {
                Some(marker) => marker.clone(),
                None if i == 0 => default_sheet_name(&source.source),
                None => format!("Sheet {}", i + 1),
            };
            generic_sheet(&name, section, styles)
        })
        .collect()
}

fn default_sheet_name(source: &str) -> String {
    std::path::Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().replace(['-', '_'], " "))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Data".to_string())
}

/// Render a tabular source into a workbook template.
pub fn render_xlsx(
    source: &TabularSource,
    template: &Template,
    options: &RenderOptions,
) -> Result<RenderOutput> {
    let mut renderer = XlsxRenderer::new();
    let ctx = renderer.load_template(template, options)?;
    let styles = renderer.cell_styles()?;
    let sheets = build_sheets(source, &styles, &mut renderer.report);
    if sheets.is_empty() {
        log::warn!("{} has no rows, writing the template unchanged", source.source);
    }
    for sheet in &sheets {
        renderer.add_sheet(&ctx, sheet)?;
    }
    renderer.save(&ctx)
}

/// Incremental workbook renderer.
#[derive(Debug, Default)]
pub struct XlsxRenderer {
    state: RenderState,
    package: Option<Package>,
    styles: Option<StyleSheet>,
    cell_styles: Option<CellStyles>,
    reusable_sheet: Option<(String, String)>,
    names: Vec<String>,
    report: RenderReport,
}

impl XlsxRenderer {
    /// Create an idle renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Open a fresh package and resolve the template's cell styles.
    pub fn load_template(&mut self, template: &Template, options: &RenderOptions) -> Result<RenderContext> {
        if template.format() != OutputFormat::Xlsx {
            return Err(Error::Template(format!(
                "{} is not a workbook template",
                template.path().display()
            )));
        }
        let package = template.open()?;
        let workbook = package.part_text(WORKBOOK)?;
        let mut styles = StyleSheet::parse(&package.part_text(STYLES)?)?;
        self.cell_styles = Some(CellStyles::resolve(&mut styles)?);
        self.styles = Some(styles);

        // The template's first sheet is reused for the first generated one.
        self.reusable_sheet = elements(&workbook, "sheet")?
            .into_iter()
            .next()
            .and_then(|mut attrs| {
                let name = attrs.remove("name")?;
                let rid = attrs.remove("id")?;
                let rel = package
                    .relationships(WORKBOOK)
                    .ok()?
                    .into_iter()
                    .find(|r| r.id == rid)?;
                Some((Package::resolve_target(WORKBOOK, &rel.target), name))
            });

        let ctx = RenderContext::new(&package, OutputFormat::Xlsx, PathBuf::new(), options.clone())?;
        self.package = Some(package);
        self.state = RenderState::TemplateLoaded;
        Ok(ctx)
    }

    /// Cell styles resolved from the template.
    pub fn cell_styles(&self) -> Result<CellStyles> {
        self.cell_styles
            .ok_or_else(|| Error::Other("no template loaded".into()))
    }

    /// Add one worksheet.
    pub fn add_sheet(&mut self, _ctx: &RenderContext, sheet: &SheetBuilder) -> Result<()> {
        let package = self
            .package
            .as_mut()
            .ok_or_else(|| Error::Other("no template loaded".into()))?;
        let name = unique_name(sheet.name(), &self.names);
        let mut workbook = package.part_text(WORKBOOK)?;

        match self.reusable_sheet.take() {
            Some((part, old_name)) => {
                package.set_part(part, sheet.to_xml());
                let old = format!(r#"name="{}""#, escape(&old_name));
                let new = format!(r#"name="{}""#, escape(&name));
                if let Some(pos) = workbook.find("<sheets>").and_then(|s| {
                    workbook[s..].find(&old).map(|i| s + i)
                }) {
                    workbook.replace_range(pos..pos + old.len(), &new);
                }
            }
            None => {
                let part = package.next_part_name("xl/worksheets/sheet", "xml");
                package.set_part(part.clone(), sheet.to_xml());
                package.add_override(&part, WORKSHEET_CONTENT_TYPE)?;
                let target = part.trim_start_matches("xl/");
                let rid = package.add_relationship(WORKBOOK, REL_WORKSHEET, target)?;
                let sheet_id = elements(&workbook, "sheet")?
                    .iter()
                    .filter_map(|a| a.get("sheetId").and_then(|v| v.parse::<u32>().ok()))
                    .max()
                    .unwrap_or(0)
                    + 1;
                let entry = format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="{}"/>"#,
                    escape(&name),
                    sheet_id,
                    rid
                );
                if !insert_before_last(&mut workbook, "</sheets>", &entry) {
                    return Err(Error::Template(format!("{} has no sheet list", WORKBOOK)));
                }
            }
        }

        package.set_part(WORKBOOK, workbook);
        self.names.push(name);
        self.report.record_success();
        self.state = RenderState::SectionAppended;
        Ok(())
    }

    /// Write the styles, request a full recalculation on open, and
    /// serialize the package.
    pub fn save(mut self, _ctx: &RenderContext) -> Result<RenderOutput> {
        let mut package = self
            .package
            .take()
            .ok_or_else(|| Error::Other("no template loaded".into()))?;
        if let Some(styles) = &self.styles {
            package.set_part(STYLES, styles.to_xml().to_string());
        }
        let workbook = package.part_text(WORKBOOK)?;
        package.set_part(WORKBOOK, full_calc_on_load(workbook));
        stamp_core_properties(&mut package, None, Utc::now())?;

        let bytes = package.to_bytes()?;
        self.state = RenderState::Saved;
        log::debug!("Rendered {} sheets, {} errors", self.names.len(), self.report.errors.len());
        Ok(RenderOutput {
            bytes,
            report: self.report,
        })
    }
}

fn unique_name(name: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        return name.to_string();
    }
    (2..)
        .map(|n| {
            let suffix = format!(" ({})", n);
            let base: String = name
                .chars()
                .take(sheet::MAX_SHEET_NAME - suffix.len())
                .collect();
            format!("{}{}", base, suffix)
        })
        .find(|candidate| !taken.iter().any(|t| t.eq_ignore_ascii_case(candidate)))
        .unwrap_or_else(|| name.to_string())
}

/// Formulas are written without cached values; ask the application to
/// compute them when the workbook opens.
fn full_calc_on_load(mut workbook: String) -> String {
    if workbook.contains("fullCalcOnLoad") {
        return workbook;
    }
    if let Some(pos) = workbook.find("<calcPr") {
        workbook.insert_str(pos + "<calcPr".len(), r#" fullCalcOnLoad="1""#);
        return workbook;
    }
    let calc = r#"<calcPr fullCalcOnLoad="1"/>"#;
    let anchor = ["</definedNames>", "</sheets>"]
        .iter()
        .find_map(|a| workbook.find(a).map(|p| p + a.len()));
    if let Some(pos) = anchor {
        workbook.insert_str(pos, calc);
    }
    workbook
}
