//! Worksheet construction.

use crate::layout::cell_score;
use crate::template::xml::escape;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const MIN_COLUMN_WIDTH: f64 = 8.0;
const MAX_COLUMN_WIDTH: f64 = 60.0;
const WIDTH_SAMPLE_ROWS: usize = 50;

/// Maximum sheet name length accepted by spreadsheet applications.
pub const MAX_SHEET_NAME: usize = 31;

/// Value of one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Inline text
    Text(String),
    /// Numeric value
    Number(f64),
    /// Formula without the leading `=`
    Formula(String),
    /// Styled but empty
    Empty,
}

/// A styled cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Value
    pub value: CellValue,
    /// Cell format index
    pub style: u32,
}

impl Cell {
    /// Text cell.
    pub fn text(text: impl Into<String>, style: u32) -> Self {
        Self {
            value: CellValue::Text(text.into()),
            style,
        }
    }

    /// Numeric cell.
    pub fn number(value: f64, style: u32) -> Self {
        Self {
            value: CellValue::Number(value),
            style,
        }
    }

    /// Formula cell.
    pub fn formula(formula: impl Into<String>, style: u32) -> Self {
        Self {
            value: CellValue::Formula(formula.into()),
            style,
        }
    }

    /// Empty cell.
    pub fn empty(style: u32) -> Self {
        Self {
            value: CellValue::Empty,
            style,
        }
    }

    fn to_xml(&self, reference: &str) -> String {
        match &self.value {
            CellValue::Text(t) => format!(
                r#"<c r="{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                reference,
                self.style,
                escape(t)
            ),
            CellValue::Number(n) => {
                format!(r#"<c r="{}" s="{}"><v>{}</v></c>"#, reference, self.style, n)
            }
            CellValue::Formula(f) => format!(
                r#"<c r="{}" s="{}"><f>{}</f></c>"#,
                reference,
                self.style,
                escape(f)
            ),
            CellValue::Empty => format!(r#"<c r="{}" s="{}"/>"#, reference, self.style),
        }
    }
}

/// Column letters for a zero-based index: 0 -> `A`, 26 -> `AA`.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// A1-style reference for a zero-based column and one-based row.
pub fn cell_ref(column: usize, row: usize) -> String {
    format!("{}{}", column_letter(column), row)
}

/// Sheet name usable in a formula: `'Effort Estimate'`.
pub fn quote_sheet(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Make a sheet name valid: strip forbidden characters, trim, and
/// truncate.
pub fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    let name: String = cleaned.chars().take(MAX_SHEET_NAME).collect();
    if name.trim().is_empty() {
        "Sheet".to_string()
    } else {
        name.trim_end().to_string()
    }
}

/// Column widths in character units from the weighted character score
/// of the header and the first rows.
pub fn column_widths(header: &[String], rows: &[Vec<String>]) -> Vec<f64> {
    (0..header.len())
        .map(|col| {
            let score = std::iter::once(&header[col])
                .chain(rows.iter().take(WIDTH_SAMPLE_ROWS).filter_map(|r| r.get(col)))
                .map(|text| cell_score(text))
                .fold(0.0, f64::max);
            (score * 1.1 + 2.0).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// A worksheet under construction.
#[derive(Debug, Clone, Default)]
pub struct SheetBuilder {
    name: String,
    rows: Vec<Vec<Cell>>,
    widths: Vec<f64>,
    freeze_header: bool,
    filter_columns: Option<usize>,
}

impl SheetBuilder {
    /// Create an empty sheet.
    pub fn new(name: &str) -> Self {
        Self {
            name: sheet_name(name),
            ..Default::default()
        }
    }

    /// Sheet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the sheet.
    pub fn set_name(&mut self, name: &str) {
        self.name = sheet_name(name);
    }

    /// Append a row; returns its one-based row number.
    pub fn push_row(&mut self, cells: Vec<Cell>) -> usize {
        self.rows.push(cells);
        self.rows.len()
    }

    /// Rows so far.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Set column widths (character units).
    pub fn set_column_widths(&mut self, widths: Vec<f64>) {
        self.widths = widths;
    }

    /// Keep the first row visible while scrolling.
    pub fn freeze_header(&mut self) {
        self.freeze_header = true;
    }

    /// Put an auto filter over the first `columns` columns of all rows.
    pub fn auto_filter(&mut self, columns: usize) {
        self.filter_columns = Some(columns);
    }

    /// Worksheet part XML.
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{}" xmlns:r="{}">"#,
            NS_MAIN, NS_R
        );

        if self.freeze_header {
            xml.push_str(concat!(
                r#"<sheetViews><sheetView workbookViewId="0">"#,
                r#"<pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/>"#,
                r#"<selection pane="bottomLeft" activeCell="A2" sqref="A2"/>"#,
                r#"</sheetView></sheetViews>"#
            ));
        }
        xml.push_str(r#"<sheetFormatPr defaultRowHeight="15"/>"#);

        if !self.widths.is_empty() {
            xml.push_str("<cols>");
            for (i, w) in self.widths.iter().enumerate() {
                xml.push_str(&format!(
                    r#"<col min="{n}" max="{n}" width="{w:.2}" customWidth="1"/>"#,
                    n = i + 1,
                    w = w
                ));
            }
            xml.push_str("</cols>");
        }

        xml.push_str("<sheetData>");
        for (r, row) in self.rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, cell) in row.iter().enumerate() {
                xml.push_str(&cell.to_xml(&cell_ref(c, r + 1)));
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");

        if let Some(columns) = self.filter_columns.filter(|&c| c > 0 && !self.rows.is_empty()) {
            xml.push_str(&format!(
                r#"<autoFilter ref="A1:{}"/>"#,
                cell_ref(columns - 1, self.rows.len())
            ));
        }

        xml.push_str("</worksheet>");
        xml
    }
}
