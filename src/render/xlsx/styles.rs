//! Named cell styles of a workbook template.
//!
//! Branded workbooks carry named cell styles (`Header`, `Row`,
//! `Row Alt`, ...). A named style points at a `cellStyleXfs` entry; the
//! index cells reference is the first `cellXfs` entry built on it.

use super::currency::CURRENCY_FORMAT;
use crate::error::{Error, Result};
use crate::template::xml::{attributes, escape, insert_before_last, local_name};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// First number format id available to custom formats.
const FIRST_CUSTOM_FORMAT: u32 = 164;

#[derive(Debug, Clone, Default)]
struct CellXf {
    xf_id: u32,
    font_id: u32,
    fill_id: u32,
    border_id: u32,
}

/// Parsed and editable `xl/styles.xml`.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    xml: String,
    cell_xfs: Vec<CellXf>,
    named: HashMap<String, u32>,
    formats: HashMap<String, u32>,
}

impl StyleSheet {
    /// Parse the styles part.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut cell_xfs = Vec::new();
        let mut style_refs: Vec<(String, u32)> = Vec::new();
        let mut formats = HashMap::new();
        let mut in_cell_xfs = false;

        loop {
            let event = reader.read_event()?;
            let (e, is_start) = match &event {
                Event::Start(e) => (e, true),
                Event::Empty(e) => (e, false),
                Event::End(e) => {
                    if local_name(e.name().as_ref()) == b"cellXfs" {
                        in_cell_xfs = false;
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let qname = e.name();
            match local_name(qname.as_ref()) {
                b"cellXfs" if is_start => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    let attrs = attributes(e);
                    let num = |key: &str| attrs.get(key).and_then(|v| v.parse().ok()).unwrap_or(0);
                    cell_xfs.push(CellXf {
                        xf_id: num("xfId"),
                        font_id: num("fontId"),
                        fill_id: num("fillId"),
                        border_id: num("borderId"),
                    });
                }
                b"cellStyle" => {
                    let mut attrs = attributes(e);
                    if let (Some(name), Some(xf_id)) = (
                        attrs.remove("name"),
                        attrs.get("xfId").and_then(|v| v.parse().ok()),
                    ) {
                        style_refs.push((name, xf_id));
                    }
                }
                b"numFmt" => {
                    let mut attrs = attributes(e);
                    if let (Some(code), Some(id)) = (
                        attrs.remove("formatCode"),
                        attrs.get("numFmtId").and_then(|v| v.parse().ok()),
                    ) {
                        formats.insert(code, id);
                    }
                }
                _ => {}
            }
        }

        let named = style_refs
            .into_iter()
            .filter_map(|(name, xf_id)| {
                cell_xfs
                    .iter()
                    .position(|xf| xf.xf_id == xf_id)
                    .map(|index| (normalize(&name), index as u32))
            })
            .collect();

        Ok(Self {
            xml: xml.to_string(),
            cell_xfs,
            named,
            formats,
        })
    }

    /// Cell format index for a named style.
    pub fn named(&self, name: &str) -> Option<u32> {
        self.named.get(&normalize(name)).copied()
    }

    /// Cell format index for a named style, falling back to the default
    /// format with a warning.
    pub fn named_or_default(&self, name: &str) -> u32 {
        self.named(name).unwrap_or_else(|| {
            log::warn!("Workbook template has no '{}' cell style, using default", name);
            0
        })
    }

    /// Number of cell formats.
    pub fn len(&self) -> usize {
        self.cell_xfs.len()
    }

    /// Check if the style sheet defines no cell formats.
    pub fn is_empty(&self) -> bool {
        self.cell_xfs.is_empty()
    }

    /// Add a cell format that looks like `base` but shows currency.
    pub fn add_currency_format(&mut self, base: u32) -> Result<u32> {
        let fmt_id = self.ensure_number_format(CURRENCY_FORMAT)?;
        let base_xf = self.cell_xfs.get(base as usize).cloned().unwrap_or_default();
        let entry = format!(
            r#"<xf numFmtId="{}" fontId="{}" fillId="{}" borderId="{}" xfId="{}" applyNumberFormat="1"/>"#,
            fmt_id, base_xf.font_id, base_xf.fill_id, base_xf.border_id, base_xf.xf_id
        );
        if !insert_before_last(&mut self.xml, "</cellXfs>", &entry) {
            return Err(Error::Template("styles part has no cellXfs".into()));
        }
        self.cell_xfs.push(base_xf);
        self.xml = set_count(&self.xml, "cellXfs", self.cell_xfs.len());
        Ok(self.cell_xfs.len() as u32 - 1)
    }

    fn ensure_number_format(&mut self, code: &str) -> Result<u32> {
        if let Some(id) = self.formats.get(code) {
            return Ok(*id);
        }
        let id = self
            .formats
            .values()
            .copied()
            .max()
            .map_or(FIRST_CUSTOM_FORMAT, |m| (m + 1).max(FIRST_CUSTOM_FORMAT));
        let entry = format!(r#"<numFmt numFmtId="{}" formatCode="{}"/>"#, id, escape(code));

        if !insert_before_last(&mut self.xml, "</numFmts>", &entry) {
            let open_end = self
                .xml
                .find("<styleSheet")
                .and_then(|start| self.xml[start..].find('>').map(|i| start + i + 1))
                .ok_or_else(|| Error::Template("styles part has no styleSheet".into()))?;
            self.xml
                .insert_str(open_end, &format!(r#"<numFmts count="0">{}</numFmts>"#, entry));
        }
        self.formats.insert(code.to_string(), id);
        self.xml = set_count(&self.xml, "numFmts", self.formats.len());
        Ok(id)
    }

    /// Serialized styles part.
    pub fn to_xml(&self) -> &str {
        &self.xml
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn set_count(xml: &str, element: &str, count: usize) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"<(numFmts|cellXfs)( [^>]*?)?count="\d+""#).expect("count regex is valid")
    });
    re.replace_all(xml, |caps: &regex::Captures<'_>| {
        if &caps[1] == element {
            format!(
                r#"<{}{}count="{}""#,
                element,
                caps.get(2).map_or(" ", |m| m.as_str()),
                count
            )
        } else {
            caps[0].to_string()
        }
    })
    .into_owned()
}

/// Cell format indices used by the generic sheet renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellStyles {
    /// Header row
    pub header: u32,
    /// Odd data rows
    pub row: u32,
    /// Even data rows
    pub row_alt: u32,
    /// Currency cells on odd rows
    pub currency: u32,
    /// Currency cells on even rows
    pub currency_alt: u32,
}

impl CellStyles {
    /// Resolve the named styles, adding currency formats the template
    /// lacks.
    pub fn resolve(sheet: &mut StyleSheet) -> Result<Self> {
        let header = sheet.named_or_default("Header");
        let row = sheet.named_or_default("Row");
        let row_alt = sheet.named("Row Alt").unwrap_or(row);
        let currency = match sheet.named("Currency") {
            Some(s) => s,
            None => sheet.add_currency_format(row)?,
        };
        let currency_alt = match sheet.named("Currency Alt") {
            Some(s) => s,
            None if row_alt == row => currency,
            None => sheet.add_currency_format(row_alt)?,
        };
        Ok(Self {
            header,
            row,
            row_alt,
            currency,
            currency_alt,
        })
    }

    /// Style for a data cell. `row` is zero-based over data rows.
    pub fn data(&self, row: usize, currency: bool) -> u32 {
        match (row % 2 == 1, currency) {
            (false, false) => self.row,
            (true, false) => self.row_alt,
            (false, true) => self.currency,
            (true, true) => self.currency_alt,
        }
    }
}
