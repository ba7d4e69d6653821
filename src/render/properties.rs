//! Core document properties (`docProps/core.xml`).

use crate::error::Result;
use crate::template::xml::escape;
use crate::template::Package;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Part holding the core properties.
pub const CORE_PROPERTIES: &str = "docProps/core.xml";

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<dc:title(?:\s[^>]*)?(?:/>|>.*?</dc:title>)").expect("title regex is valid")
    })
}

fn modified_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<dcterms:modified(?:\s[^>]*)?(?:/>|>.*?</dcterms:modified>)")
            .expect("modified regex is valid")
    })
}

/// Set the title and modification time in the package's core
/// properties. Packages without the part are left alone.
pub fn stamp_core_properties(
    package: &mut Package,
    title: Option<&str>,
    modified: DateTime<Utc>,
) -> Result<()> {
    if !package.has_part(CORE_PROPERTIES) {
        log::debug!("Template has no {}, skipping properties", CORE_PROPERTIES);
        return Ok(());
    }
    let xml = package.part_text(CORE_PROPERTIES)?;
    let xml = set_core_properties(&xml, title, modified);
    package.set_part(CORE_PROPERTIES, xml);
    Ok(())
}

fn set_core_properties(xml: &str, title: Option<&str>, modified: DateTime<Utc>) -> String {
    let mut xml = xml.to_string();
    if let Some(title) = title {
        let element = format!("<dc:title>{}</dc:title>", escape(title));
        xml = replace_or_insert(&xml, title_re(), &element);
    }
    let element = format!(
        r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{}</dcterms:modified>"#,
        modified.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    replace_or_insert(&xml, modified_re(), &element)
}

fn replace_or_insert(xml: &str, re: &Regex, element: &str) -> String {
    if re.is_match(xml) {
        return re.replace(xml, regex::NoExpand(element)).into_owned();
    }
    match xml.rfind("</cp:coreProperties>") {
        Some(pos) => format!("{}{}{}", &xml[..pos], element, &xml[pos..]),
        None => xml.to_string(),
    }
}
