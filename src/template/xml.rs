//! Small helpers for reading and patching OOXML parts.
//!
//! Parts are read with `quick-xml` and patched as strings: the renderers
//! only ever insert fragments at well-known anchors, so the rest of the
//! template markup is carried through byte for byte.

use crate::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::collections::HashMap;

/// Escape text for element content or attribute values.
pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Strip the namespace prefix from a qualified name.
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Attributes of an element keyed by local name, values unescaped.
pub fn attributes(e: &BytesStart<'_>) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(local_name(attr.key.as_ref())).into_owned();
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            let value = match quick_xml::escape::unescape(&raw) {
                Ok(v) => v.into_owned(),
                Err(_) => raw,
            };
            (key, value)
        })
        .collect()
}

/// Attributes of every element whose local name is `element`, in
/// document order.
pub fn elements(xml: &str, element: &str) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut found = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if local_name(e.name().as_ref()) == element.as_bytes() => {
                found.push(attributes(&e));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}

/// Insert `fragment` immediately before the last occurrence of `anchor`.
///
/// Returns `false` when the anchor is absent.
pub fn insert_before_last(xml: &mut String, anchor: &str, fragment: &str) -> bool {
    match xml.rfind(anchor) {
        Some(pos) => {
            xml.insert_str(pos, fragment);
            true
        }
        None => false,
    }
}

/// Replace `{{key}}` placeholders with escaped values from `lookup`.
///
/// Unknown keys are left as they are. Placeholders split across runs by
/// the authoring tool are not matched.
pub fn replace_placeholders<'a, F>(xml: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        let key = rest[start + 2..start + 2 + len].trim();
        out.push_str(&rest[..start]);
        match lookup(key) {
            Some(value) if key != "content" => out.push_str(&escape(value)),
            _ => out.push_str(&rest[start..start + 2 + len + 2]),
        }
        rest = &rest[start + 2 + len + 2..];
    }
    out.push_str(rest);
    out
}
