//! In-memory OOXML package.
//!
//! A package is the zip container behind every `.docx`, `.pptx` and
//! `.xlsx` file. It is loaded once per output file from the cached
//! template bytes, patched in memory, and written out in one pass.

use super::xml;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Content types part name.
pub const CONTENT_TYPES: &str = "[Content_Types].xml";

/// Relationship type for images.
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Relationship type for slides.
pub const REL_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

/// Relationship type for slide layouts.
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

/// Relationship type for worksheets.
pub const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

const EMPTY_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

/// One relationship entry of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship id (`rId3`)
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target as written (relative to the source part's folder)
    pub target: String,
}

/// A zip package held in memory.
#[derive(Debug, Clone, Default)]
pub struct Package {
    names: Vec<String>,
    parts: HashMap<String, Vec<u8>>,
}

impl Package {
    /// Read a package from zip bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut package = Package::default();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            package.set_part(name, data);
        }

        if !package.has_part(CONTENT_TYPES) {
            return Err(Error::Template(format!("package has no {}", CONTENT_TYPES)));
        }
        Ok(package)
    }

    /// Check whether a part exists.
    pub fn has_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Raw bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// Part content as text; a missing part is a template error.
    pub fn part_text(&self, name: &str) -> Result<String> {
        let data = self
            .part(name)
            .ok_or_else(|| Error::Template(format!("missing part {}", name)))?;
        let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
        Ok(String::from_utf8_lossy(data).into_owned())
    }

    /// Insert or replace a part. New parts keep insertion order.
    pub fn set_part(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        if !self.parts.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.parts.insert(name, data.into());
    }

    /// Part names in package order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Register a default content type for a file extension.
    pub fn add_default_content_type(&mut self, extension: &str, content_type: &str) -> Result<()> {
        let mut types = self.part_text(CONTENT_TYPES)?;
        let needle = format!("Extension=\"{}\"", extension);
        if types.contains(&needle) {
            return Ok(());
        }
        let entry = format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            xml::escape(extension),
            xml::escape(content_type)
        );
        if !xml::insert_before_last(&mut types, "</Types>", &entry) {
            return Err(Error::Template("content types part has no </Types>".into()));
        }
        self.set_part(CONTENT_TYPES, types);
        Ok(())
    }

    /// Register an override content type for a part.
    pub fn add_override(&mut self, part_name: &str, content_type: &str) -> Result<()> {
        let mut types = self.part_text(CONTENT_TYPES)?;
        let part_name = format!("/{}", part_name.trim_start_matches('/'));
        if types.contains(&format!("PartName=\"{}\"", part_name)) {
            return Ok(());
        }
        let entry = format!(
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            xml::escape(&part_name),
            xml::escape(content_type)
        );
        if !xml::insert_before_last(&mut types, "</Types>", &entry) {
            return Err(Error::Template("content types part has no </Types>".into()));
        }
        self.set_part(CONTENT_TYPES, types);
        Ok(())
    }

    /// Relationships of a part (empty if it has no rels part).
    pub fn relationships(&self, source_part: &str) -> Result<Vec<Relationship>> {
        let rels_name = rels_path(source_part);
        if !self.has_part(&rels_name) {
            return Ok(Vec::new());
        }
        let text = self.part_text(&rels_name)?;
        Ok(xml::elements(&text, "Relationship")?
            .into_iter()
            .map(|mut attrs| Relationship {
                id: attrs.remove("Id").unwrap_or_default(),
                rel_type: attrs.remove("Type").unwrap_or_default(),
                target: attrs.remove("Target").unwrap_or_default(),
            })
            .collect())
    }

    /// Add a relationship from `source_part` and return its new id.
    pub fn add_relationship(
        &mut self,
        source_part: &str,
        rel_type: &str,
        target: &str,
    ) -> Result<String> {
        let rels_name = rels_path(source_part);
        let next = self
            .relationships(source_part)?
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{}", next);

        let mut rels = if self.has_part(&rels_name) {
            self.part_text(&rels_name)?
        } else {
            EMPTY_RELS.to_string()
        };
        let entry = format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id,
            xml::escape(rel_type),
            xml::escape(target)
        );
        if !xml::insert_before_last(&mut rels, "</Relationships>", &entry) {
            return Err(Error::Template(format!("{} is malformed", rels_name)));
        }
        self.set_part(rels_name, rels);
        Ok(id)
    }

    /// Resolve a relationship target of `source_part` to a part name.
    pub fn resolve_target(source_part: &str, target: &str) -> String {
        if let Some(absolute) = target.strip_prefix('/') {
            return absolute.to_string();
        }
        let mut segments: Vec<&str> = source_part.split('/').collect();
        segments.pop();
        for segment in target.split('/') {
            match segment {
                ".." => {
                    segments.pop();
                }
                "." | "" => {}
                s => segments.push(s),
            }
        }
        segments.join("/")
    }

    /// First unused part name of the form `{prefix}{n}.{extension}`.
    pub fn next_part_name(&self, prefix: &str, extension: &str) -> String {
        (1..)
            .map(|n| format!("{}{}.{}", prefix, n, extension))
            .find(|name| !self.has_part(name))
            .unwrap_or_else(|| format!("{}.{}", prefix, extension))
    }

    /// Serialize the package to zip bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // Content types first, then everything else in package order.
        let ordered = std::iter::once(CONTENT_TYPES)
            .chain(self.part_names().filter(|n| *n != CONTENT_TYPES));
        for name in ordered {
            let Some(data) = self.part(name) else {
                continue;
            };
            zip.start_file(name, options)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    /// Serialize and write the package to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Rels part name for a part: `word/document.xml` -> `word/_rels/document.xml.rels`.
pub fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}
