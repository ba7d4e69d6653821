//! Word-processing renderer.
//!
//! Fills `word/document.xml` of a branded template: numbered headings,
//! paragraphs and bullets in the template's named styles, bordered
//! tables with absolute column widths, inline images, and captions
//! numbered by `SEQ` fields. A table of contents field and literal lists
//! of tables and figures are placed in front of the body.

use super::field::FieldBuilder;
use super::{stamp_core_properties, RenderContext, RenderOptions, RenderOutput, RenderReport, RenderState};
use crate::convert::OutputFormat;
use crate::error::{Error, Result};
use crate::layout::{widths_with, ColumnConstraints, EMU_PER_INCH};
use crate::model::{
    Caption, CaptionLabel, ContentBlock, Document, ImageResource, Section, Table, TextRun,
};
use crate::parser::parse_inline;
use crate::template::package::REL_IMAGE;
use crate::template::xml::{escape, insert_before_last, replace_placeholders};
use crate::template::{Package, Template};
use chrono::Utc;
use std::path::Path;

const DOCUMENT: &str = "word/document.xml";
const SETTINGS: &str = "word/settings.xml";
const CONTENT_MARKER: &str = "{{content}}";
const FIRST_DRAWING_ID: u32 = 1000;

const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Render a document into a word-processing template.
pub fn render_docx(
    doc: &Document,
    template: &Template,
    source_dir: &Path,
    options: &RenderOptions,
) -> Result<RenderOutput> {
    let mut renderer = DocxRenderer::new();
    let ctx = renderer.load_template(template, source_dir, options)?;
    renderer.append_blocks(&ctx, "preamble", &doc.preamble)?;
    for section in doc.iter_sections() {
        renderer.append_section(&ctx, section)?;
    }
    renderer.save(&ctx, doc)
}

/// Incremental word-processing renderer.
///
/// Moves through [`RenderState`]: created idle, a template is loaded,
/// sections are appended, and [`save`](Self::save) produces the output.
#[derive(Debug, Default)]
pub struct DocxRenderer {
    state: RenderState,
    package: Option<Package>,
    body: String,
    captions: Vec<Caption>,
    report: RenderReport,
    next_drawing_id: u32,
}

impl DocxRenderer {
    /// Create an idle renderer.
    pub fn new() -> Self {
        Self {
            next_drawing_id: FIRST_DRAWING_ID,
            ..Default::default()
        }
    }

    /// Current state.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Open a fresh package from `template` and build the context for it.
    pub fn load_template(
        &mut self,
        template: &Template,
        source_dir: &Path,
        options: &RenderOptions,
    ) -> Result<RenderContext> {
        if template.format() != OutputFormat::Docx {
            return Err(Error::Template(format!(
                "{} is not a word-processing template",
                template.path().display()
            )));
        }
        let package = template.open()?;
        let document = package.part_text(DOCUMENT)?;
        if !document.contains("</w:body>") {
            return Err(Error::Template(format!("{} has no body", DOCUMENT)));
        }

        let ctx = RenderContext::new(&package, OutputFormat::Docx, source_dir, options.clone())?;
        self.package = Some(package);
        self.state = RenderState::TemplateLoaded;
        Ok(ctx)
    }

    /// Append free-standing blocks (the preamble).
    pub fn append_blocks(
        &mut self,
        ctx: &RenderContext,
        unit: &str,
        blocks: &[ContentBlock],
    ) -> Result<()> {
        self.require_loaded()?;
        for block in blocks {
            self.append_block(ctx, unit, block);
        }
        Ok(())
    }

    /// Append one section: its numbered heading followed by its blocks.
    /// Child sections are appended by separate calls.
    pub fn append_section(&mut self, ctx: &RenderContext, section: &Section) -> Result<()> {
        self.require_loaded()?;
        let unit = format!("section {}", section.numbered_title());

        let level = section.level.clamp(1, 6);
        let style = style_id(ctx, &format!("Heading{}", level), &format!("heading {}", level));
        self.body.push_str(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}</w:p>"#,
            escape(&style),
            text_run(&section.numbered_title(), None)
        ));

        for block in &section.blocks {
            self.append_block(ctx, &unit, block);
        }
        self.state = RenderState::SectionAppended;
        self.report.record_success();
        Ok(())
    }

    /// Finish the document and serialize the package.
    pub fn save(mut self, ctx: &RenderContext, doc: &Document) -> Result<RenderOutput> {
        let mut package = self
            .package
            .take()
            .ok_or_else(|| Error::Other("no template loaded".into()))?;

        let mut content = String::new();
        if ctx.options.front_lists {
            content.push_str(&self.front_lists(ctx));
        }
        content.push_str(&self.body);

        let document = package.part_text(DOCUMENT)?;
        let document = replace_placeholders(&document, |key| lookup(doc, key));
        let document = place_body(document, &content)?;
        package.set_part(DOCUMENT, document);

        if ctx.options.front_lists {
            enable_field_update(&mut package)?;
        }
        stamp_core_properties(&mut package, doc.display_title(), Utc::now())?;

        let bytes = package.to_bytes()?;
        self.state = RenderState::Saved;
        log::debug!(
            "Rendered {} units, {} captions, {} errors",
            self.report.units,
            self.captions.len(),
            self.report.errors.len()
        );
        Ok(RenderOutput {
            bytes,
            report: self.report,
        })
    }

    fn require_loaded(&self) -> Result<()> {
        match self.state {
            RenderState::TemplateLoaded | RenderState::SectionAppended => Ok(()),
            state => Err(Error::Other(format!("cannot append content while {:?}", state))),
        }
    }

    fn append_block(&mut self, ctx: &RenderContext, unit: &str, block: &ContentBlock) {
        let rendered = match block {
            ContentBlock::Paragraph { runs } => Ok(paragraph(None, runs)),
            ContentBlock::Bullet { runs, level } => {
                let n = (*level as usize + 1).min(3);
                let (id, name) = if n == 1 {
                    ("ListBullet".to_string(), "List Bullet".to_string())
                } else {
                    (format!("ListBullet{}", n), format!("List Bullet {}", n))
                };
                Ok(paragraph(Some(&style_id(ctx, &id, &name)), runs))
            }
            ContentBlock::Table(table) => table_xml(ctx, table)
                .map_err(|e| (format!("{}: table", unit), e)),
            ContentBlock::Image { path, alt } => self
                .image_xml(ctx, path, alt)
                .map_err(|e| (format!("{}: image {}", unit, path), e)),
            ContentBlock::Caption(caption) => {
                self.captions.push(caption.clone());
                Ok(caption_xml(ctx, caption))
            }
        };

        match rendered {
            Ok(xml) => self.body.push_str(&xml),
            Err((unit, e)) => self.report.record_error(unit, e),
        }
    }

    fn image_xml(&mut self, ctx: &RenderContext, path: &str, alt: &str) -> Result<String> {
        let image = ImageResource::load(&ctx.resolve_path(path))?;
        let package = self
            .package
            .as_mut()
            .ok_or_else(|| Error::Other("no template loaded".into()))?;

        let part = package.next_part_name("word/media/image", image.extension());
        let target = part.trim_start_matches("word/").to_string();
        package.add_default_content_type(image.extension(), image.mime_type)?;
        let rid = package.add_relationship(DOCUMENT, REL_IMAGE, &target)?;
        package.set_part(part, image.data.clone());

        let cx = (ctx.options.image_width * EMU_PER_INCH).round() as i64;
        let cy = (cx as f64 / image.aspect_ratio()).round() as i64;
        let id = self.next_drawing_id;
        self.next_drawing_id += 1;
        let name = format!("Picture {}", id);

        Ok(format!(
            concat!(
                r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r>"#,
                r#"<w:drawing xmlns:wp="{ns_wp}" xmlns:a="{ns_a}" xmlns:pic="{ns_pic}" xmlns:r="{ns_r}">"#,
                r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
                r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
                r#"<wp:docPr id="{id}" name="{name}" descr="{alt}"/>"#,
                r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
                r#"<a:graphic><a:graphicData uri="{ns_pic}"><pic:pic>"#,
                r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
                r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
                r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
            ),
            ns_wp = NS_WP,
            ns_a = NS_A,
            ns_pic = NS_PIC,
            ns_r = NS_R,
            cx = cx,
            cy = cy,
            id = id,
            name = name,
            alt = escape(alt),
            rid = rid,
        ))
    }

    fn front_lists(&self, ctx: &RenderContext) -> String {
        let mut xml = String::new();
        let heading = style_id(ctx, "TOCHeading", "TOC Heading");
        xml.push_str(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}</w:p>"#,
            escape(&heading),
            text_run("Table of Contents", None)
        ));
        let toc = FieldBuilder::toc_field(
            ctx.options.toc_levels.clone(),
            "Right-click to update the table of contents.",
        );
        xml.push_str(&format!("<w:p>{}</w:p>", toc.to_runs(None)));

        for (label, title) in [
            (CaptionLabel::Table, "List of Tables"),
            (CaptionLabel::Figure, "List of Figures"),
        ] {
            let entries: Vec<&Caption> = self.captions.iter().filter(|c| c.label == label).collect();
            if entries.is_empty() {
                continue;
            }
            xml.push_str(&format!(
                r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}</w:p>"#,
                escape(&heading),
                text_run(title, None)
            ));
            let entry_style = style_id(ctx, "TableofFigures", "table of figures");
            for caption in entries {
                xml.push_str(&format!(
                    r#"<w:p><w:pPr><w:pStyle w:val="{}"/><w:tabs><w:tab w:val="right" w:leader="dot" w:pos="{}"/></w:tabs></w:pPr>{}<w:r><w:tab/></w:r>{}</w:p>"#,
                    escape(&entry_style),
                    (ctx.options.page_width * 1440.0).round() as i64,
                    text_run(&caption.to_string(), None),
                    text_run(&ctx.options.page_placeholder, None)
                ));
            }
        }

        xml.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        xml
    }
}

fn lookup<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    match key {
        "title" => doc.display_title(),
        _ => doc.metadata.get(key),
    }
}

/// Resolve a style by id, then by display name; fall back to the id.
fn style_id(ctx: &RenderContext, id: &str, name: &str) -> String {
    match ctx.styles.resolve(id).or_else(|| ctx.styles.resolve(name)) {
        Some(resolved) => resolved.to_string(),
        None => {
            if !ctx.styles.is_empty() {
                log::debug!("Template has no '{}' style", name);
            }
            id.to_string()
        }
    }
}

fn text_run(text: &str, rpr: Option<&str>) -> String {
    format!(
        r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        rpr.map(|p| format!("<w:rPr>{}</w:rPr>", p)).unwrap_or_default(),
        escape(text)
    )
}

fn styled_runs(runs: &[TextRun], base_rpr: &str) -> String {
    runs.iter()
        .map(|run| {
            let mut rpr = String::from(base_rpr);
            if run.bold && !rpr.contains("<w:b/>") {
                rpr.push_str("<w:b/>");
            }
            if run.italic {
                rpr.push_str("<w:i/>");
            }
            text_run(&run.text, (!rpr.is_empty()).then_some(rpr.as_str()))
        })
        .collect()
}

fn paragraph(style: Option<&str>, runs: &[TextRun]) -> String {
    let ppr = style
        .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, escape(s)))
        .unwrap_or_default();
    format!("<w:p>{}{}</w:p>", ppr, styled_runs(runs, ""))
}

fn caption_xml(ctx: &RenderContext, caption: &Caption) -> String {
    let style = style_id(ctx, "Caption", "caption");
    let field = FieldBuilder::sequence_field(caption.label, caption.number);
    let mut xml = format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}{}"#,
        escape(&style),
        text_run(&format!("{} ", caption.label), None),
        field.to_runs(None)
    );
    if !caption.description.is_empty() {
        xml.push_str(&text_run(&format!(": {}", caption.description), None));
    }
    xml.push_str("</w:p>");
    xml
}

fn table_xml(ctx: &RenderContext, table: &Table) -> Result<String> {
    if table.column_count() == 0 {
        return Err(Error::Other("table has no columns".into()));
    }
    let plan = widths_with(table, ctx.options.page_width, &ColumnConstraints::default());
    let widths = plan.twips();
    let total: i64 = widths.iter().sum();
    let style = style_id(ctx, "TableGrid", "Table Grid");

    let mut xml = String::new();
    xml.push_str(&format!(
        r#"<w:tbl><w:tblPr><w:tblStyle w:val="{}"/><w:tblW w:w="{}" w:type="dxa"/><w:tblBorders>"#,
        escape(&style),
        total
    ));
    for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
        xml.push_str(&format!(
            r#"<w:{} w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
            edge
        ));
    }
    xml.push_str(r#"</w:tblBorders><w:tblLayout w:type="fixed"/></w:tblPr><w:tblGrid>"#);
    for w in &widths {
        xml.push_str(&format!(r#"<w:gridCol w:w="{}"/>"#, w));
    }
    xml.push_str("</w:tblGrid>");

    let accent = ctx.theme.accent();
    for (i, row) in table.rows().iter().enumerate() {
        let is_header = table.has_header && i == 0;
        xml.push_str("<w:tr>");
        if is_header {
            xml.push_str("<w:trPr><w:tblHeader/></w:trPr>");
        }
        for (cell, w) in row.iter().zip(&widths) {
            let shading = if is_header {
                format!(r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#, escape(accent))
            } else {
                String::new()
            };
            let base = if is_header {
                r#"<w:b/><w:color w:val="FFFFFF"/>"#
            } else {
                ""
            };
            xml.push_str(&format!(
                r#"<w:tc><w:tcPr><w:tcW w:w="{}" w:type="dxa"/>{}</w:tcPr><w:p>{}</w:p></w:tc>"#,
                w,
                shading,
                styled_runs(&parse_inline(cell), base)
            ));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    // A paragraph must separate a table from a following table.
    xml.push_str("<w:p/>");
    Ok(xml)
}

/// Put the body into the document: in place of the paragraph holding
/// `{{content}}`, else before the final section properties.
fn place_body(mut document: String, content: &str) -> Result<String> {
    if let Some(marker) = document.find(CONTENT_MARKER) {
        let start = paragraph_start(&document[..marker]);
        let end = document[marker..]
            .find("</w:p>")
            .map(|i| marker + i + "</w:p>".len());
        if let (Some(start), Some(end)) = (start, end) {
            document.replace_range(start..end, content);
            return Ok(document);
        }
    }

    if let Some(pos) = document.rfind("<w:sectPr") {
        document.insert_str(pos, content);
        return Ok(document);
    }
    if insert_before_last(&mut document, "</w:body>", content) {
        return Ok(document);
    }
    Err(Error::Template(format!("{} has no body", DOCUMENT)))
}

fn paragraph_start(before: &str) -> Option<usize> {
    let open = before.rfind("<w:p>");
    let open_attrs = before.rfind("<w:p ");
    open.max(open_attrs)
}

fn enable_field_update(package: &mut Package) -> Result<()> {
    if !package.has_part(SETTINGS) {
        return Ok(());
    }
    let mut settings = package.part_text(SETTINGS)?;
    if settings.contains("<w:updateFields") {
        return Ok(());
    }
    if insert_before_last(&mut settings, "</w:settings>", r#"<w:updateFields w:val="true"/>"#) {
        package.set_part(SETTINGS, settings);
    }
    Ok(())
}
