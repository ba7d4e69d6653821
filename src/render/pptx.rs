//! Slide-deck renderer.
//!
//! One slide per top-level section, laid out by its [`SlideLayoutHint`].
//! Each hint maps to a named layout of the branded template and the
//! placeholder indices content is placed into. Slides already present in
//! the template are left in place; generated slides are appended after
//! them.

use super::{stamp_core_properties, RenderContext, RenderOptions, RenderOutput, RenderReport, RenderState};
use crate::convert::OutputFormat;
use crate::error::{Error, Result};
use crate::layout::{classify, widths_with, ColumnConstraints, EMU_PER_INCH};
use crate::model::{ContentBlock, Document, ImageResource, Section, SlideLayoutHint, Table, TextRun};
use crate::parser::parse_inline;
use crate::template::package::{REL_IMAGE, REL_SLIDE, REL_SLIDE_LAYOUT};
use crate::template::xml::{attributes, elements, escape, insert_before_last, local_name, replace_placeholders};
use crate::template::{Package, Template};
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;

const PRESENTATION: &str = "ppt/presentation.xml";
const SLIDE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const FALLBACK_LAYOUT: &str = "Title and Content";
const FIRST_SLIDE_ID: u32 = 256;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

const DEFAULT_SLIDE: Rect = Rect {
    x: 0,
    y: 0,
    cx: 12_192_000,
    cy: 6_858_000,
};

/// An axis-aligned box in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge
    pub x: i64,
    /// Top edge
    pub y: i64,
    /// Width
    pub cx: i64,
    /// Height
    pub cy: i64,
}

impl Rect {
    /// Create a box.
    pub fn new(x: i64, y: i64, cx: i64, cy: i64) -> Self {
        Self { x, y, cx, cy }
    }

    /// Split into a left part holding `share` of the width and the rest.
    pub fn split_horizontal(&self, share: f64) -> (Rect, Rect) {
        let left = (self.cx as f64 * share).round() as i64;
        (
            Rect::new(self.x, self.y, left, self.cy),
            Rect::new(self.x + left, self.y, self.cx - left, self.cy),
        )
    }
}

/// Scale an image of `width` x `height` pixels to fit `bounds`,
/// preserving aspect ratio, and centre it.
pub fn fit_within(width: u32, height: u32, bounds: Rect) -> Rect {
    if width == 0 || height == 0 || bounds.cx <= 0 || bounds.cy <= 0 {
        return bounds;
    }
    let scale = (bounds.cx as f64 / width as f64).min(bounds.cy as f64 / height as f64);
    let cx = (width as f64 * scale).round() as i64;
    let cy = (height as f64 * scale).round() as i64;
    Rect::new(
        bounds.x + (bounds.cx - cx) / 2,
        bounds.y + (bounds.cy - cy) / 2,
        cx,
        cy,
    )
}

/// Layout name and content placeholder indices for a hint.
pub fn layout_for(hint: SlideLayoutHint) -> (&'static str, &'static [u32]) {
    match hint {
        SlideLayoutHint::Title => ("Title Slide", &[0, 1]),
        SlideLayoutHint::SingleColumn
        | SlideLayoutHint::BulletPoints
        | SlideLayoutHint::DataVisualization => ("Title and Content", &[0, 1]),
        SlideLayoutHint::TwoColumn => ("Two Content", &[0, 1, 2]),
        SlideLayoutHint::Table => ("Title Only", &[0]),
        SlideLayoutHint::Visual => ("Picture with Caption", &[0, 1, 2]),
        SlideLayoutHint::ThankYou => ("Section Header", &[0, 1]),
    }
}

/// A placeholder declared by a layout or master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Placeholder index (0 when the layout omits it)
    pub idx: u32,
    /// Whether the layout wrote an explicit index
    pub explicit_idx: bool,
    /// Placeholder type (`title`, `ctrTitle`, `body`, `pic`, ...)
    pub ph_type: Option<String>,
    /// Position, when the layout overrides the master
    pub bbox: Option<Rect>,
}

impl Placeholder {
    fn is_title(&self) -> bool {
        matches!(self.ph_type.as_deref(), Some("title") | Some("ctrTitle"))
    }

    fn ph_xml(&self) -> String {
        let mut xml = String::from("<p:ph");
        if let Some(t) = &self.ph_type {
            xml.push_str(&format!(r#" type="{}""#, escape(t)));
        }
        if self.explicit_idx {
            xml.push_str(&format!(r#" idx="{}""#, self.idx));
        }
        xml.push_str("/>");
        xml
    }
}

/// Parse the placeholders of a layout or master part.
pub fn parse_placeholders(xml: &str) -> Result<Vec<Placeholder>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut found = Vec::new();
    let mut in_shape = false;
    let mut in_xfrm = false;
    let mut current: Option<Placeholder> = None;
    let mut off: Option<(i64, i64)> = None;
    let mut ext: Option<(i64, i64)> = None;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"sp" | b"pic" => {
                    in_shape = true;
                    current = None;
                    off = None;
                    ext = None;
                }
                b"xfrm" if in_shape => in_xfrm = true,
                _ => {}
            },
            Event::Empty(e) => {
                let qname = e.name();
                match local_name(qname.as_ref()) {
                    b"ph" if in_shape => {
                        let mut attrs = attributes(e);
                        let idx_attr = attrs.remove("idx").and_then(|v| v.parse().ok());
                        current = Some(Placeholder {
                            idx: idx_attr.unwrap_or(0),
                            explicit_idx: idx_attr.is_some(),
                            ph_type: attrs.remove("type"),
                            bbox: None,
                        });
                    }
                    b"off" if in_xfrm => {
                        let attrs = attributes(e);
                        off = Some((emu_attr(&attrs, "x"), emu_attr(&attrs, "y")));
                    }
                    b"ext" if in_xfrm => {
                        let attrs = attributes(e);
                        ext = Some((emu_attr(&attrs, "cx"), emu_attr(&attrs, "cy")));
                    }
                    _ => {}
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"xfrm" => in_xfrm = false,
                b"sp" | b"pic" => {
                    in_shape = false;
                    if let Some(mut ph) = current.take() {
                        if let (Some((x, y)), Some((cx, cy))) = (off, ext) {
                            ph.bbox = Some(Rect::new(x, y, cx, cy));
                        }
                        found.push(ph);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}

fn emu_attr(attrs: &std::collections::HashMap<String, String>, key: &str) -> i64 {
    attrs.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Name from `<p:cSld name="...">`.
fn layout_name(xml: &str) -> Result<Option<String>> {
    Ok(elements(xml, "cSld")?
        .into_iter()
        .next()
        .and_then(|mut attrs| attrs.remove("name")))
}

#[derive(Debug, Clone)]
struct SlideLayout {
    name: String,
    part: String,
    placeholders: Vec<Placeholder>,
}

/// One paragraph of slide text.
#[derive(Debug, Clone)]
enum SlideText {
    Plain(Vec<TextRun>),
    Bullet(Vec<TextRun>, u8),
    Heading(String),
}

/// Content of a section and its folded-in subsections.
#[derive(Debug, Default)]
struct SlideContent<'a> {
    text: Vec<SlideText>,
    tables: Vec<&'a Table>,
    images: Vec<(&'a str, &'a str)>,
}

impl<'a> SlideContent<'a> {
    fn collect(section: &'a Section) -> Self {
        let mut content = SlideContent::default();
        content.add_blocks(&section.blocks);
        for child in &section.children {
            content.add_section(child);
        }
        content
    }

    fn add_section(&mut self, section: &'a Section) {
        self.text.push(SlideText::Heading(section.title.clone()));
        self.add_blocks(&section.blocks);
        for child in &section.children {
            self.add_section(child);
        }
    }

    fn add_blocks(&mut self, blocks: &'a [ContentBlock]) {
        for block in blocks {
            match block {
                ContentBlock::Paragraph { runs } => self.text.push(SlideText::Plain(runs.clone())),
                ContentBlock::Bullet { runs, level } => {
                    self.text.push(SlideText::Bullet(runs.clone(), *level))
                }
                ContentBlock::Table(t) => self.tables.push(t),
                ContentBlock::Image { path, alt } => self.images.push((path.as_str(), alt.as_str())),
                ContentBlock::Caption(c) => {
                    self.text.push(SlideText::Plain(vec![TextRun::italic(c.to_string())]))
                }
            }
        }
    }
}

/// Render a document into a slide-deck template.
///
/// Sections should carry layout hints (see
/// [`assign_hints`](crate::layout::assign_hints)); sections without one
/// are classified on the fly.
pub fn render_pptx(
    doc: &Document,
    template: &Template,
    source_dir: &Path,
    options: &RenderOptions,
) -> Result<RenderOutput> {
    let mut renderer = PptxRenderer::new();
    let ctx = renderer.load_template(template, source_dir, options)?;
    if ctx.options.title_slide {
        renderer.append_title_slide(&ctx, doc)?;
    }
    for (ordinal, section) in doc.sections.iter().enumerate() {
        renderer.append_section(&ctx, section, ordinal)?;
    }
    renderer.save(&ctx, doc)
}

/// Incremental slide-deck renderer.
#[derive(Debug, Default)]
pub struct PptxRenderer {
    state: RenderState,
    package: Option<Package>,
    layouts: Vec<SlideLayout>,
    master: Vec<Placeholder>,
    slide_size: Rect,
    generated: Vec<String>,
    report: RenderReport,
}

/// Per-slide shape and relationship bookkeeping.
struct SlideBuilder<'p> {
    package: &'p mut Package,
    part: String,
    shapes: String,
    next_shape_id: u32,
}

impl<'p> SlideBuilder<'p> {
    fn new(package: &'p mut Package, part: String) -> Self {
        Self {
            package,
            part,
            shapes: String::new(),
            next_shape_id: 2,
        }
    }

    fn shape_id(&mut self) -> u32 {
        let id = self.next_shape_id;
        self.next_shape_id += 1;
        id
    }

    fn text_shape(&mut self, ph: &Placeholder, bbox: Option<Rect>, paragraphs: &str) {
        let id = self.shape_id();
        let sp_pr = match bbox {
            Some(r) => format!("<p:spPr>{}</p:spPr>", xfrm(r)),
            None => "<p:spPr/>".to_string(),
        };
        self.shapes.push_str(&format!(
            concat!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Placeholder {id}"/>"#,
                r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr>{ph}</p:nvPr></p:nvSpPr>"#,
                r#"{sp_pr}<p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
            ),
            id = id,
            ph = ph.ph_xml(),
            sp_pr = sp_pr,
            paragraphs = paragraphs,
        ));
    }

    fn picture(&mut self, ctx: &RenderContext, path: &str, alt: &str, bounds: Rect) -> Result<()> {
        let image = ImageResource::load(&ctx.resolve_path(path))?;
        let media = self.package.next_part_name("ppt/media/image", image.extension());
        let target = format!("../media/{}", media.trim_start_matches("ppt/media/"));
        self.package
            .add_default_content_type(image.extension(), image.mime_type)?;
        self.package.set_part(media, image.data.clone());
        let rid = self.package.add_relationship(&self.part, REL_IMAGE, &target)?;

        let fitted = fit_within(image.width, image.height, bounds);
        let id = self.shape_id();
        self.shapes.push_str(&format!(
            concat!(
                r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}" descr="{alt}"/>"#,
                r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
                r#"<p:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
                r#"<p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
            ),
            id = id,
            alt = escape(alt),
            rid = rid,
            xfrm = xfrm(fitted),
        ));
        Ok(())
    }

    fn table(&mut self, ctx: &RenderContext, table: &Table, bounds: Rect) -> Result<()> {
        if table.column_count() == 0 {
            return Err(Error::Other("table has no columns".into()));
        }
        let plan = widths_with(
            table,
            bounds.cx as f64 / EMU_PER_INCH,
            &ColumnConstraints::default(),
        );
        let cols = plan.scaled(bounds.cx);
        let row_height = 370_840;
        let accent = escape(ctx.theme.accent());

        let mut grid = String::new();
        for w in &cols {
            grid.push_str(&format!(r#"<a:gridCol w="{}"/>"#, w));
        }

        let mut rows = String::new();
        for (i, row) in table.rows().iter().enumerate() {
            let header = table.has_header && i == 0;
            rows.push_str(&format!(r#"<a:tr h="{}">"#, row_height));
            for cell in row {
                let runs = text_runs(&parse_inline(cell), header, 1200);
                let fill = if header {
                    format!(r#"<a:tcPr><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:tcPr>"#, accent)
                } else {
                    "<a:tcPr/>".to_string()
                };
                rows.push_str(&format!(
                    r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/><a:p>{}</a:p></a:txBody>{}</a:tc>"#,
                    runs, fill
                ));
            }
            rows.push_str("</a:tr>");
        }

        let id = self.shape_id();
        let frame = Rect::new(bounds.x, bounds.y, bounds.cx, row_height * table.row_count() as i64);
        self.shapes.push_str(&format!(
            concat!(
                r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/>"#,
                r#"<p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>"#,
                r#"<p:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></p:xfrm>"#,
                r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">"#,
                r#"<a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>{grid}</a:tblGrid>{rows}</a:tbl>"#,
                r#"</a:graphicData></a:graphic></p:graphicFrame>"#,
            ),
            id = id,
            x = frame.x,
            y = frame.y,
            cx = frame.cx,
            cy = frame.cy,
            grid = grid,
            rows = rows,
        ));
        Ok(())
    }

    fn finish(self) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<p:sld xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}"><p:cSld><p:spTree>"#,
                r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#,
                "{shapes}",
                r#"</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
            ),
            a = NS_A,
            r = NS_R,
            p = NS_P,
            shapes = self.shapes,
        )
    }
}

fn xfrm(r: Rect) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        r.x, r.y, r.cx, r.cy
    )
}

fn text_runs(runs: &[TextRun], force_bold: bool, size: u32) -> String {
    runs.iter()
        .map(|run| {
            let mut rpr = format!(r#"<a:rPr lang="en-US" sz="{}" dirty="0""#, size);
            if run.bold || force_bold {
                rpr.push_str(r#" b="1""#);
            }
            if run.italic {
                rpr.push_str(r#" i="1""#);
            }
            if force_bold {
                rpr.push_str(r#"><a:solidFill><a:srgbClr val="FFFFFF"/></a:solidFill></a:rPr>"#);
            } else {
                rpr.push_str("/>");
            }
            format!("<a:r>{}<a:t>{}</a:t></a:r>", rpr, escape(&run.text))
        })
        .collect()
}

fn plain_paragraph(text: &str) -> String {
    format!(
        r#"<a:p><a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
        escape(text)
    )
}

fn paragraphs(text: &[SlideText]) -> String {
    if text.is_empty() {
        return "<a:p/>".to_string();
    }
    text.iter()
        .map(|t| match t {
            SlideText::Plain(runs) => format!(
                r#"<a:p><a:pPr marL="0" indent="0"><a:buNone/></a:pPr>{}</a:p>"#,
                run_list(runs)
            ),
            SlideText::Bullet(runs, level) => format!(
                r#"<a:p><a:pPr lvl="{}"/>{}</a:p>"#,
                (*level).min(8),
                run_list(runs)
            ),
            SlideText::Heading(title) => format!(
                r#"<a:p><a:pPr marL="0" indent="0"><a:buNone/></a:pPr><a:r><a:rPr lang="en-US" b="1" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
                escape(title)
            ),
        })
        .collect()
}

fn run_list(runs: &[TextRun]) -> String {
    runs.iter()
        .map(|run| {
            let mut rpr = String::from(r#"<a:rPr lang="en-US" dirty="0""#);
            if run.bold {
                rpr.push_str(r#" b="1""#);
            }
            if run.italic {
                rpr.push_str(r#" i="1""#);
            }
            rpr.push_str("/>");
            format!("<a:r>{}<a:t>{}</a:t></a:r>", rpr, escape(&run.text))
        })
        .collect()
}

impl PptxRenderer {
    /// Create an idle renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Open a fresh package, index its layouts, and build the context.
    pub fn load_template(
        &mut self,
        template: &Template,
        source_dir: &Path,
        options: &RenderOptions,
    ) -> Result<RenderContext> {
        if template.format() != OutputFormat::Pptx {
            return Err(Error::Template(format!(
                "{} is not a slide-deck template",
                template.path().display()
            )));
        }
        let package = template.open()?;
        let presentation = package.part_text(PRESENTATION)?;

        self.slide_size = elements(&presentation, "sldSz")?
            .into_iter()
            .next()
            .map(|attrs| Rect::new(0, 0, emu_attr(&attrs, "cx"), emu_attr(&attrs, "cy")))
            .filter(|r| r.cx > 0 && r.cy > 0)
            .unwrap_or(DEFAULT_SLIDE);

        let layout_parts: Vec<String> = package
            .part_names()
            .filter(|n| n.starts_with("ppt/slideLayouts/") && n.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        for part in layout_parts {
            let xml = package.part_text(&part)?;
            let Some(name) = layout_name(&xml)? else {
                continue;
            };
            self.layouts.push(SlideLayout {
                name,
                placeholders: parse_placeholders(&xml)?,
                part,
            });
        }
        if self.layouts.is_empty() {
            return Err(Error::Template("slide-deck template has no layouts".into()));
        }

        if let Some(master) = package
            .part_names()
            .find(|n| n.starts_with("ppt/slideMasters/") && n.ends_with(".xml"))
            .map(str::to_string)
        {
            self.master = parse_placeholders(&package.part_text(&master)?)?;
        }

        let ctx = RenderContext::new(&package, OutputFormat::Pptx, source_dir, options.clone())?;
        self.package = Some(package);
        self.state = RenderState::TemplateLoaded;
        log::debug!("Slide template has {} layouts", self.layouts.len());
        Ok(ctx)
    }

    /// Add the title slide built from front-matter metadata.
    pub fn append_title_slide(&mut self, ctx: &RenderContext, doc: &Document) -> Result<()> {
        self.require_loaded()?;
        let title = doc
            .display_title()
            .map(str::to_string)
            .unwrap_or_else(|| stem(&doc.source));

        let mut lines: Vec<String> = Vec::new();
        if let Some(subtitle) = doc.metadata.get("subtitle") {
            lines.push(subtitle.to_string());
        }
        if let Some(client) = doc.metadata.client_name() {
            lines.push(format!("Prepared for {}", client));
        }
        if let Some(date) = doc.metadata.get("date") {
            lines.push(date.to_string());
        }
        let body: String = if lines.is_empty() {
            "<a:p/>".to_string()
        } else {
            lines.iter().map(|l| plain_paragraph(l)).collect()
        };
        let logo = doc.metadata.logo().map(str::to_string);

        let result = self.build_slide(SlideLayoutHint::Title, |slide, layout, size| {
            let title_ph = placeholder(layout, 0);
            slide.text_shape(&title_ph, None, &plain_paragraph(&title));
            let (_, slots) = layout_for(SlideLayoutHint::Title);
            if let Some(ph) = slots.get(1).and_then(|&idx| find_placeholder(layout, idx)) {
                slide.text_shape(&ph, None, &body);
            }
            if let Some(logo) = &logo {
                let bounds = Rect::new(
                    size.cx * 72 / 100,
                    size.cy * 75 / 100,
                    size.cx * 22 / 100,
                    size.cy * 18 / 100,
                );
                if let Err(e) = slide.picture(ctx, logo, "Logo", bounds) {
                    return Ok(vec![(format!("title slide: logo {}", logo), e)]);
                }
            }
            Ok(Vec::new())
        });
        self.finish_unit("title slide", result);
        Ok(())
    }

    /// Add the slide for one top-level section.
    pub fn append_section(&mut self, ctx: &RenderContext, section: &Section, ordinal: usize) -> Result<()> {
        self.require_loaded()?;
        let unit = format!("slide {}", section.title);

        let mut hint = section
            .slide_hint
            .unwrap_or_else(|| classify(&section.title, ordinal));
        let content = SlideContent::collect(section);
        if hint == SlideLayoutHint::Title {
            log::debug!("Skipping title-slide section '{}'", section.title);
            return Ok(());
        }
        if !content.tables.is_empty() {
            hint = SlideLayoutHint::Table;
        } else if hint == SlideLayoutHint::Table {
            hint = SlideLayoutHint::SingleColumn;
        }

        let title = section.title.clone();
        let body_box = self.content_box();
        let (_, slots) = layout_for(hint);
        let first = slots.get(1).copied().unwrap_or(1);
        let second = slots.get(2).copied().unwrap_or(2);
        let result = self.build_slide(hint, |slide, layout, size| {
            let mut failures = Vec::new();
            slide.text_shape(&placeholder(layout, 0), None, &plain_paragraph(&title));

            match hint {
                SlideLayoutHint::Table => {
                    let title_box = resolve_box(layout, 0, size);
                    let top = title_box.y + title_box.cy + size.cy / 40;
                    let bounds = Rect::new(title_box.x, top, title_box.cx, (size.cy - top - size.cy / 20).max(0));
                    if let Some(table) = content.tables.first() {
                        if let Err(e) = slide.table(ctx, table, bounds) {
                            failures.push((format!("{}: table", title), e));
                        }
                    }
                    if content.tables.len() > 1 {
                        log::debug!("Slide '{}' shows the first of {} tables", title, content.tables.len());
                    }
                }
                SlideLayoutHint::Visual => {
                    let text_ph = find_placeholder(layout, second).unwrap_or_else(|| placeholder(layout, first));
                    slide.text_shape(&text_ph, None, &paragraphs(&content.text));
                    if let Some((path, alt)) = content.images.first() {
                        let bounds = resolve_box(layout, first, size);
                        if let Err(e) = slide.picture(ctx, path, alt, bounds) {
                            failures.push((format!("{}: image {}", title, path), e));
                        }
                    }
                }
                SlideLayoutHint::TwoColumn => {
                    let left = placeholder(layout, first);
                    let right = find_placeholder(layout, second);
                    match (content.images.first(), right) {
                        (Some((path, alt)), Some(right)) => {
                            slide.text_shape(&left, None, &paragraphs(&content.text));
                            let bounds = resolve_box(layout, right.idx, size);
                            if let Err(e) = slide.picture(ctx, path, alt, bounds) {
                                failures.push((format!("{}: image {}", title, path), e));
                            }
                        }
                        (_, Some(right)) => {
                            let (first, second) = split_columns(section, &content.text);
                            slide.text_shape(&left, None, &paragraphs(&first));
                            slide.text_shape(&right, None, &paragraphs(&second));
                        }
                        (_, None) => slide.text_shape(&left, None, &paragraphs(&content.text)),
                    }
                }
                _ => {
                    let body = placeholder(layout, first);
                    if let Some((path, alt)) = content.images.first() {
                        let area = layout_box(&layout.placeholders, first).or(body_box).unwrap_or(size);
                        let (text_box, image_box) = area.split_horizontal(0.55);
                        slide.text_shape(&body, Some(text_box), &paragraphs(&content.text));
                        if let Err(e) = slide.picture(ctx, path, alt, image_box) {
                            failures.push((format!("{}: image {}", title, path), e));
                        }
                    } else {
                        slide.text_shape(&body, None, &paragraphs(&content.text));
                    }
                }
            }
            Ok(failures)
        });
        self.finish_unit(&unit, result);
        self.state = RenderState::SectionAppended;
        Ok(())
    }

    /// Substitute `{{key}}` metadata placeholders in the generated slides
    /// and serialize the package.
    pub fn save(mut self, _ctx: &RenderContext, doc: &Document) -> Result<RenderOutput> {
        let mut package = self
            .package
            .take()
            .ok_or_else(|| Error::Other("no template loaded".into()))?;

        for part in &self.generated {
            let xml = package.part_text(part)?;
            let xml = replace_placeholders(&xml, |key| match key {
                "title" => doc.display_title(),
                _ => doc.metadata.get(key),
            });
            package.set_part(part.clone(), xml);
        }
        stamp_core_properties(&mut package, doc.display_title(), Utc::now())?;

        let bytes = package.to_bytes()?;
        self.state = RenderState::Saved;
        log::debug!("Rendered {} slides, {} errors", self.generated.len(), self.report.errors.len());
        Ok(RenderOutput {
            bytes,
            report: self.report,
        })
    }

    fn require_loaded(&self) -> Result<()> {
        match self.state {
            RenderState::TemplateLoaded | RenderState::SectionAppended => Ok(()),
            state => Err(Error::Other(format!("cannot append slides while {:?}", state))),
        }
    }

    fn finish_unit(&mut self, unit: &str, result: Result<Vec<(String, Error)>>) {
        match result {
            Ok(failures) => {
                self.report.record_success();
                for (unit, e) in failures {
                    self.report.record_error(unit, e);
                }
            }
            Err(e) => self.report.record_error(unit, e),
        }
    }

    fn find_layout(&self, hint: SlideLayoutHint) -> Result<SlideLayout> {
        let (name, _) = layout_for(hint);
        let by_name = |wanted: &str| {
            self.layouts
                .iter()
                .find(|l| l.name.eq_ignore_ascii_case(wanted))
                .cloned()
        };
        if let Some(layout) = by_name(name) {
            return Ok(layout);
        }
        log::debug!("Template has no '{}' layout, using '{}'", name, FALLBACK_LAYOUT);
        by_name(FALLBACK_LAYOUT)
            .ok_or_else(|| Error::render_unit(format!("layout {}", name), "layout not found in template"))
    }

    /// Body box of the fallback layout, used when a layout leaves it to the master.
    fn content_box(&self) -> Option<Rect> {
        self.layouts
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(FALLBACK_LAYOUT))
            .and_then(|l| layout_box(&l.placeholders, 1))
            .or_else(|| {
                self.master
                    .iter()
                    .find(|p| p.ph_type.as_deref() == Some("body"))
                    .and_then(|p| p.bbox)
            })
    }

    /// Create a slide part for `hint`, let `fill` add shapes, and register
    /// the slide with the presentation. `fill` returns recovered failures.
    fn build_slide<F>(&mut self, hint: SlideLayoutHint, fill: F) -> Result<Vec<(String, Error)>>
    where
        F: FnOnce(&mut SlideBuilder<'_>, &LayoutView, Rect) -> Result<Vec<(String, Error)>>,
    {
        let layout = self.find_layout(hint)?;
        let view = LayoutView {
            placeholders: layout.placeholders.clone(),
            master: self.master.clone(),
        };
        let size = self.slide_size;
        let package = self
            .package
            .as_mut()
            .ok_or_else(|| Error::Other("no template loaded".into()))?;

        let part = package.next_part_name("ppt/slides/slide", "xml");
        let layout_target = format!("../slideLayouts/{}", layout.part.trim_start_matches("ppt/slideLayouts/"));
        package.add_relationship(&part, REL_SLIDE_LAYOUT, &layout_target)?;

        let mut slide = SlideBuilder::new(package, part.clone());
        let failures = fill(&mut slide, &view, size)?;
        let xml = slide.finish();

        package.set_part(part.clone(), xml);
        package.add_override(&part, SLIDE_CONTENT_TYPE)?;
        register_slide(package, &part)?;
        self.generated.push(part);
        Ok(failures)
    }
}

/// Placeholders of the chosen layout plus the master's, for box lookup.
struct LayoutView {
    placeholders: Vec<Placeholder>,
    master: Vec<Placeholder>,
}

fn find_placeholder(layout: &LayoutView, idx: u32) -> Option<Placeholder> {
    layout
        .placeholders
        .iter()
        .find(|p| if idx == 0 { p.is_title() || (p.idx == 0 && !p.explicit_idx && p.ph_type.is_none()) } else { p.idx == idx })
        .cloned()
}

fn placeholder(layout: &LayoutView, idx: u32) -> Placeholder {
    find_placeholder(layout, idx).unwrap_or(Placeholder {
        idx,
        explicit_idx: idx != 0,
        ph_type: if idx == 0 { Some("title".to_string()) } else { None },
        bbox: None,
    })
}

fn layout_box(placeholders: &[Placeholder], idx: u32) -> Option<Rect> {
    placeholders
        .iter().find(|p| p.idx == idx && !p.is_title()).and_then(|p| p.bbox)
}

/// Position of a placeholder: the layout's own box, the master box of the
/// same kind, or a default carved out of the slide.
fn resolve_box(layout: &LayoutView, idx: u32, size: Rect) -> Rect {
    let ph = find_placeholder(layout, idx);
    if let Some(bbox) = ph.as_ref().and_then(|p| p.bbox) {
        return bbox;
    }
    let want_title = idx == 0 || ph.as_ref().is_some_and(Placeholder::is_title);
    let master = layout.master.iter().find(|p| {
        if want_title {
            p.is_title()
        } else {
            p.ph_type.as_deref() == Some("body")
        }
    });
    if let Some(bbox) = master.and_then(|p| p.bbox) {
        return bbox;
    }

    let margin_x = size.cx / 16;
    if want_title {
        Rect::new(margin_x, size.cy / 20, size.cx - 2 * margin_x, size.cy / 6)
    } else {
        let top = size.cy / 4;
        Rect::new(margin_x, top, size.cx - 2 * margin_x, size.cy - top - size.cy / 10)
    }
}

/// Split slide text into two columns: by subsection when the section has
/// at least two, otherwise by halves.
fn split_columns(section: &Section, text: &[SlideText]) -> (Vec<SlideText>, Vec<SlideText>) {
    let split_at = if section.children.len() >= 2 {
        let second_child = &section.children[section.children.len().div_ceil(2)].title;
        text.iter()
            .position(|t| matches!(t, SlideText::Heading(h) if h == second_child))
            .unwrap_or(text.len().div_ceil(2))
    } else {
        text.len().div_ceil(2)
    };
    let (a, b) = text.split_at(split_at.min(text.len()));
    (a.to_vec(), b.to_vec())
}

fn register_slide(package: &mut Package, slide_part: &str) -> Result<()> {
    let target = slide_part.trim_start_matches("ppt/").to_string();
    let rid = package.add_relationship(PRESENTATION, REL_SLIDE, &target)?;

    let mut presentation = package.part_text(PRESENTATION)?;
    let next_id = elements(&presentation, "sldId")?
        .iter()
        .filter_map(|a| a.get("id").and_then(|v| v.parse::<u32>().ok()))
        .max()
        .map(|m| m + 1)
        .unwrap_or(FIRST_SLIDE_ID)
        .max(FIRST_SLIDE_ID);
    let entry = format!(r#"<p:sldId id="{}" r:id="{}"/>"#, next_id, rid);

    if !insert_before_last(&mut presentation, "</p:sldIdLst>", &entry) {
        let list = format!("<p:sldIdLst>{}</p:sldIdLst>", entry);
        if let Some(pos) = presentation.find("</p:sldMasterIdLst>") {
            presentation.insert_str(pos + "</p:sldMasterIdLst>".len(), &list);
        } else if let Some(pos) = presentation.find("<p:sldSz") {
            presentation.insert_str(pos, &list);
        } else {
            return Err(Error::Template(format!("{} has no slide list anchor", PRESENTATION)));
        }
    }
    package.set_part(PRESENTATION, presentation);
    Ok(())
}

fn stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}
