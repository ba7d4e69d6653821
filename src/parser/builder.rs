//! Semantic model builder.
//!
//! Consumes the token stream of a markup body and produces a
//! [`Document`]: a numbered section tree whose sections hold content
//! blocks in source order, with a caption after every table and image.

use super::frontmatter::split_front_matter;
use super::inline::parse_inline;
use super::numbering::SectionNumberer;
use super::options::ParseOptions;
use super::tokenizer::{tokenize, Token};
use crate::error::Result;
use crate::model::{CaptionCounters, CaptionLabel, ContentBlock, Document, Section, Table};
use std::path::Path;

/// Parse a markup source into a document model.
///
/// `identity` is recorded as [`Document::source`]. The only failure is
/// an unterminated front-matter block.
pub fn parse_markup(source: &str, identity: &str) -> Result<Document> {
    parse_markup_with_options(source, &ParseOptions::new().with_source_name(identity))
}

/// Parse a markup source with explicit options.
pub fn parse_markup_with_options(source: &str, options: &ParseOptions) -> Result<Document> {
    let (metadata, body) = split_front_matter(source)?;
    let tokens = tokenize(body);

    let mut builder = SemanticModelBuilder::new(options, &tokens);
    for token in tokens {
        builder.push(token);
    }
    let mut doc = builder.finish();
    doc.metadata = metadata;

    log::debug!(
        "Parsed {}: {} sections, {} preamble blocks",
        doc.source,
        doc.section_count(),
        doc.preamble.len()
    );
    Ok(doc)
}

/// Parse a markup file from disk.
pub fn parse_markup_file(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let identity = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_markup(&source, &identity)
}

/// Text being accumulated across lines.
#[derive(Debug)]
enum OpenText {
    Paragraph(String),
    Bullet { text: String, level: u8 },
}

/// A table or image waiting for its caption line.
#[derive(Debug)]
struct PendingCaption {
    label: CaptionLabel,
    default_description: String,
}

/// Incremental builder fed one token at a time.
pub struct SemanticModelBuilder {
    doc: Document,
    suppress_title: bool,
    level_offset: u8,
    stack: Vec<Section>,
    numberer: SectionNumberer,
    captions: CaptionCounters,
    open_text: Option<OpenText>,
    table_rows: Vec<Vec<String>>,
    table_open: bool,
    table_has_header: bool,
    pending_caption: Option<PendingCaption>,
}

impl SemanticModelBuilder {
    /// Create a builder. `tokens` is inspected once to decide whether
    /// heading levels are rebased under a suppressed title.
    pub fn new(options: &ParseOptions, tokens: &[Token]) -> Self {
        let has_title = options.suppress_title
            && tokens
                .iter()
                .any(|t| matches!(t, Token::Heading { level: 1, .. }));

        Self {
            doc: Document::new(options.source_name.clone()),
            suppress_title: options.suppress_title,
            level_offset: u8::from(has_title),
            stack: Vec::new(),
            numberer: SectionNumberer::new(),
            captions: CaptionCounters::new(),
            open_text: None,
            table_rows: Vec::new(),
            table_open: false,
            table_has_header: false,
            pending_caption: None,
        }
    }

    /// Feed one token.
    pub fn push(&mut self, token: Token) {
        if self.table_open && !matches!(token, Token::TableRow(_) | Token::TableSeparator) {
            self.close_table();
        }

        if self.pending_caption.is_some() {
            match token {
                Token::Blank => return,
                Token::Caption { label, text }
                    if self.pending_caption.as_ref().map(|p| p.label) == Some(label) =>
                {
                    self.pending_caption = None;
                    let caption = self.captions.next(label, text);
                    self.container().push(ContentBlock::Caption(caption));
                    return;
                }
                other => {
                    self.flush_caption();
                    self.push(other);
                    return;
                }
            }
        }

        match token {
            Token::Heading { level, text } => self.heading(level, text),
            Token::Bullet { indent, text } => {
                self.flush_text();
                self.open_text = Some(OpenText::Bullet {
                    text,
                    level: indent,
                });
            }
            Token::TableRow(cells) => {
                self.flush_text();
                self.table_open = true;
                self.table_rows.push(cells);
            }
            Token::TableSeparator => {
                self.flush_text();
                self.table_open = true;
                if self.table_rows.len() == 1 {
                    self.table_has_header = true;
                }
            }
            Token::Image { alt, path } => {
                self.flush_text();
                let default_description = if alt.is_empty() {
                    file_stem(&path)
                } else {
                    alt.clone()
                };
                self.container().push(ContentBlock::Image { path, alt });
                self.pending_caption = Some(PendingCaption {
                    label: CaptionLabel::Figure,
                    default_description,
                });
            }
            Token::Caption { label, text } => {
                // Stray caption line: keep it as text.
                self.text(format!("{}: {}", label, text), 0, false);
            }
            Token::Text {
                text,
                indent,
                standalone,
            } => self.text(text, indent, standalone),
            Token::Blank => self.flush_text(),
        }
    }

    /// Close everything that is still open and return the document.
    pub fn finish(mut self) -> Document {
        if self.table_open {
            self.close_table();
        }
        self.flush_caption();
        self.flush_text();
        while !self.stack.is_empty() {
            self.close_section();
        }
        self.doc
    }

    fn heading(&mut self, hashes: u8, text: String) {
        self.flush_text();

        if self.suppress_title && hashes == 1 && self.doc.title.is_none() {
            self.doc.title = Some(text);
            return;
        }

        let level = hashes.saturating_sub(self.level_offset).max(1);
        while self.stack.last().is_some_and(|s| s.level >= level) {
            self.close_section();
        }

        let number = self.numberer.next(level);
        self.stack.push(Section::new(text, level, number));
    }

    fn text(&mut self, text: String, indent: usize, standalone: bool) {
        if standalone {
            self.flush_text();
            self.container()
                .push(ContentBlock::paragraph(parse_inline(&text)));
            return;
        }

        match &mut self.open_text {
            Some(OpenText::Paragraph(buf)) => {
                buf.push(' ');
                buf.push_str(&text);
            }
            Some(OpenText::Bullet { text: buf, .. }) if indent > 0 => {
                buf.push(' ');
                buf.push_str(&text);
            }
            _ => {
                self.flush_text();
                self.open_text = Some(OpenText::Paragraph(text));
            }
        }
    }

    fn flush_text(&mut self) {
        let block = match self.open_text.take() {
            Some(OpenText::Paragraph(text)) => ContentBlock::paragraph(parse_inline(&text)),
            Some(OpenText::Bullet { text, level }) => {
                ContentBlock::bullet(parse_inline(&text), level)
            }
            None => return,
        };
        self.container().push(block);
    }

    fn close_table(&mut self) {
        self.table_open = false;
        let rows = std::mem::take(&mut self.table_rows);
        let has_header = std::mem::take(&mut self.table_has_header);
        if rows.is_empty() {
            return;
        }

        let table = Table::from_rows(rows, has_header);
        self.container().push(ContentBlock::Table(table));
        let default_description = self.current_title();
        self.pending_caption = Some(PendingCaption {
            label: CaptionLabel::Table,
            default_description,
        });
    }

    fn flush_caption(&mut self) {
        if let Some(pending) = self.pending_caption.take() {
            let caption = self
                .captions
                .next(pending.label, pending.default_description);
            self.container().push(ContentBlock::Caption(caption));
        }
    }

    fn close_section(&mut self) {
        let Some(section) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(section),
            None => self.doc.sections.push(section),
        }
    }

    fn container(&mut self) -> &mut Vec<ContentBlock> {
        match self.stack.last_mut() {
            Some(section) => &mut section.blocks,
            None => &mut self.doc.preamble,
        }
    }

    fn current_title(&self) -> String {
        self.stack
            .last()
            .map(|s| s.title.clone())
            .or_else(|| self.doc.title.clone())
            .unwrap_or_default()
    }
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Caption, TextRun};

    fn captions(doc: &Document) -> Vec<String> {
        doc.iter_blocks()
            .filter_map(|b| match b {
                ContentBlock::Caption(c) => Some(c.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_title_suppressed_and_levels_rebased() {
        let source = "---\ntitle: X\n---\n# X\n## Intro\n### Background\n## Scope\n";
        let doc = parse_markup(source, "x.md").unwrap();

        assert_eq!(doc.title.as_deref(), Some("X"));
        assert_eq!(doc.metadata.get("title"), Some("X"));
        let titles: Vec<_> = doc.iter_sections().map(|s| s.numbered_title()).collect();
        assert_eq!(titles, vec!["1 Intro", "1.1 Background", "2 Scope"]);
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].children.len(), 1);
    }

    #[test]
    fn test_keep_title_option() {
        let options = ParseOptions::new().keep_title();
        let doc = parse_markup_with_options("# A\n## B\n", &options).unwrap();
        assert!(doc.title.is_none());
        let titles: Vec<_> = doc.iter_sections().map(|s| s.numbered_title()).collect();
        assert_eq!(titles, vec!["1 A", "1.1 B"]);
    }

    #[test]
    fn test_without_title_no_rebase() {
        let doc = parse_markup("## Only Level Two\n", "x.md").unwrap();
        assert_eq!(doc.sections[0].number.to_string(), "0.1");
    }

    #[test]
    fn test_second_level_one_heading_is_section() {
        let doc = parse_markup("# Title\n## A\n# Part Two\n", "x.md").unwrap();
        let titles: Vec<_> = doc.iter_sections().map(|s| s.numbered_title()).collect();
        assert_eq!(titles, vec!["1 A", "2 Part Two"]);
    }

    #[test]
    fn test_paragraph_merging() {
        let doc = parse_markup("## S\nline one\nline two\n\nnext para\n", "x.md").unwrap();
        let blocks = &doc.sections[0].blocks;
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].plain_text(), "line one line two");
        assert_eq!(blocks[1].plain_text(), "next para");
    }

    #[test]
    fn test_bullets_and_continuation() {
        let doc = parse_markup(
            "## S\n- **Bold** lead\n  continued here\n  - nested\n- back\n",
            "x.md",
        )
        .unwrap();
        let blocks = &doc.sections[0].blocks;
        assert_eq!(blocks.len(), 3);
        match &blocks[0] {
            ContentBlock::Bullet { runs, level } => {
                assert_eq!(*level, 0);
                assert_eq!(runs[0], TextRun::bold("Bold"));
                assert_eq!(plain_text_of(runs), "Bold lead continued here");
            }
            other => panic!("expected bullet, got {:?}", other),
        }
        assert!(matches!(blocks[1], ContentBlock::Bullet { level: 1, .. }));
        assert!(matches!(blocks[2], ContentBlock::Bullet { level: 0, .. }));
    }

    fn plain_text_of(runs: &[TextRun]) -> String {
        crate::model::plain_text(runs)
    }

    #[test]
    fn test_table_with_explicit_caption() {
        let source = "# T\n## Costs\n| Item | Cost |\n|---|---|\n| A | $1 |\n\nTable: Cost summary\n\nAfter.\n";
        let doc = parse_markup(source, "x.md").unwrap();
        let blocks = &doc.sections[0].blocks;
        assert_eq!(blocks.len(), 3);
        match &blocks[0] {
            ContentBlock::Table(t) => {
                assert!(t.has_header);
                assert_eq!(t.row_count(), 2);
                assert_eq!(t.column_count(), 2);
            }
            other => panic!("expected table, got {:?}", other),
        }
        assert_eq!(captions(&doc), vec!["Table 1: Cost summary"]);
        assert_eq!(blocks[2].plain_text(), "After.");
    }

    #[test]
    fn test_default_captions_and_independent_counters() {
        let source = "# T\n## Arch\n![System diagram](a.png)\n| A |\n|---|\n| 1 |\n![](img/flow.png)\n";
        let doc = parse_markup(source, "x.md").unwrap();
        assert_eq!(
            captions(&doc),
            vec!["Figure 1: System diagram", "Table 1: Arch", "Figure 2: flow"]
        );
    }

    #[test]
    fn test_every_table_and_image_followed_by_caption() {
        let source = "## A\n| x | y |\n| 1 | 2 |\nText\n![i](i.png)\nFigure: Custom\n## B\n| z |\n|---|\n";
        let doc = parse_markup(source, "x.md").unwrap();
        for section in doc.iter_sections() {
            for (i, block) in section.blocks.iter().enumerate() {
                if matches!(block, ContentBlock::Table(_) | ContentBlock::Image { .. }) {
                    assert!(
                        matches!(section.blocks.get(i + 1), Some(ContentBlock::Caption(_))),
                        "block {} in {} lacks a caption",
                        i,
                        section.title
                    );
                }
            }
        }
    }

    #[test]
    fn test_headerless_table() {
        let doc = parse_markup("## S\n| a | b |\n| c | d |\n", "x.md").unwrap();
        match &doc.sections[0].blocks[0] {
            ContentBlock::Table(t) => {
                assert!(!t.has_header);
                assert!(t.header().is_none());
                assert_eq!(t.row_count(), 2);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_ragged_rows_dropped() {
        let doc = parse_markup("## S\n| a | b |\n|---|---|\n| 1 |\n| 2 | 3 |\n", "x.md").unwrap();
        match &doc.sections[0].blocks[0] {
            ContentBlock::Table(t) => assert_eq!(t.row_count(), 2),
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_caption_is_text() {
        let doc = parse_markup("## S\nTable: nothing above\n", "x.md").unwrap();
        let blocks = &doc.sections[0].blocks;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].plain_text(), "Table: nothing above");
    }

    #[test]
    fn test_mismatched_caption_label() {
        let doc = parse_markup("## S\n![a](a.png)\nTable: wrong\n", "x.md").unwrap();
        let blocks = &doc.sections[0].blocks;
        assert!(matches!(
            &blocks[1],
            ContentBlock::Caption(Caption { label: CaptionLabel::Figure, .. })
        ));
        assert_eq!(blocks[2].plain_text(), "Table: wrong");
    }

    #[test]
    fn test_preamble() {
        let doc = parse_markup("# Title\nIntro text.\n## First\nBody\n", "x.md").unwrap();
        assert_eq!(doc.preamble.len(), 1);
        assert_eq!(doc.preamble[0].plain_text(), "Intro text.");
        assert_eq!(doc.sections[0].blocks.len(), 1);
    }

    #[test]
    fn test_sections_preserve_order() {
        let doc = parse_markup("## A\n## B\n### B1\n## C\n", "x.md").unwrap();
        let titles: Vec<_> = doc.iter_sections().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "B1", "C"]);
    }

    #[test]
    fn test_unterminated_front_matter_fails() {
        assert!(parse_markup("---\ntitle: x\n# Body\n", "x.md").is_err());
    }

    #[test]
    fn test_empty_document() {
        let doc = parse_markup("", "empty.md").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.source, "empty.md");
    }
}
