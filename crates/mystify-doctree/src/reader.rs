//! Source readers producing document trees.

use pulldown_cmark::{BlockQuoteKind, CodeBlockKind, Event, Options, Parser, Tag};

use crate::frontmatter::{extract_frontmatter, FrontmatterError};
use crate::nodes::{AdmonitionKind, Block, Cell, Document, Inline};

/// Turns source text into a document tree.
pub trait DocumentReader: Send + Sync {
    /// Parse one source document.
    fn read(&self, source: &str) -> Result<Document, ParseError>;
}

/// Errors that can occur when reading a document.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Frontmatter error: {0}")]
    Frontmatter(#[from] FrontmatterError),

    #[error("Unbalanced markup: {0}")]
    Unbalanced(String),
}

/// CommonMark reader with GitHub extensions (tables, footnotes, alerts).
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownReader;

impl MarkdownReader {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentReader for MarkdownReader {
    fn read(&self, source: &str) -> Result<Document, ParseError> {
        let (metadata, content) = extract_frontmatter(source)?;

        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_GFM;

        let mut tree = TreeBuilder::default();
        for event in Parser::new_ext(content, options) {
            tree.push_event(event)?;
        }

        Ok(Document {
            metadata,
            blocks: tree.finish()?,
        })
    }
}

/// An open container awaiting its End event.
enum Frame {
    Paragraph(Vec<Inline>),
    Heading(u8, Vec<Inline>),
    BlockQuote(Option<AdmonitionKind>, Vec<Block>),
    CodeBlock(Option<String>, String),
    HtmlBlock(String),
    List(Option<u64>, Vec<Vec<Block>>),
    /// Blocks so far, plus loose inlines from a tight list item
    Item(Vec<Block>, Vec<Inline>),
    FootnoteDefinition(String, Vec<Block>),
    Table(Vec<Cell>, Vec<Vec<Cell>>),
    TableHead(Vec<Cell>),
    TableRow(Vec<Cell>),
    TableCell(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link(String, Vec<Inline>),
    Image(String, Vec<Inline>),
    /// Constructs without a tree counterpart
    Other,
}

/// Folds a flat pulldown-cmark event stream into nested blocks.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    root: Vec<Block>,
}

impl TreeBuilder {
    fn push_event(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        match event {
            Event::Start(tag) => self.stack.push(open_frame(tag)),
            Event::End(_) => {
                let frame = self
                    .stack
                    .pop()
                    .ok_or_else(|| ParseError::Unbalanced("end tag without start".to_string()))?;
                self.close_frame(frame);
            }
            Event::Text(text) => match self.stack.last_mut() {
                Some(Frame::CodeBlock(_, buf)) | Some(Frame::HtmlBlock(buf)) => buf.push_str(&text),
                _ => self.push_inline(Inline::Text(text.to_string())),
            },
            Event::Code(code) => self.push_inline(Inline::Literal(code.to_string())),
            Event::Html(html) => match self.stack.last_mut() {
                Some(Frame::HtmlBlock(buf)) => buf.push_str(&html),
                _ => self.push_block(Block::Raw {
                    format: "html".to_string(),
                    text: html.to_string(),
                }),
            },
            Event::InlineHtml(html) => self.push_inline(Inline::Raw(html.to_string())),
            Event::FootnoteReference(label) => {
                self.push_inline(Inline::FootnoteReference(label.to_string()))
            }
            Event::SoftBreak => self.push_inline(Inline::SoftBreak),
            Event::HardBreak => self.push_inline(Inline::LineBreak),
            Event::Rule => self.push_block(Block::Transition),
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_inline(Inline::Raw(marker.to_string()));
            }
            _ => {}
        }
        Ok(())
    }

    fn close_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Paragraph(content) => self.push_block(Block::Paragraph(content)),
            Frame::Heading(level, content) => self.push_block(Block::Heading { level, content }),
            Frame::BlockQuote(Some(kind), children) => {
                self.push_block(Block::Admonition { kind, children })
            }
            Frame::BlockQuote(None, children) => self.push_block(Block::BlockQuote(children)),
            Frame::CodeBlock(language, source) => {
                self.push_block(Block::CodeBlock { language, source })
            }
            Frame::HtmlBlock(text) => self.push_block(Block::Raw {
                format: "html".to_string(),
                text,
            }),
            Frame::List(start, items) => self.push_block(Block::List { start, items }),
            Frame::Item(mut blocks, pending) => {
                if !pending.is_empty() {
                    blocks.push(Block::Paragraph(pending));
                }
                if let Some(Frame::List(_, items)) = self.stack.last_mut() {
                    items.push(blocks);
                }
            }
            Frame::FootnoteDefinition(label, children) => {
                self.push_block(Block::FootnoteDefinition { label, children })
            }
            Frame::Table(header, rows) => self.push_block(Block::Table { header, rows }),
            Frame::TableHead(cells) => {
                if let Some(Frame::Table(header, _)) = self.stack.last_mut() {
                    *header = cells;
                }
            }
            Frame::TableRow(cells) => {
                if let Some(Frame::Table(_, rows)) = self.stack.last_mut() {
                    rows.push(cells);
                }
            }
            Frame::TableCell(content) => match self.stack.last_mut() {
                Some(Frame::TableHead(cells)) | Some(Frame::TableRow(cells)) => cells.push(content),
                _ => {}
            },
            Frame::Emphasis(content) => self.push_inline(Inline::Emphasis(content)),
            Frame::Strong(content) => self.push_inline(Inline::Strong(content)),
            Frame::Strikethrough(content) => self.push_inline(Inline::Strikethrough(content)),
            Frame::Link(target, content) => self.push_inline(Inline::Link { target, content }),
            Frame::Image(source, alt) => self.push_inline(Inline::Image {
                source,
                alt: Inline::plain_text(&alt),
            }),
            Frame::Other => {}
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        let target = match self.stack.last_mut() {
            Some(Frame::Paragraph(c))
            | Some(Frame::Heading(_, c))
            | Some(Frame::TableCell(c))
            | Some(Frame::Emphasis(c))
            | Some(Frame::Strong(c))
            | Some(Frame::Strikethrough(c))
            | Some(Frame::Link(_, c))
            | Some(Frame::Image(_, c))
            | Some(Frame::Item(_, c)) => c,
            _ => return,
        };

        // pulldown-cmark splits text runs at escapes and entities
        if let (Inline::Text(next), Some(Inline::Text(prev))) = (&inline, target.last_mut()) {
            prev.push_str(next);
            return;
        }
        target.push(inline);
    }

    fn push_block(&mut self, block: Block) {
        match self.stack.last_mut() {
            Some(Frame::BlockQuote(_, children)) | Some(Frame::FootnoteDefinition(_, children)) => {
                children.push(block)
            }
            Some(Frame::Item(blocks, pending)) => {
                if !pending.is_empty() {
                    blocks.push(Block::Paragraph(std::mem::take(pending)));
                }
                blocks.push(block);
            }
            _ => self.root.push(block),
        }
    }

    fn finish(self) -> Result<Vec<Block>, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::Unbalanced(format!(
                "{} containers left open",
                self.stack.len()
            )));
        }
        Ok(self.root)
    }
}

fn open_frame(tag: Tag<'_>) -> Frame {
    match tag {
        Tag::Paragraph => Frame::Paragraph(Vec::new()),
        Tag::Heading { level, .. } => Frame::Heading(level as u8, Vec::new()),
        Tag::BlockQuote(kind) => Frame::BlockQuote(kind.map(admonition_kind), Vec::new()),
        Tag::CodeBlock(kind) => {
            let language = match kind {
                CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_string),
                CodeBlockKind::Indented => None,
            };
            Frame::CodeBlock(language, String::new())
        }
        Tag::HtmlBlock => Frame::HtmlBlock(String::new()),
        Tag::List(start) => Frame::List(start, Vec::new()),
        Tag::Item => Frame::Item(Vec::new(), Vec::new()),
        Tag::FootnoteDefinition(label) => Frame::FootnoteDefinition(label.to_string(), Vec::new()),
        Tag::Table(_) => Frame::Table(Vec::new(), Vec::new()),
        Tag::TableHead => Frame::TableHead(Vec::new()),
        Tag::TableRow => Frame::TableRow(Vec::new()),
        Tag::TableCell => Frame::TableCell(Vec::new()),
        Tag::Emphasis => Frame::Emphasis(Vec::new()),
        Tag::Strong => Frame::Strong(Vec::new()),
        Tag::Strikethrough => Frame::Strikethrough(Vec::new()),
        Tag::Link { dest_url, .. } => Frame::Link(dest_url.to_string(), Vec::new()),
        Tag::Image { dest_url, .. } => Frame::Image(dest_url.to_string(), Vec::new()),
        _ => Frame::Other,
    }
}

fn admonition_kind(kind: BlockQuoteKind) -> AdmonitionKind {
    match kind {
        BlockQuoteKind::Note => AdmonitionKind::Note,
        BlockQuoteKind::Tip => AdmonitionKind::Tip,
        BlockQuoteKind::Important => AdmonitionKind::Important,
        BlockQuoteKind::Warning => AdmonitionKind::Warning,
        BlockQuoteKind::Caution => AdmonitionKind::Caution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn reads_complete_document() {
        let source = r#"---
title: Setup
---

# Setup

Install the *package* first.

```python
import mystify
```

## Next
"#;

        let doc = MarkdownReader::new().read(source).unwrap();

        assert_eq!(doc.metadata.unwrap().title.as_deref(), Some("Setup"));
        assert_eq!(
            doc.blocks,
            vec![
                Block::Heading {
                    level: 1,
                    content: vec![text("Setup")],
                },
                Block::Paragraph(vec![
                    text("Install the "),
                    Inline::Emphasis(vec![text("package")]),
                    text(" first."),
                ]),
                Block::CodeBlock {
                    language: Some("python".to_string()),
                    source: "import mystify\n".to_string(),
                },
                Block::Heading {
                    level: 2,
                    content: vec![text("Next")],
                },
            ]
        );
    }

    #[test]
    fn tight_list_items_become_paragraphs() {
        let doc = MarkdownReader::new().read("- one\n- two\n  - nested\n").unwrap();

        let Block::List { start, items } = &doc.blocks[0] else {
            panic!("expected list, got {:?}", doc.blocks[0]);
        };
        assert_eq!(*start, None);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], vec![Block::Paragraph(vec![text("one")])]);
        assert_eq!(items[1][0], Block::Paragraph(vec![text("two")]));
        assert!(matches!(items[1][1], Block::List { .. }));
    }

    #[test]
    fn reads_tables() {
        let doc = MarkdownReader::new()
            .read("| a | b |\n|---|---|\n| 1 | 2 |\n")
            .unwrap();

        assert_eq!(
            doc.blocks,
            vec![Block::Table {
                header: vec![vec![text("a")], vec![text("b")]],
                rows: vec![vec![vec![text("1")], vec![text("2")]]],
            }]
        );
    }

    #[test]
    fn github_alerts_become_admonitions() {
        let doc = MarkdownReader::new()
            .read("> [!WARNING]\n> Back up first.\n")
            .unwrap();

        assert_eq!(
            doc.blocks,
            vec![Block::Admonition {
                kind: AdmonitionKind::Warning,
                children: vec![Block::Paragraph(vec![text("Back up first.")])],
            }]
        );
    }

    #[test]
    fn reads_links_images_and_footnotes() {
        let doc = MarkdownReader::new()
            .read("See [docs](intro.md) ![logo](logo.png)[^1].\n\n[^1]: Footnote.\n")
            .unwrap();

        assert_eq!(
            doc.blocks[0],
            Block::Paragraph(vec![
                text("See "),
                Inline::Link {
                    target: "intro.md".to_string(),
                    content: vec![text("docs")],
                },
                text(" "),
                Inline::Image {
                    source: "logo.png".to_string(),
                    alt: "logo".to_string(),
                },
                Inline::FootnoteReference("1".to_string()),
                text("."),
            ])
        );
        assert_eq!(
            doc.blocks[1],
            Block::FootnoteDefinition {
                label: "1".to_string(),
                children: vec![Block::Paragraph(vec![text("Footnote.")])],
            }
        );
    }

    #[test]
    fn propagates_frontmatter_errors() {
        let result = MarkdownReader::new().read("---\ntitle: [x\n---\n");

        assert!(matches!(
            result,
            Err(ParseError::Frontmatter(FrontmatterError::InvalidYaml(_)))
        ));
    }

    #[test]
    fn leading_rule_is_content() {
        let doc = MarkdownReader::new()
            .read("---\n\nIntro after a rule.\n")
            .unwrap();

        assert!(doc.metadata.is_none());
        assert_eq!(
            doc.blocks,
            vec![
                Block::Transition,
                Block::Paragraph(vec![text("Intro after a rule.")]),
            ]
        );
    }
}
