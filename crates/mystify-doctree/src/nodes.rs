//! Document tree nodes.

use crate::frontmatter::Frontmatter;

/// A parsed source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Frontmatter (if present)
    pub metadata: Option<Frontmatter>,

    /// Top-level blocks in document order
    pub blocks: Vec<Block>,
}

/// Inline content of a single table cell.
pub type Cell = Vec<Inline>;

/// Block-level node.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Section heading, level 1-6
    Heading { level: u8, content: Vec<Inline> },

    Paragraph(Vec<Inline>),

    /// Literal block with an optional highlight language
    CodeBlock {
        language: Option<String>,
        source: String,
    },

    BlockQuote(Vec<Block>),

    /// Callout box (note, warning, ...)
    Admonition {
        kind: AdmonitionKind,
        children: Vec<Block>,
    },

    /// Bullet list when `start` is `None`, enumerated otherwise
    List {
        start: Option<u64>,
        items: Vec<Vec<Block>>,
    },

    Table { header: Vec<Cell>, rows: Vec<Vec<Cell>> },

    FootnoteDefinition { label: String, children: Vec<Block> },

    /// A named directive, e.g. `toctree` or `figure`
    Directive {
        name: String,
        argument: Option<String>,
        options: Vec<(String, String)>,
        body: Vec<Block>,
    },

    /// Content passed through for a specific output format
    Raw { format: String, text: String },

    Transition,
}

/// Inline node.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Literal(String),
    Link { target: String, content: Vec<Inline> },
    Image { source: String, alt: String },
    FootnoteReference(String),
    /// Interpreted text, e.g. `{ref}` or `{doc}`
    Role { name: String, content: String },
    /// Markup emitted verbatim
    Raw(String),
    SoftBreak,
    LineBreak,
}

impl Inline {
    /// Concatenate the text carried by a run of inlines, dropping markup.
    pub fn plain_text(inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Text(t) | Inline::Literal(t) | Inline::Raw(t) => out.push_str(t),
                Inline::Emphasis(c) | Inline::Strong(c) | Inline::Strikethrough(c) => {
                    out.push_str(&Inline::plain_text(c))
                }
                Inline::Link { content, .. } => out.push_str(&Inline::plain_text(content)),
                Inline::Image { alt, .. } => out.push_str(alt),
                Inline::Role { content, .. } => out.push_str(content),
                Inline::FootnoteReference(_) => {}
                Inline::SoftBreak | Inline::LineBreak => out.push(' '),
            }
        }
        out
    }
}

/// Admonition flavours understood by both GitHub alerts and MyST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmonitionKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl AdmonitionKind {
    /// MyST directive name for this admonition.
    pub fn directive_name(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Tip => "tip",
            Self::Important => "important",
            Self::Warning => "warning",
            Self::Caution => "caution",
        }
    }
}
