//! MyST Markdown translator.

use std::borrow::Cow;

use mystify_doctree::{Block, Cell, Document, Frontmatter, Inline};

use crate::traits::{TranslateError, Translator};

/// Translator producing MyST Markdown.
#[derive(Debug, Clone)]
pub struct MystTranslator {
    /// Emit highlighted code as `{code-block}` directives rather than bare fences
    pub code_directive: bool,
}

impl Default for MystTranslator {
    fn default() -> Self {
        Self {
            code_directive: true,
        }
    }
}

impl MystTranslator {
    /// Create a translator with default settings.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Translator for MystTranslator {
    fn name(&self) -> &'static str {
        "myst"
    }

    fn out_suffix(&self) -> &'static str {
        ".md"
    }

    fn translate(&self, docname: &str, doc: &Document) -> Result<String, TranslateError> {
        let render = Render {
            docname,
            code_directive: self.code_directive,
        };

        let mut output = String::new();
        if let Some(metadata) = doc.metadata.as_ref().filter(|m| !m.is_empty()) {
            output.push_str(&render.frontmatter(metadata)?);
            if !doc.blocks.is_empty() {
                output.push('\n');
            }
        }
        output.push_str(&render.blocks(&doc.blocks)?);
        Ok(output)
    }
}

/// Rendering pass over a single document.
struct Render<'a> {
    docname: &'a str,
    code_directive: bool,
}

impl Render<'_> {
    fn frontmatter(&self, metadata: &Frontmatter) -> Result<String, TranslateError> {
        let yaml = serde_yaml::to_string(metadata).map_err(|e| TranslateError::Metadata {
            docname: self.docname.to_string(),
            message: e.to_string(),
        })?;
        Ok(format!("---\n{}---\n", yaml))
    }

    /// Render blocks separated by blank lines. Every block ends with a newline.
    fn blocks(&self, blocks: &[Block]) -> Result<String, TranslateError> {
        let rendered = blocks
            .iter()
            .map(|b| self.block(b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join("\n"))
    }

    fn block(&self, block: &Block) -> Result<String, TranslateError> {
        match block {
            Block::Heading { level, content } => {
                if !(1..=6).contains(level) {
                    return Err(TranslateError::HeadingLevel {
                        docname: self.docname.to_string(),
                        level: *level,
                    });
                }
                let mut text = self.inlines(content)?.replace("\\\n", " ").replace('\n', " ");
                // A trailing `#` would be read as the closing sequence
                if text.ends_with('#') {
                    text.insert(text.len() - 1, '\\');
                }
                Ok(format!("{} {}\n", "#".repeat(*level as usize), text))
            }

            Block::Paragraph(content) => {
                Ok(format!("{}\n", escape_block_starts(&self.inlines(content)?)))
            }

            Block::CodeBlock { language, source } => {
                let info = match language {
                    Some(lang) if self.code_directive => format!("{{code-block}} {}", lang),
                    Some(lang) => lang.clone(),
                    None => String::new(),
                };
                Ok(fenced(&info, &with_newline(source)))
            }

            Block::BlockQuote(children) => {
                Ok(prefix_lines(&self.blocks(children)?, "> ", ">"))
            }

            Block::Admonition { kind, children } => {
                self.directive(kind.directive_name(), None, &[], children)
            }

            Block::List { start, items } => self.list(*start, items),

            Block::Table { header, rows } => self.table(header, rows),

            Block::FootnoteDefinition { label, children } => {
                let marker = format!("[^{}]: ", label);
                let body = self.blocks(children)?;
                Ok(hang(&marker, &body, "    "))
            }

            Block::Directive {
                name,
                argument,
                options,
                body,
            } => self.directive(name, argument.as_deref(), options, body),

            Block::Raw { format, text } if format == "html" => Ok(with_newline(text)),

            Block::Raw { format, text } => {
                Ok(fenced(&format!("{{raw}} {}", format), &with_newline(text)))
            }

            Block::Transition => Ok("---\n".to_string()),
        }
    }

    fn directive(
        &self,
        name: &str,
        argument: Option<&str>,
        options: &[(String, String)],
        body: &[Block],
    ) -> Result<String, TranslateError> {
        if name.is_empty() {
            return Err(TranslateError::EmptyDirectiveName {
                docname: self.docname.to_string(),
            });
        }

        let mut info = format!("{{{}}}", name);
        if let Some(arg) = argument.filter(|a| !a.is_empty()) {
            info.push(' ');
            info.push_str(arg);
        }

        let mut content = String::new();
        for (key, value) in options {
            content.push_str(&format!(":{}: {}\n", key, value));
        }
        let body = self.blocks(body)?;
        if !options.is_empty() && !body.is_empty() {
            content.push('\n');
        }
        content.push_str(&body);

        Ok(fenced(&info, &content))
    }

    fn list(&self, start: Option<u64>, items: &[Vec<Block>]) -> Result<String, TranslateError> {
        let loose = items.iter().any(|item| item.len() > 1);
        let mut rendered = Vec::with_capacity(items.len());

        for (i, item) in items.iter().enumerate() {
            let marker = match start {
                Some(n) => format!("{}. ", n + i as u64),
                None => "- ".to_string(),
            };
            let indent = " ".repeat(marker.len());
            rendered.push(hang(&marker, &self.blocks(item)?, &indent));
        }

        Ok(rendered.join(if loose { "\n" } else { "" }))
    }

    fn table(&self, header: &[Cell], rows: &[Vec<Cell>]) -> Result<String, TranslateError> {
        if header.is_empty() {
            return Err(TranslateError::EmptyTable {
                docname: self.docname.to_string(),
            });
        }
        if let Some(row) = rows.iter().find(|r| r.len() != header.len()) {
            return Err(TranslateError::RaggedTable {
                docname: self.docname.to_string(),
                expected: header.len(),
                found: row.len(),
            });
        }

        let mut out = self.table_row(header)?;
        out.push('|');
        for _ in header {
            out.push_str(" --- |");
        }
        out.push('\n');
        for row in rows {
            out.push_str(&self.table_row(row)?);
        }
        Ok(out)
    }

    fn table_row(&self, cells: &[Cell]) -> Result<String, TranslateError> {
        let mut out = String::from("|");
        for cell in cells {
            let text = self.inlines(cell)?.replace('|', "\\|").replace('\n', " ");
            out.push_str(&format!(" {} |", text));
        }
        out.push('\n');
        Ok(out)
    }

    fn inlines(&self, inlines: &[Inline]) -> Result<String, TranslateError> {
        let mut out = String::new();
        for inline in inlines {
            self.inline(inline, &mut out)?;
        }
        Ok(out)
    }

    fn inline(&self, inline: &Inline, out: &mut String) -> Result<(), TranslateError> {
        match inline {
            Inline::Text(text) => out.push_str(&escape(text)),
            Inline::Emphasis(c) => out.push_str(&format!("*{}*", self.inlines(c)?)),
            Inline::Strong(c) => out.push_str(&format!("**{}**", self.inlines(c)?)),
            Inline::Strikethrough(c) => out.push_str(&format!("~~{}~~", self.inlines(c)?)),
            Inline::Literal(code) => out.push_str(&code_span(code)),
            Inline::Link { target, content } => {
                out.push_str(&format!(
                    "[{}]({})",
                    self.inlines(content)?,
                    link_destination(target)
                ));
            }
            Inline::Image { source, alt } => {
                out.push_str(&format!("![{}]({})", escape(alt), link_destination(source)))
            }
            Inline::FootnoteReference(label) => out.push_str(&format!("[^{}]", label)),
            Inline::Role { name, content } => {
                if name.is_empty() {
                    return Err(TranslateError::EmptyRoleName {
                        docname: self.docname.to_string(),
                    });
                }
                out.push_str(&format!("{{{}}}{}", name, code_span(content)));
            }
            Inline::Raw(raw) => out.push_str(raw),
            Inline::SoftBreak => out.push('\n'),
            Inline::LineBreak => out.push_str("\\\n"),
        }
        Ok(())
    }
}

/// Escape characters that would otherwise start Markdown markup.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape text that would open a block when it begins a line.
fn escape_block_starts(text: &str) -> String {
    text.split_inclusive('\n').map(escape_block_start).collect()
}

fn escape_block_start(line: &str) -> Cow<'_, str> {
    let Some(first) = line.chars().next() else {
        return Cow::Borrowed(line);
    };

    match first {
        '#' | '>' | '-' | '+' | '=' | '|' | '%' => Cow::Owned(format!("\\{}", line)),
        '~' if line.starts_with("~~~") => Cow::Owned(format!("\\{}", line)),
        // Colon fences and directive options
        ':' => Cow::Owned(format!("\\{}", line)),
        // MyST target, `(label)=`
        '(' if line.trim_end().ends_with(")=") => Cow::Owned(format!("\\{}", line)),
        '0'..='9' => {
            let digits = line.bytes().take_while(|b| b.is_ascii_digit()).count();
            match line.as_bytes().get(digits) {
                Some(b'.' | b')') => {
                    Cow::Owned(format!("{}\\{}", &line[..digits], &line[digits..]))
                }
                _ => Cow::Borrowed(line),
            }
        }
        _ => Cow::Borrowed(line),
    }
}

/// Length of the longest run of `ch` in `text`.
fn longest_run(text: &str, ch: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == ch {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn code_span(code: &str) -> String {
    let ticks = "`".repeat(longest_run(code, '`') + 1);
    let pad = if code.starts_with('`') || code.ends_with('`') {
        " "
    } else {
        ""
    };
    format!("{ticks}{pad}{code}{pad}{ticks}")
}

/// Wrap content in a backtick fence long enough to contain any fence inside it.
fn fenced(info: &str, content: &str) -> String {
    let fence = "`".repeat((longest_run(content, '`') + 1).max(3));
    format!("{fence}{info}\n{content}{fence}\n")
}

fn link_destination(target: &str) -> String {
    if target.contains(char::is_whitespace) {
        format!("<{}>", target)
    } else {
        target.to_string()
    }
}

fn with_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

/// Prefix every line, using `empty` for blank lines.
fn prefix_lines(text: &str, prefix: &str, empty: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                format!("{}\n", empty)
            } else {
                format!("{}{}\n", prefix, line)
            }
        })
        .collect()
}

/// Put `marker` before the first line and indent the rest by `indent`.
fn hang(marker: &str, text: &str, indent: &str) -> String {
    if text.is_empty() {
        return format!("{}\n", marker.trim_end());
    }
    let mut out = String::new();
    for (i, line) in text.lines().enumerate() {
        if i == 0 {
            out.push_str(marker);
            out.push_str(line);
        } else if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mystify_doctree::{AdmonitionKind, DocumentReader, MarkdownReader};
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    fn para(s: &str) -> Block {
        Block::Paragraph(vec![text(s)])
    }

    fn translate(blocks: Vec<Block>) -> Result<String, TranslateError> {
        let doc = Document {
            metadata: None,
            blocks,
        };
        MystTranslator::new().translate("index", &doc)
    }

    #[test]
    fn renders_headings_paragraphs_and_code() {
        let output = translate(vec![
            Block::Heading {
                level: 2,
                content: vec![text("Usage")],
            },
            Block::Paragraph(vec![
                text("Call "),
                Inline::Literal("build()".to_string()),
                text(" with "),
                Inline::Strong(vec![text("care")]),
                text("."),
            ]),
            Block::CodeBlock {
                language: Some("python".to_string()),
                source: "build()".to_string(),
            },
        ])
        .unwrap();

        assert_eq!(
            output,
            "## Usage\n\nCall `build()` with **care**.\n\n```{code-block} python\nbuild()\n```\n"
        );
    }

    #[test]
    fn renders_frontmatter() {
        let doc = Document {
            metadata: Some(Frontmatter {
                title: Some("Intro".to_string()),
                orphan: true,
                ..Default::default()
            }),
            blocks: vec![para("Hello")],
        };

        let output = MystTranslator::new().translate("intro", &doc).unwrap();

        assert_eq!(output, "---\ntitle: Intro\norphan: true\n---\n\nHello\n");
    }

    #[test]
    fn renders_admonitions_as_directives() {
        let output = translate(vec![Block::Admonition {
            kind: AdmonitionKind::Note,
            children: vec![Block::CodeBlock {
                language: None,
                source: "x = 1\n".to_string(),
            }],
        }])
        .unwrap();

        assert_eq!(output, "````{note}\n```\nx = 1\n```\n````\n");
    }

    #[test]
    fn renders_directive_options() {
        let output = translate(vec![Block::Directive {
            name: "toctree".to_string(),
            argument: None,
            options: vec![("maxdepth".to_string(), "2".to_string())],
            body: vec![para("intro")],
        }])
        .unwrap();

        assert_eq!(output, "```{toctree}\n:maxdepth: 2\n\nintro\n```\n");
    }

    #[test]
    fn renders_nested_lists() {
        let output = translate(vec![Block::List {
            start: Some(1),
            items: vec![
                vec![para("one")],
                vec![
                    para("two"),
                    Block::List {
                        start: None,
                        items: vec![vec![para("a")], vec![para("b")]],
                    },
                ],
            ],
        }])
        .unwrap();

        assert_eq!(output, "1. one\n\n2. two\n\n   - a\n   - b\n");
    }

    #[test]
    fn renders_tables_and_quotes() {
        let output = translate(vec![
            Block::Table {
                header: vec![vec![text("key")], vec![text("value")]],
                rows: vec![vec![vec![text("a|b")], vec![Inline::Literal("1".to_string())]]],
            },
            Block::BlockQuote(vec![para("first"), para("second")]),
        ])
        .unwrap();

        assert_eq!(
            output,
            "| key | value |\n| --- | --- |\n| a\\|b | `1` |\n\n> first\n>\n> second\n"
        );
    }

    #[test]
    fn renders_roles_links_and_escapes() {
        let output = translate(vec![Block::Paragraph(vec![
            text("See "),
            Inline::Role {
                name: "doc".to_string(),
                content: "setup".to_string(),
            },
            text(" and "),
            Inline::Link {
                target: "my page.md".to_string(),
                content: vec![text("*this*")],
            },
        ])])
        .unwrap();

        assert_eq!(output, "See {doc}`setup` and [\\*this\\*](<my page.md>)\n");
    }

    #[test]
    fn rejects_malformed_trees() {
        let heading = translate(vec![Block::Heading {
            level: 7,
            content: vec![],
        }]);
        assert!(matches!(
            heading,
            Err(TranslateError::HeadingLevel { level: 7, .. })
        ));

        let table = translate(vec![Block::Table {
            header: vec![vec![text("a")], vec![text("b")]],
            rows: vec![vec![vec![text("1")]]],
        }]);
        assert!(matches!(
            table,
            Err(TranslateError::RaggedTable {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn empty_link_targets_are_kept() {
        let output = translate(vec![Block::Paragraph(vec![
            text("See "),
            Inline::Link {
                target: String::new(),
                content: vec![text("here")],
            },
            text("."),
        ])])
        .unwrap();

        assert_eq!(output, "See [here]().\n");
    }

    #[test]
    fn bare_fences_without_code_directive() {
        let translator = MystTranslator {
            code_directive: false,
        };
        let doc = Document {
            metadata: None,
            blocks: vec![Block::CodeBlock {
                language: Some("rust".to_string()),
                source: "fn main() {}\n".to_string(),
            }],
        };

        let output = translator.translate("index", &doc).unwrap();

        assert_eq!(output, "```rust\nfn main() {}\n```\n");
    }

    #[test]
    fn escapes_text_that_would_start_a_block() {
        let output = translate(vec![
            para("# not a heading"),
            para("1. not a list"),
            para("> not a quote"),
            Block::Paragraph(vec![text("first line"), Inline::SoftBreak, text("=== not a rule")]),
            Block::Heading {
                level: 1,
                content: vec![text("Issue #")],
            },
        ])
        .unwrap();

        assert_eq!(
            output,
            "\\# not a heading\n\n1\\. not a list\n\n\\> not a quote\n\n\
             first line\n\\=== not a rule\n\n# Issue \\#\n"
        );
    }

    #[test]
    fn escaped_sources_read_back_unchanged() {
        let source = "\\# not a heading\n\n1\\. not a list\n\n\\> not a quote\n\n\
                      \\- not an item\n\n\\+ nor this\n\n2\\) closing paren\n\n\
                      line\n\\---\n\n# Ends with \\#\n\n\\:::{note}\n\n\\(label)=\n";
        let reader = MarkdownReader::new();

        let original = reader.read(source).unwrap();
        let output = MystTranslator::new().translate("index", &original).unwrap();
        let reread = reader.read(&output).unwrap();

        assert_eq!(reread, original);
    }

    #[test]
    fn code_spans_grow_past_inner_backticks() {
        assert_eq!(code_span("a`b"), "``a`b``");
        assert_eq!(code_span("`x`"), "`` `x` ``");
    }
}
