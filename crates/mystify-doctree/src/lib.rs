//! Document tree model for mystify.
//!
//! Source documents are read into a small, Markdown-shaped tree that the
//! MyST translator consumes. Reading is pluggable through [`DocumentReader`];
//! [`MarkdownReader`] handles CommonMark sources with YAML front matter.

pub mod frontmatter;
pub mod nodes;
pub mod reader;

pub use frontmatter::{Frontmatter, FrontmatterError};
pub use nodes::{AdmonitionKind, Block, Cell, Document, Inline};
pub use reader::{DocumentReader, MarkdownReader, ParseError};
