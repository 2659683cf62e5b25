//! Frontmatter extraction and parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parsed YAML frontmatter from a source document.
///
/// Keys other than the ones Sphinx itself interprets are kept in `extra`
/// so they survive translation unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Frontmatter {
    /// Page title override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Document is intentionally absent from every toctree
    #[serde(default, skip_serializing_if = "is_false")]
    pub orphan: bool,

    /// Remaining keys, in key order
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Frontmatter {
    /// True when there is nothing worth emitting.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && !self.orphan && self.extra.is_empty()
    }
}

/// Extract frontmatter from document source.
///
/// A block is only recognised when the first line is exactly `---`, a later
/// line closes it with `---` and the YAML between them is a mapping (or
/// empty). Anything else is ordinary content, such as a leading thematic
/// break, and comes back untouched.
///
/// Returns the parsed frontmatter and the remaining content after the frontmatter block.
pub fn extract_frontmatter(source: &str) -> Result<(Option<Frontmatter>, &str), FrontmatterError> {
    let mut lines = source.split_inclusive('\n');
    let yaml_start = match lines.next() {
        Some(first) if is_delimiter(first) => first.len(),
        _ => return Ok((None, source)),
    };

    let mut offset = yaml_start;
    for line in lines {
        if is_delimiter(line) {
            let remaining = &source[offset + line.len()..];
            return Ok(match parse_yaml(&source[yaml_start..offset])? {
                Some(frontmatter) => (Some(frontmatter), remaining.trim_start()),
                None => (None, source),
            });
        }
        offset += line.len();
    }

    Ok((None, source))
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

fn parse_yaml(yaml: &str) -> Result<Option<Frontmatter>, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Some(Frontmatter::default()));
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?;

    match value {
        serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value)
            .map(Some)
            .map_err(|e| FrontmatterError::InvalidYaml(e.to_string())),
        // Text between two thematic breaks
        _ => Ok(None),
    }
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),
}
